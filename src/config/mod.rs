//! Site configuration: `main.json` plus command-line overrides.
//!
//! | Source          | Holds                                              |
//! |-----------------|----------------------------------------------------|
//! | `main.json`     | titles, table order, bibliography, static dir      |
//! | CLI             | data/output dirs, `--check`                        |
//! | both (CLI wins) | `strict`, `minify`, `base_url`                     |

mod build;
pub mod defaults;
mod error;
mod site;

pub use build::BuildConfig;
pub use error::ConfigError;
pub use site::{BibliographyConfig, MainConfig};

use crate::cli::Cli;
use crate::resolve::DEFAULT_LINK_ROOT;
use anyhow::{Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the dataset configuration.
pub const CONFIG_FILE: &str = "main.json";

// ============================================================================
// Root Configuration
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    /// `main.json` contents.
    pub site: MainConfig,

    /// Paths and run mode.
    pub build: BuildConfig,
}

impl SiteConfig {
    /// Parse `main.json` content.
    pub fn from_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let site = serde_json::from_str(content).map_err(|err| ConfigError::Json(path.to_path_buf(), err))?;
        Ok(Self {
            site,
            build: BuildConfig::default(),
        })
    }

    /// Load `main.json` from file path
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content, path)
    }

    /// Load, apply CLI overrides and validate.
    ///
    /// A missing `main.json` is not an error; every field has a default.
    pub fn load(cli: &Cli) -> Result<Self> {
        let data_dir = Self::normalize_path(&cli.data_dir);
        let config_path = data_dir.join(CONFIG_FILE);

        let mut config = if config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.build.data_dir = data_dir;
        config.build.config_path = config_path;
        config.update_with_cli(cli);
        config.validate()?;

        Ok(config)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if self.build.data_dir.as_os_str().is_empty() {
            self.build.data_dir = Self::normalize_path(&cli.data_dir);
        }

        self.build.output_dir = match &cli.output_dir {
            Some(output) => Self::normalize_path(output),
            None => {
                let parent = self.build.data_dir.parent().unwrap_or(&self.build.data_dir);
                parent.join(defaults::build::output_dir())
            }
        };

        self.site.strict |= cli.strict;
        self.build.check = cli.check;
        Self::update_option(&mut self.site.minify, cli.minify.as_ref());
        if let Some(base_url) = &cli.base_url {
            self.site.base_url = Some(base_url.clone());
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    pub fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        let data_dir = &self.build.data_dir;
        if !data_dir.is_dir() {
            bail!(ConfigError::Validation(format!(
                "data directory `{}` not found",
                data_dir.display()
            )));
        }

        // The output directory is replaced wholesale.
        if data_dir.starts_with(&self.build.output_dir) {
            bail!(ConfigError::Validation(format!(
                "output directory `{}` must not contain the data directory",
                self.build.output_dir.display()
            )));
        }

        if let Some(base_url) = &self.site.base_url
            && !base_url.starts_with("http://")
            && !base_url.starts_with("https://")
        {
            bail!(ConfigError::Validation(
                "`base_url` must start with http:// or https://".into()
            ));
        }

        if let Some(bibliography) = &self.site.bibliography
            && bibliography.bibfile.as_os_str().is_empty()
        {
            bail!(ConfigError::Validation("`bibliography.bibfile` must not be empty".into()));
        }

        Ok(())
    }

    /// Prefix of every link generated inside a table directory.
    pub fn link_root(&self) -> String {
        match &self.site.base_url {
            Some(url) => format!("{}/", url.trim_end_matches('/')),
            None => DEFAULT_LINK_ROOT.to_owned(),
        }
    }

    pub fn bibliography_path(&self) -> Option<PathBuf> {
        self.site
            .bibliography
            .as_ref()
            .map(|b| self.build.data_dir.join(&b.bibfile))
    }

    /// Static asset directories that exist.
    pub fn static_dirs(&self) -> Vec<PathBuf> {
        let dir = self.build.data_dir.join(&self.site.static_dir);
        if dir.is_dir() { vec![dir] } else { Vec::new() }
    }
}

// ============================================================================
// Tests
// ============================================================================
