//! Command-line interface definitions.

use clap::Parser;
use std::path::PathBuf;

/// Generate a cross-linked static site from schema-described JSON tables
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Data directory containing `main.json` and one directory per table
    pub data_dir: PathBuf,

    /// Output directory (default: `docs/` next to the data directory)
    #[arg(short, long = "output_dir", visible_alias = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Treat every warning as fatal
    #[arg(short, long)]
    pub strict: bool,

    /// Minify the html content
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// Prefix for generated links, e.g. `https://example.org/db`.
    ///
    /// Without it, links are relative and the site works from any location.
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Run the whole pipeline and report problems without writing anything
    #[arg(long)]
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cli = Cli::try_parse_from(["mathdb", "data"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("data"));
        assert!(cli.output_dir.is_none());
        assert!(!cli.strict);
        assert_eq!(cli.minify, None);
        assert!(!cli.check);
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = Cli::try_parse_from([
            "mathdb",
            "data",
            "--output_dir",
            "out",
            "--strict",
            "--minify",
            "--base-url",
            "https://example.org/db",
            "--check",
        ])
        .unwrap();
        assert_eq!(cli.output_dir, Some(PathBuf::from("out")));
        assert!(cli.strict);
        assert_eq!(cli.minify, Some(true));
        assert_eq!(cli.base_url.as_deref(), Some("https://example.org/db"));
        assert!(cli.check);

        let cli = Cli::try_parse_from(["mathdb", "data", "--output-dir", "site", "--minify", "false"]).unwrap();
        assert_eq!(cli.output_dir, Some(PathBuf::from("site")));
        assert_eq!(cli.minify, Some(false));
    }
}
