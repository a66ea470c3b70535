//! `main.json`: dataset-level site settings.
//!
//! Every field is optional. Unknown fields are ignored so a dataset can carry
//! extra metadata for other tools.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `main.json` at the root of the data directory.
///
/// # Example
/// ```json
/// {
///   "title": "Mathematics Database",
///   "header": "Equations and the people behind them",
///   "tables": ["mathematicians", "equations"],
///   "bibliography": { "bibfile": "refs.bib", "title": "References" },
///   "strict": false
/// }
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct MainConfig {
    /// Browser title and site name in the page header.
    #[serde(default = "defaults::site::title")]
    #[educe(Default = defaults::site::title())]
    pub title: String,

    /// Heading of the index page. Falls back to `title`.
    #[serde(default)]
    pub header: String,

    #[serde(default)]
    pub subtitle: String,

    /// Introduction paragraph of the index page.
    #[serde(default)]
    pub description: String,

    /// Raw HTML placed in every page footer.
    #[serde(default = "defaults::site::footer")]
    #[educe(Default = defaults::site::footer())]
    pub footer: String,

    /// Tables to publish, in order. Default: every subdirectory with a
    /// `schema.json`, sorted by name.
    #[serde(default)]
    pub tables: Option<Vec<String>>,

    #[serde(default)]
    pub bibliography: Option<BibliographyConfig>,

    /// Directory copied verbatim into the output, relative to the data dir.
    #[serde(default = "defaults::site::static_dir")]
    #[educe(Default = defaults::site::static_dir())]
    pub static_dir: PathBuf,

    #[serde(default = "defaults::r#false")]
    pub strict: bool,

    #[serde(default = "defaults::r#false")]
    pub minify: bool,

    /// Absolute prefix for generated links. Relative links when unset.
    #[serde(default = "defaults::site::base_url")]
    #[educe(Default = defaults::site::base_url())]
    pub base_url: Option<String>,
}

impl MainConfig {
    pub fn header(&self) -> &str {
        if self.header.is_empty() { &self.title } else { &self.header }
    }
}

#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct BibliographyConfig {
    /// `.bib` or `.json` file, relative to the data dir.
    pub bibfile: PathBuf,

    #[serde(default = "defaults::site::bibliography::title")]
    #[educe(Default = defaults::site::bibliography::title())]
    pub title: String,
}
