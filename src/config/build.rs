//! Run settings that come from the command line rather than `main.json`.

use super::defaults;
use educe::Educe;
use std::path::PathBuf;

#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct BuildConfig {
    /// Absolute data directory.
    pub data_dir: PathBuf,

    /// Absolute path of `main.json` (may not exist).
    #[educe(Default = defaults::build::config_file())]
    pub config_path: PathBuf,

    /// Absolute output directory.
    #[educe(Default = defaults::build::output_dir())]
    pub output_dir: PathBuf,

    /// Report only; never touch the output directory.
    pub check: bool,
}
