//! mathdb - cross-linked static sites from schema-described JSON tables.

use anyhow::Result;
use clap::Parser;
use mathdb::{HookRegistry, SiteConfig, build_site, cli::Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;
    build_site(&config, &HookRegistry::new())?;
    Ok(())
}
