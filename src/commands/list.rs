//! `list` - print the merged catalog as a source/name/repository table

use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::{select, ui};

pub fn run(_ctx: &Context, config: &Config, source: Option<&str>) -> Result<()> {
    let catalog = Catalog::load(&config.sources);

    let sites = match select::filter(&catalog, source) {
        Ok(sites) => sites,
        Err(err) => {
            // Empty catalog is an operator mistake, not a crash.
            ui::error(&err.to_string());
            return Ok(());
        }
    };

    let source_w = sites
        .iter()
        .map(|s| s.source.len())
        .chain(["SOURCE".len()])
        .max()
        .unwrap_or(0);
    let name_w = sites
        .iter()
        .map(|s| s.name.len())
        .chain(["NAME".len()])
        .max()
        .unwrap_or(0);

    println!(
        "{}",
        format!("{:<source_w$}  {:<name_w$}  REPOSITORY", "SOURCE", "NAME").bold()
    );
    for site in &sites {
        // Pad before coloring: ANSI escapes would break the alignment.
        println!(
            "{}  {:<name_w$}  {} ({})",
            format!("{:<source_w$}", site.source).dimmed(),
            site.name,
            site.repository,
            site.branch,
        );
    }
    ui::dim(&format!("{} site(s)", sites.len()));

    Ok(())
}
