//! Site selection against the merged catalog

use crate::catalog::{Catalog, SiteConfig};
use crate::error::{Error, Result};

/// All catalog entries matching the optional source filter
pub fn filter<'a>(catalog: &'a Catalog, source: Option<&str>) -> Result<Vec<&'a SiteConfig>> {
    let matched: Vec<&SiteConfig> = catalog
        .sites
        .iter()
        .filter(|site| source.is_none_or(|s| site.source == s))
        .collect();

    if matched.is_empty() {
        return Err(Error::NoSites {
            source_filter: source.map(String::from),
        });
    }
    Ok(matched)
}

/// Resolve one site by name, optionally constrained to a source.
///
/// Duplicate names are not an error: the first entry in catalog order
/// wins, which keeps selection deterministic across sources.
pub fn find<'a>(catalog: &'a Catalog, name: &str, source: Option<&str>) -> Result<&'a SiteConfig> {
    let candidates = filter(catalog, source)?;
    candidates
        .into_iter()
        .find(|site| site.name == name)
        .ok_or_else(|| Error::SiteNotFound {
            name: name.to_string(),
            source_filter: source.map(String::from),
        })
}
