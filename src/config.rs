//! Settings file loading and catalog-source discovery
//!
//! The settings file carries deployment defaults, the host list, and the
//! inline `[sites]` declaration source. Every `sites.d/*.toml` next to it
//! is a further source tagged with its file stem, merged in filename order.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogSource, SiteDecl};
use crate::host::HostTarget;

pub const SETTINGS_FILE: &str = "sitefleet.toml";

/// Source tag for entries declared inline in the settings file
pub const INLINE_SOURCE: &str = "inline";

fn default_sites_root() -> String {
    "/var/www/sites".to_string()
}

fn default_keep_releases() -> usize {
    5
}

fn default_http_user() -> String {
    "www-data".to_string()
}

/// Deployment settings plus the inline declaration source
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Root for default deploy paths (`<sites_root>/<name>`)
    #[serde(default = "default_sites_root")]
    pub sites_root: String,

    /// Releases kept per site by the cleanup stage
    #[serde(default = "default_keep_releases")]
    pub keep_releases: usize,

    /// Principal granted access in ACL writable mode
    #[serde(default = "default_http_user")]
    pub http_user: String,

    /// Shared entries probed for sites that declare no explicit lists
    #[serde(default)]
    pub default_shared_files: Vec<String>,
    #[serde(default)]
    pub default_shared_dirs: Vec<String>,

    /// `writable_use_sudo` default for the inline source
    #[serde(default)]
    pub use_sudo_default: bool,

    #[serde(default)]
    pub sites: BTreeMap<String, SiteDecl>,

    #[serde(default)]
    pub hosts: Vec<HostTarget>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sites_root: default_sites_root(),
            keep_releases: default_keep_releases(),
            http_user: default_http_user(),
            default_shared_files: Vec::new(),
            default_shared_dirs: Vec::new(),
            use_sudo_default: false,
            sites: BTreeMap::new(),
            hosts: Vec::new(),
        }
    }
}

/// Loaded configuration: settings plus all declaration sources in order
#[derive(Debug, Default)]
pub struct Config {
    pub settings: Settings,
    pub sources: Vec<CatalogSource>,
}

impl Config {
    /// Load from an explicit path, else `./sitefleet.toml`, else
    /// `~/.config/sitefleet/sitefleet.toml`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match locate(explicit) {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file: {}", path.display()))?;
        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;

        let mut sources = vec![CatalogSource {
            tag: INLINE_SOURCE.to_string(),
            use_sudo_default: settings.use_sudo_default,
            sites: settings.sites.clone(),
        }];
        sources.extend(discover_extra_sources(path)?);

        Ok(Self { settings, sources })
    }
}

fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(SETTINGS_FILE);
    if local.exists() {
        return Some(local);
    }
    let home = dirs::home_dir()?;
    let fallback = home.join(".config").join("sitefleet").join(SETTINGS_FILE);
    fallback.exists().then_some(fallback)
}

/// Each `sites.d/*.toml` sibling is one source, tagged by file stem
fn discover_extra_sources(settings_path: &Path) -> Result<Vec<CatalogSource>> {
    let dir = settings_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("sites.d");
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .with_context(|| format!("could not read {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut sources = Vec::new();
    for path in paths {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("could not read {}", path.display()))?;
        let mut source: CatalogSource = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in {}", path.display()))?;
        source.tag = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        sources.push(source);
    }
    Ok(sources)
}
