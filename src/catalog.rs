//! Site catalog: declaration sources and normalization
//!
//! A declaration source is a named map from site name (the domain) to
//! either a bare repository URL or a partial options table. Sources are
//! normalized entry by entry into [`SiteConfig`] and concatenated in
//! source order; duplicate names across sources are legal and resolved
//! at selection time.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// How writable directories get their permissions
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WritableMode {
    #[default]
    Chmod,
    Acl,
}

/// A site declaration as written in a catalog file
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SiteDecl {
    /// Bare repository URL, promoted to `{ repository: ... }`
    Repo(String),
    Options(SiteOptions),
}

/// Partial per-site options; everything unset falls back to defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteOptions {
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub deploy_path: Option<String>,
    #[serde(default)]
    pub shared_files: Option<Vec<String>>,
    #[serde(default)]
    pub shared_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub writable_dirs: Option<Vec<String>>,
    #[serde(default)]
    pub writable_mode: Option<WritableMode>,
    #[serde(default)]
    pub writable_use_sudo: Option<bool>,
    #[serde(default)]
    pub writable_recursive: Option<bool>,
    #[serde(default)]
    pub writable_chmod_mode: Option<String>,
}

/// One declaration source: the inline `[sites]` table or one `sites.d` file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSource {
    /// Tag recorded on every entry this source produces
    #[serde(skip)]
    pub tag: String,

    /// Source-scoped default for `writable_use_sudo` (the reference
    /// behavior differed per source, so it is an explicit knob here)
    #[serde(default)]
    pub use_sudo_default: bool,

    #[serde(default)]
    pub sites: BTreeMap<String, SiteDecl>,
}

/// A normalized site entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub name: String,
    pub source: String,
    pub repository: String,
    pub branch: String,
    pub deploy_path: Option<String>,
    /// Unset means "resolve from the remote shared directory"
    pub shared_files: Option<Vec<String>>,
    pub shared_dirs: Option<Vec<String>>,
    pub writable_dirs: Vec<String>,
    pub writable_mode: WritableMode,
    pub writable_use_sudo: bool,
    pub writable_recursive: bool,
    pub writable_chmod_mode: String,
}

impl SiteConfig {
    /// Required fields must be non-empty; checked at deploy time, not load
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::InvalidSite {
                site: self.name.clone(),
                field: "name",
            });
        }
        if self.repository.is_empty() {
            return Err(Error::InvalidSite {
                site: self.name.clone(),
                field: "repository",
            });
        }
        Ok(())
    }
}

/// The merged, ordered catalog of all declared sites
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub sites: Vec<SiteConfig>,
}

impl Catalog {
    /// Normalize every source and concatenate in source order.
    ///
    /// No deduplication: a name may legitimately appear once per source.
    pub fn load(sources: &[CatalogSource]) -> Self {
        let mut sites = Vec::new();
        for source in sources {
            for (name, decl) in &source.sites {
                sites.push(normalize(source, name, decl));
            }
        }
        Self { sites }
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Split a `repo::branch` declaration; no suffix means branch `main`
fn split_repository(declared: &str) -> (String, String) {
    match declared.split_once("::") {
        Some((repo, branch)) => (repo.to_string(), branch.to_string()),
        None => (declared.to_string(), "main".to_string()),
    }
}

/// Drop duplicate entries, keeping first occurrence order
fn dedup(entries: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for entry in entries {
        if !seen.contains(&entry) {
            seen.push(entry);
        }
    }
    seen
}

/// Merge a declaration with the source tag, declared name, and defaults
fn normalize(source: &CatalogSource, name: &str, decl: &SiteDecl) -> SiteConfig {
    let opts = match decl {
        SiteDecl::Repo(url) => SiteOptions {
            repository: Some(url.clone()),
            ..SiteOptions::default()
        },
        SiteDecl::Options(opts) => opts.clone(),
    };

    let (repository, suffix_branch) = split_repository(opts.repository.as_deref().unwrap_or(""));

    SiteConfig {
        name: name.to_string(),
        source: source.tag.clone(),
        repository,
        // An explicit branch field always wins over the ::suffix.
        branch: opts.branch.unwrap_or(suffix_branch),
        deploy_path: opts.deploy_path,
        shared_files: opts.shared_files.map(dedup),
        shared_dirs: opts.shared_dirs.map(dedup),
        writable_dirs: opts
            .writable_dirs
            .map(dedup)
            .unwrap_or_else(|| vec!["var".to_string(), "tmp".to_string()]),
        writable_mode: opts.writable_mode.unwrap_or_default(),
        writable_use_sudo: opts.writable_use_sudo.unwrap_or(source.use_sudo_default),
        writable_recursive: opts.writable_recursive.unwrap_or(true),
        writable_chmod_mode: opts
            .writable_chmod_mode
            .unwrap_or_else(|| "0777".to_string()),
    }
}
