//! Deploy-path and shared-resource resolution
//!
//! Shared lists resolve in three tiers, independently for files and dirs:
//! an explicit list is used verbatim; otherwise configured default entries
//! are kept only when a remote probe confirms them; otherwise the remote
//! `shared/` directory is enumerated, and a missing `shared/` simply means
//! empty sets so a first-time deployment can proceed.

use anyhow::Result;

use crate::catalog::SiteConfig;
use crate::config::Settings;
use crate::remote::{PathKind, RemoteEntry, RemoteExecutor};

/// A site enriched with derived paths, scoped to one pipeline run
#[derive(Debug, Clone)]
pub struct ResolvedSite {
    pub site: SiteConfig,
    pub deploy_path: String,
    pub shared_files: Vec<String>,
    pub shared_dirs: Vec<String>,
}

impl ResolvedSite {
    pub fn shared_root(&self) -> String {
        format!("{}/shared", self.deploy_path)
    }

    pub fn releases_root(&self) -> String {
        format!("{}/releases", self.deploy_path)
    }

    pub fn current_path(&self) -> String {
        format!("{}/current", self.deploy_path)
    }
}

/// Derive deploy path and shared sets for one site
pub fn resolve(
    site: &SiteConfig,
    settings: &Settings,
    executor: &dyn RemoteExecutor,
) -> Result<ResolvedSite> {
    let deploy_path = match &site.deploy_path {
        Some(path) => shellexpand::tilde(path).to_string(),
        None => format!("{}/{}", settings.sites_root.trim_end_matches('/'), site.name),
    };
    let shared_root = format!("{deploy_path}/shared");

    // One enumeration serves both kinds when they fall through to tier 3.
    let mut enumerated: Option<Vec<RemoteEntry>> = None;
    let mut enumerate = |executor: &dyn RemoteExecutor| -> Result<Vec<RemoteEntry>> {
        if let Some(cached) = &enumerated {
            return Ok(cached.clone());
        }
        let entries = if executor.exists(&shared_root, PathKind::Dir)? {
            executor.list_children(&shared_root)?
        } else {
            Vec::new()
        };
        enumerated = Some(entries.clone());
        Ok(entries)
    };

    let shared_files = resolve_kind(
        site.shared_files.as_deref(),
        &settings.default_shared_files,
        PathKind::File,
        &shared_root,
        executor,
        &mut enumerate,
    )?;
    let shared_dirs = resolve_kind(
        site.shared_dirs.as_deref(),
        &settings.default_shared_dirs,
        PathKind::Dir,
        &shared_root,
        executor,
        &mut enumerate,
    )?;

    Ok(ResolvedSite {
        site: site.clone(),
        deploy_path,
        shared_files,
        shared_dirs,
    })
}

fn resolve_kind(
    explicit: Option<&[String]>,
    defaults: &[String],
    kind: PathKind,
    shared_root: &str,
    executor: &dyn RemoteExecutor,
    enumerate: &mut impl FnMut(&dyn RemoteExecutor) -> Result<Vec<RemoteEntry>>,
) -> Result<Vec<String>> {
    // Explicit lists are taken verbatim, no remote traffic.
    if let Some(entries) = explicit {
        return Ok(entries.to_vec());
    }

    // Configured defaults are kept only when the probe confirms them as
    // the right type; missing entries are omitted without error.
    if !defaults.is_empty() {
        let mut resolved = Vec::new();
        for entry in defaults {
            if resolved.contains(entry) {
                continue;
            }
            if executor.exists(&format!("{shared_root}/{entry}"), kind)? {
                resolved.push(entry.clone());
            }
        }
        return Ok(resolved);
    }

    // No declaration at all: take whatever the shared directory holds.
    Ok(enumerate(executor)?
        .into_iter()
        .filter(|entry| entry.kind == kind)
        .map(|entry| entry.name)
        .collect())
}
