//! Remote host targets
//!
//! Hosts come from the settings file (`[[hosts]]`) or from environment
//! overrides (SITEFLEET_HOST and friends), mirroring the usual
//! host-per-stage layout of deployment configs.

use anyhow::{Result, bail};
use serde::Deserialize;

fn default_user() -> String {
    "admin".to_string()
}

fn default_port() -> u16 {
    2222
}

fn default_stage() -> String {
    "local".to_string()
}

/// One SSH-reachable deployment target
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HostTarget {
    /// Display label; also the address unless `hostname` is set
    pub label: String,

    /// Address to connect to, when different from the label
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Stage tag used for selection (e.g. "local", "prod")
    #[serde(default = "default_stage")]
    pub stage: String,

    /// Extra arguments passed through to ssh
    #[serde(default)]
    pub ssh_args: Vec<String>,
}

impl HostTarget {
    /// Address ssh should connect to
    pub fn address(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.label)
    }

    /// Build a host from SITEFLEET_* environment overrides, if set
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SITEFLEET_HOST").ok()?;
        let port = std::env::var("SITEFLEET_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(default_port);
        Some(Self {
            label: host,
            hostname: None,
            user: std::env::var("SITEFLEET_USER").unwrap_or_else(|_| default_user()),
            port,
            stage: std::env::var("SITEFLEET_STAGE").unwrap_or_else(|_| "prod".to_string()),
            ssh_args: Vec::new(),
        })
    }
}

/// Pick the host a deployment should run against.
///
/// Precedence: explicit `--host` label, then `--stage` tag, then the
/// environment override, then the first declared host.
pub fn select_host(
    declared: &[HostTarget],
    env_host: Option<HostTarget>,
    label: Option<&str>,
    stage: Option<&str>,
) -> Result<HostTarget> {
    if let Some(label) = label {
        return match declared.iter().chain(env_host.as_ref()).find(|h| h.label == label) {
            Some(h) => Ok(h.clone()),
            None => bail!("no host with label '{label}' is configured"),
        };
    }

    if let Some(stage) = stage {
        // Env host wins within its stage: it was set for this invocation.
        if let Some(h) = env_host.iter().chain(declared.iter()).find(|h| h.stage == stage) {
            return Ok(h.clone());
        }
        bail!("no host with stage '{stage}' is configured");
    }

    if let Some(h) = env_host {
        return Ok(h);
    }

    match declared.first() {
        Some(h) => Ok(h.clone()),
        None => bail!("no hosts are configured (declare [[hosts]] or set SITEFLEET_HOST)"),
    }
}
