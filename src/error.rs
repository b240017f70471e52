//! Error types for site resolution and deployment

use thiserror::Error;

/// Errors that can occur while resolving or deploying sites
#[derive(Error, Debug)]
pub enum Error {
    /// A site declaration is missing a required field
    #[error("invalid site '{site}': {field} is required")]
    InvalidSite { site: String, field: &'static str },

    /// The requested site is not in the (possibly filtered) catalog
    #[error("site '{name}' is not defined in the configuration{}", fmt_filter(.source_filter))]
    SiteNotFound {
        name: String,
        source_filter: Option<String>,
    },

    /// The catalog (or filtered subset) is empty
    #[error("no sites are defined in the configuration{}", fmt_filter(.source_filter))]
    NoSites { source_filter: Option<String> },

    /// A pipeline stage failed against the remote host
    #[error("stage '{stage}' failed for site '{site}' on {host}: {cause}")]
    Stage {
        stage: &'static str,
        site: String,
        host: String,
        cause: anyhow::Error,
    },
}

fn fmt_filter(filter: &Option<String>) -> String {
    match filter {
        Some(s) => format!(" (source '{s}')"),
        None => String::new(),
    }
}

impl Error {
    /// Whether this error should be reported and swallowed at the command
    /// boundary instead of failing the process
    pub fn is_resolution(&self) -> bool {
        !matches!(self, Self::Stage { .. })
    }
}

/// Result type for site operations
pub type Result<T> = std::result::Result<T, Error>;
