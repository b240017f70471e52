// Catalog inspection
pub mod list;

// Single-site and whole-catalog deployment
pub mod deploy;
