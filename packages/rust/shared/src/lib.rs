//! Shared types, error model, and configuration for nimefetch.
//!
//! This crate is the foundation depended on by all other nimefetch crates.
//! It provides:
//! - [`NimeFetchError`]: the unified error type, classified by [`ErrorKind`]
//! - Domain types ([`CandidateList`], [`DownloadOutcome`], [`RunSummary`])
//! - Configuration ([`AppConfig`], [`FetchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_BASE_URL, DEFAULT_PAPERS_URL, FetchConfig, SourceConfig, TargetConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ErrorKind, NimeFetchError, Result, error_chain};
pub use types::{CandidateList, DownloadOutcome, RunSummary};
