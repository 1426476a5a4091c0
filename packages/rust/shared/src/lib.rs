//! Shared types, error model, and configuration for seobatch.
//!
//! This crate is the foundation depended on by all other seobatch crates.
//! It provides:
//! - [`SeoBatchError`] — the unified error type
//! - Domain types ([`TargetAddress`], [`CrawlOutcome`], [`BatchReport`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, CrawlerConfig, ExportConfig, InputConfig, InvokerConfig,
    PathsConfig, RunConfig, config_dir, config_file_path, discover_config, init_config,
    load_config, load_config_from, validate_config,
};
pub use error::{Result, SeoBatchError};
pub use types::{BatchEntry, BatchReport, CrawlOutcome, EntryStatus, TargetAddress};
