//! Shared types, error model, and configuration for paperfeed.
//!
//! This crate is the foundation depended on by all other paperfeed crates.
//! It provides:
//! - [`PaperfeedError`], the unified error type
//! - Domain types ([`Paper`], [`PaperDraft`]) and their normalization rules
//! - Configuration ([`AppConfig`], [`CrawlPolicy`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArxivConfig, CrawlPolicy, DefaultsConfig, FiltersConfig, NatureConfig,
    OpenReviewConfig, config_dir, config_file_path, expand_home, init_config, init_config_at,
    load_config, load_config_from,
};
pub use error::{PaperfeedError, Result};
pub use types::{Paper, PaperDraft, normalize_date, normalize_text};
