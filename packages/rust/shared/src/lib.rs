//! Shared types, error model, and configuration for clipdesk.
//!
//! This crate is the foundation depended on by all other clipdesk crates.
//! It provides:
//! - [`ClipdeskError`] — the unified error type
//! - Domain types ([`PreviewItem`], [`ScrapedArticle`], [`GroupedPool`], [`CurationSelection`])
//! - Article identity and title normalization ([`ArticleIdentity`], [`normalize_title`])
//! - Configuration ([`AppConfig`], [`CurationInstance`], config loading)

pub mod config;
pub mod error;
pub mod identity;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CurationInstance, DefaultsConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from,
};
pub use error::{ClipdeskError, Result};
pub use identity::{ArticleIdentity, extract_news_id, normalize_title, normalize_url};
pub use types::{
    AiAnalysis, CategoryLabel, CategoryList, CurationSelection, GroupedPool, PreviewItem,
    ScrapedArticle, checkpoint_files,
};
