//! Configuration types, TOML loading, and validation
//!
//! Environment handling lives outside this crate; callers hand the pipeline a
//! typed [`Config`], usually produced by [`load_config`].

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, hash_config_content, load_config, load_config_with_hash};
pub use types::{
    Config, CoverageConfig, CrawlerConfig, RetryConfig, SiteConfig, StorageConfig, UserAgentConfig,
};
pub use validation::validate;
