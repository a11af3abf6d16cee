//! Configuration module for Herbarium-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use herbarium_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Timeout window: {:?}", config.aggregation.timeout_window());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AggregationConfig, Config, FetchConfig, OutputConfig, SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
