//! Configuration module for Black Library
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use black_library::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("black-library.toml")).unwrap();
//! println!("Parsers per source: {}", config.manager.worker_count);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, LibraryConfig, ManagerConfig, ParserConfig, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
