//! Black Library: an incremental harvester for multi-section works
//!
//! This crate fetches fan-fiction archives, forum threads and blogs section by
//! section, skips sections whose content has not changed since the last run,
//! and writes new or changed sections to local storage while tracking
//! per-work crawl state.

pub mod config;
pub mod library;
pub mod parsers;
pub mod storage;
pub mod versioning;

use thiserror::Error;

/// Main error type for Black Library operations
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Parser error: {0}")]
    Parser(#[from] parsers::ParserError),

    #[error("Versioning error: {0}")]
    Version(#[from] versioning::VersionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Result type alias for Black Library operations
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use library::Library;
pub use parsers::{
    JobResult, JobStatus, JobStatusTracker, ParserFactory, ParserJob, ParserKind, ParserManager,
    ParserWorker,
};
pub use storage::{SqliteStorage, Storage};
pub use versioning::VersionEngine;
