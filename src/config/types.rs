use crate::parsers::{PacingStrategy, ParserKind, ParserSettings};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Black Library
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub library: LibraryConfig,
}

/// Where section files and the catalog database live
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for section files, one subdirectory per work
    #[serde(rename = "storage-path")]
    pub storage_path: String,

    /// Path to the SQLite catalog
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Parser manager configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Number of concurrent parsers per source worker
    #[serde(rename = "worker-count", default = "default_worker_count")]
    pub worker_count: usize,

    /// Short names of the sources to start workers for (empty means all)
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            sources: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Sources to start workers for; unknown names are skipped
    pub fn kinds(&self) -> Vec<ParserKind> {
        if self.sources.is_empty() {
            return ParserKind::SUPPORTED.to_vec();
        }
        self.sources
            .iter()
            .filter_map(|name| ParserKind::from_short_name(name))
            .collect()
    }
}

/// Section loop timing and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// Length of one section loop tick (milliseconds)
    #[serde(rename = "tick-ms", default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Wait before the first section fetch (seconds)
    #[serde(rename = "politeness-wait-secs", default = "default_politeness_wait")]
    pub politeness_wait_secs: u64,

    /// Total timeout of a single fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Attempts per section before the variant gives up
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait-time generator used between sections
    #[serde(default)]
    pub pacing: PacingStrategy,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            politeness_wait_secs: default_politeness_wait(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_attempts: default_max_attempts(),
            pacing: PacingStrategy::default(),
        }
    }
}

impl ParserConfig {
    /// Converts the on-disk representation into runtime parser settings
    pub fn settings(&self) -> ParserSettings {
        ParserSettings {
            tick: Duration::from_millis(self.tick_ms),
            politeness_wait: Duration::from_secs(self.politeness_wait_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_attempts: self.max_attempts,
            pacing: self.pacing,
        }
    }
}

/// Embedding application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LibraryConfig {
    /// Optional file listing work URLs, one per line
    #[serde(rename = "url-list", default)]
    pub url_list: Option<String>,

    /// Seconds between library cycles, also the refresh interval of a work
    #[serde(rename = "refresh-interval-secs", default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            url_list: None,
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

fn default_worker_count() -> usize {
    1
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_politeness_wait() -> u64 {
    15
}

fn default_fetch_timeout() -> u64 {
    15
}

fn default_max_attempts() -> u32 {
    5
}

fn default_refresh_interval() -> u64 {
    21600
}
