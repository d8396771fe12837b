//! Storage module for the work catalog
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Work entry persistence (staged and completed works)
//! - Section checksum records used for version checks
//! - The refresh schedule and the error replay lane

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// A work tracked by the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkEntry {
    pub uuid: String,
    pub url: String,
    pub last_url: String,
    pub title: String,
    pub author: String,
    pub nickname: String,
    pub source: String,
    pub series: String,
    pub series_length: u32,
    pub media_path: String,
    pub birth_date: i64,
    pub update_date: i64,
    pub stage: WorkStage,
}

/// Lifecycle stage of a work entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WorkStage {
    /// Discovered but never harvested successfully
    #[default]
    Staging,
    /// Harvested at least once
    Complete,
}

impl WorkStage {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Complete => "complete",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "staging" => Some(Self::Staging),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Persisted checksum of one saved section
///
/// At most one record exists per `(work_id, ordinal)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumRecord {
    pub work_id: String,
    pub ordinal: usize,
    pub md5_sum: String,
    /// Published or modified time of the section (unix seconds)
    pub date: i64,
    /// Source-derived identifier of the section, e.g. a chapter slug
    pub section_id: String,
    /// Source-derived sequence number, when the source has one
    pub seq_num: Option<i64>,
    pub version_num: u16,
}

/// When a work should next be harvested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEntry {
    pub work_id: String,
    pub refresh_date: i64,
}

/// A section that exhausted its attempts and should be replayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub work_id: String,
    /// 1-based section number that failed
    pub progress_num: usize,
}
