//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{ChecksumRecord, ErrorEntry, RefreshEntry, WorkEntry, WorkStage};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Work entry not found: {0}")]
    WorkNotFound(String),

    #[error("Work entry already exists: {0}")]
    WorkExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
///
/// Lookups return `Ok(None)` when nothing matches, so callers can tell
/// "not found" apart from a failed query.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This is the narrow persistence interface the versioning engine and the
/// library consume. Implementations are not required to be `Sync`; shared
/// access goes through a mutex.
pub trait Storage {
    // ===== Work Entries =====

    /// Creates a new work entry
    ///
    /// Fails with `WorkExists` if the uuid is already present.
    fn create_work_entry(&mut self, entry: &WorkEntry) -> StorageResult<()>;

    /// Reads a work entry by uuid
    fn read_work_entry(&self, uuid: &str) -> StorageResult<Option<WorkEntry>>;

    /// Replaces every column of an existing work entry
    fn update_work_entry(&mut self, entry: &WorkEntry) -> StorageResult<()>;

    /// Deletes a work entry, returning whether a row was removed
    fn delete_work_entry(&mut self, uuid: &str) -> StorageResult<bool>;

    /// Checks whether a work entry exists
    fn work_entry_exists(&self, uuid: &str) -> StorageResult<bool>;

    /// Looks up the uuid of the work registered for a URL
    fn work_entry_uuid_by_url(&self, url: &str) -> StorageResult<Option<String>>;

    /// Lists work entries, optionally restricted to one stage
    fn list_work_entries(&self, stage: Option<WorkStage>) -> StorageResult<Vec<WorkEntry>>;

    // ===== Checksums =====

    /// Inserts a checksum record
    fn create_md5(&mut self, record: &ChecksumRecord) -> StorageResult<()>;

    /// Updates the checksum record stored at `(work_id, ordinal)`
    fn update_md5(&mut self, record: &ChecksumRecord) -> StorageResult<()>;

    /// Reads the checksum record at `(work_id, ordinal)`
    fn read_md5(&self, work_id: &str, ordinal: usize) -> StorageResult<Option<ChecksumRecord>>;

    /// Reads a checksum record by its section identifier
    fn read_md5_by_section_id(
        &self,
        work_id: &str,
        section_id: &str,
    ) -> StorageResult<Option<ChecksumRecord>>;

    /// Reads a checksum record by its sequence number
    fn read_md5_by_seq_num(
        &self,
        work_id: &str,
        seq_num: i64,
    ) -> StorageResult<Option<ChecksumRecord>>;

    /// Reads all checksum records of a work ordered by ordinal
    fn read_md5s(&self, work_id: &str) -> StorageResult<Vec<ChecksumRecord>>;

    /// Checks whether a checksum record exists at `(work_id, ordinal)`
    fn md5_exists(&self, work_id: &str, ordinal: usize) -> StorageResult<bool>;

    /// Deletes the checksum record at `(work_id, ordinal)`
    fn delete_md5(&mut self, work_id: &str, ordinal: usize) -> StorageResult<bool>;

    // ===== Refresh Schedule =====

    /// Creates or moves the refresh entry of a work
    fn upsert_refresh(&mut self, entry: &RefreshEntry) -> StorageResult<()>;

    /// Reads the refresh entry of a work
    fn read_refresh(&self, work_id: &str) -> StorageResult<Option<RefreshEntry>>;

    /// Deletes the refresh entry of a work
    fn delete_refresh(&mut self, work_id: &str) -> StorageResult<bool>;

    /// Reads the refresh entry with the earliest due date
    fn next_refresh(&self) -> StorageResult<Option<RefreshEntry>>;

    // ===== Error Entries =====

    /// Records a section that exhausted its attempts
    fn create_error_entry(&mut self, entry: &ErrorEntry) -> StorageResult<()>;

    /// Checks whether an error entry exists
    fn error_entry_exists(&self, work_id: &str, progress_num: usize) -> StorageResult<bool>;

    /// Lists all error entries
    fn list_error_entries(&self) -> StorageResult<Vec<ErrorEntry>>;

    /// Deletes an error entry
    fn delete_error_entry(&mut self, work_id: &str, progress_num: usize) -> StorageResult<bool>;
}
