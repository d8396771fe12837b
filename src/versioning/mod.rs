//! Section versioning
//!
//! Hashes fetched section markup, compares it against the persisted checksum
//! records, and decides whether a section has to be written again.

mod engine;

pub use engine::{SectionRef, VersionCheck, VersionEngine};

use crate::storage::StorageError;
use md5::{Digest, Md5};
use thiserror::Error;

/// Errors raised while checking or recording section versions
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for versioning operations
pub type VersionResult<T> = Result<T, VersionError>;

/// Computes the lowercase hex MD5 digest of section content
pub fn md5_hex(content: &str) -> String {
    hex::encode(Md5::digest(content.as_bytes()))
}
