//! Parsing engine and its scheduling layer
//!
//! This module contains:
//! - the shared job, result and status types
//! - the `parse` driver and the two pagination variants
//! - one source implementation per supported site
//! - the factory, the per-source worker pool and the manager that routes
//!   jobs to workers

mod collections;
mod common;
mod engine;
mod factory;
mod fetcher;
mod html;
mod index_entry;
mod linked_list;
mod manager;
mod pacing;
mod sources;
mod worker;

pub use collections::{BlockingMap, BlockingQueue};
pub use common::{
    sanitize_file_name, section_file_name, section_file_stem, DatabaseStatusCallback, IndexEntry,
    JobKey, JobResult, JobStatus, JobStatusCallback, JobStatusTracker, ManagerNotifyCallback,
    ParserBehaviorKind, ParserJob, ParserKind, ParserResult, ProgressCallback, ResultMetadata,
    SectionInfo, VersionReadCallback,
};
pub use engine::{
    parse, Parser, ParserCore, ParserSettings, SectionSave, SectionTarget, DEFAULT_AUTHOR,
};
pub use factory::ParserFactory;
pub use fetcher::Fetcher;
pub use index_entry::{IndexEntryParser, IndexEntrySource, SectionContent, SourceMetadata};
pub use linked_list::{LinkedListParser, LinkedListSource, LinkedSection};
pub use manager::ParserManager;
pub use pacing::{PacingStrategy, ReaderTimeGenerator, ShortTimeGenerator, TimeGenerator};
pub use sources::{Ao3Source, RoyalRoadSource, WordPressSource, XenForoSource};
pub use worker::ParserWorker;

use crate::versioning::VersionError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building parsers or running a job
///
/// None of these cross the worker boundary: a failed job is reported as a
/// `JobResult` with `has_error` set.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("No parser for source {0}")]
    UnsupportedSource(ParserKind),

    #[error("Job field '{0}' is empty")]
    EmptyJobField(&'static str),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Discovery failed: {0}")]
    Discovery(String),

    #[error("Section error: {0}")]
    Section(String),

    #[error("Failed to write {}: {source}", path.display())]
    SectionWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Storage directory {} is unusable: {reason}", path.display())]
    StorageDirectory { path: PathBuf, reason: String },

    #[error("Stopped after a storage failure on job {0}")]
    StorageFailed(String),

    #[error("Versioning error: {0}")]
    Version(#[from] VersionError),

    #[error("Parse cancelled")]
    Cancelled,
}
