//! Version checks against persisted checksums

use crate::storage::{ChecksumRecord, SqliteStorage, Storage, StorageResult};
use crate::versioning::{md5_hex, VersionResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies the section a piece of content belongs to
#[derive(Debug, Clone, Copy)]
pub struct SectionRef<'a> {
    pub work_id: &'a str,
    /// 0-based position of the section within the work
    pub ordinal: usize,
    /// Source-derived identifier, used when nothing is stored at `ordinal`
    pub section_id: &'a str,
    /// Source-derived sequence number, last lookup fallback
    pub seq_num: Option<i64>,
    /// Published or modified time (unix seconds)
    pub date: i64,
}

/// Outcome of a version check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub content_hash: String,
    /// True iff a stored record has the same hash and date
    pub already_exists: bool,
    /// Version the section file should carry
    pub version_num: u16,
    /// Record that sat at the ordinal before this check overwrote it
    pub previous: Option<ChecksumRecord>,
}

/// Decides whether fetched sections are new and records their checksums
///
/// Reads go straight to storage. Check-then-write sequences for one work are
/// serialized through a per-work lock so two tasks can never interleave
/// between the lookup and the upsert.
pub struct VersionEngine {
    storage: Arc<Mutex<SqliteStorage>>,
    upsert_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VersionEngine {
    /// Creates an engine on top of shared storage
    pub fn new(storage: Arc<Mutex<SqliteStorage>>) -> Self {
        Self {
            storage,
            upsert_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the shared storage handle
    pub fn storage(&self) -> &Arc<Mutex<SqliteStorage>> {
        &self.storage
    }

    /// Hashes `content` and compares it with what is stored for `section`
    ///
    /// When the content is new or changed the checksum is written at the
    /// section's ordinal before returning, so an identical second call
    /// reports `already_exists = true`.
    ///
    /// # Arguments
    ///
    /// * `content` - Raw section markup as it will be saved
    /// * `section` - Work id, ordinal and fallback identifiers of the section
    ///
    /// # Returns
    ///
    /// * `Ok(VersionCheck)` - Hash, existence flag and version number
    /// * `Err(VersionError)` - Storage lookup or write failed
    pub fn check_version(&self, content: &str, section: &SectionRef<'_>) -> VersionResult<VersionCheck> {
        let content_hash = md5_hex(content);
        tracing::debug!(
            uuid = section.work_id,
            index = section.ordinal,
            hash = %content_hash,
            "Section checksum"
        );

        let work_lock = self.work_lock(section.work_id);
        let _guard = work_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut storage = self.lock_storage();

        if !storage.work_entry_exists(section.work_id)? {
            tracing::warn!(uuid = section.work_id, "Work entry does not exist for md5 read");
        }

        let at_ordinal = storage.read_md5(section.work_id, section.ordinal)?;
        let matched = match &at_ordinal {
            Some(record) => Some(record.clone()),
            None => find_fallback(&*storage, section)?,
        };

        if let Some(record) = &matched {
            if record.md5_sum == content_hash && record.date == section.date {
                tracing::debug!(
                    uuid = section.work_id,
                    index = record.ordinal,
                    "Version hash matches, skip file save"
                );
                return Ok(VersionCheck {
                    content_hash,
                    already_exists: true,
                    version_num: record.version_num,
                    previous: at_ordinal,
                });
            }
        }

        let version_num = matched
            .as_ref()
            .map(|record| record.version_num.saturating_add(1))
            .unwrap_or(0);

        let record = ChecksumRecord {
            work_id: section.work_id.to_string(),
            ordinal: section.ordinal,
            md5_sum: content_hash.clone(),
            date: section.date,
            section_id: section.section_id.to_string(),
            seq_num: section.seq_num,
            version_num,
        };
        upsert(&mut *storage, &record)?;

        Ok(VersionCheck {
            content_hash,
            already_exists: false,
            version_num,
            previous: at_ordinal,
        })
    }

    /// Undoes the write made by a `check_version` whose section never reached disk
    pub fn restore(&self, section: &SectionRef<'_>, previous: Option<&ChecksumRecord>) -> VersionResult<()> {
        let work_lock = self.work_lock(section.work_id);
        let _guard = work_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut storage = self.lock_storage();

        match previous {
            Some(record) => upsert(&mut *storage, record)?,
            None => {
                storage.delete_md5(section.work_id, section.ordinal)?;
            }
        }
        Ok(())
    }

    /// Updates the record at the same `(work_id, ordinal)` or creates it
    pub fn upsert_md5(&self, record: &ChecksumRecord) -> VersionResult<()> {
        let work_lock = self.work_lock(&record.work_id);
        let _guard = work_lock.lock().unwrap_or_else(PoisonError::into_inner);
        upsert(&mut *self.lock_storage(), record)?;
        Ok(())
    }

    /// Reads the checksum stored at `(work_id, ordinal)`
    pub fn read_md5(&self, work_id: &str, ordinal: usize) -> VersionResult<Option<ChecksumRecord>> {
        let storage = self.lock_storage();
        if !storage.work_entry_exists(work_id)? {
            tracing::warn!(uuid = work_id, "Work entry does not exist for md5 read");
        }
        Ok(storage.read_md5(work_id, ordinal)?)
    }

    /// Reads every checksum of a work ordered by ordinal
    pub fn read_md5s(&self, work_id: &str) -> VersionResult<Vec<ChecksumRecord>> {
        Ok(self.lock_storage().read_md5s(work_id)?)
    }

    /// Stored version number of a section, 0 when nothing is stored
    pub fn read_version_num(&self, work_id: &str, ordinal: usize) -> u16 {
        match self.lock_storage().read_md5(work_id, ordinal) {
            Ok(Some(record)) => record.version_num,
            Ok(None) => 0,
            Err(e) => {
                tracing::error!(uuid = work_id, index = ordinal, "Version read failed: {}", e);
                0
            }
        }
    }

    fn lock_storage(&self) -> MutexGuard<'_, SqliteStorage> {
        self.storage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn work_lock(&self, work_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .upsert_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(work_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn find_fallback(
    storage: &dyn Storage,
    section: &SectionRef<'_>,
) -> StorageResult<Option<ChecksumRecord>> {
    if !section.section_id.is_empty() {
        if let Some(record) = storage.read_md5_by_section_id(section.work_id, section.section_id)? {
            return Ok(Some(record));
        }
    }

    match section.seq_num {
        Some(seq_num) => storage.read_md5_by_seq_num(section.work_id, seq_num),
        None => Ok(None),
    }
}

fn upsert(storage: &mut dyn Storage, record: &ChecksumRecord) -> StorageResult<()> {
    if storage.md5_exists(&record.work_id, record.ordinal)? {
        storage.update_md5(record)
    } else {
        storage.create_md5(record)
    }
}
