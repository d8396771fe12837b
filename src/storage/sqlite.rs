//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ChecksumRecord, ErrorEntry, RefreshEntry, WorkEntry, WorkStage};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const WORK_COLUMNS: &str = "uuid, url, last_url, title, author, nickname, source, series,
    series_length, media_path, birth_date, update_date, stage";

const MD5_COLUMNS: &str = "work_id, ordinal, md5_sum, date, section_id, seq_num, version_num";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn work_from_row(row: &Row<'_>) -> rusqlite::Result<WorkEntry> {
    Ok(WorkEntry {
        uuid: row.get(0)?,
        url: row.get(1)?,
        last_url: row.get(2)?,
        title: row.get(3)?,
        author: row.get(4)?,
        nickname: row.get(5)?,
        source: row.get(6)?,
        series: row.get(7)?,
        series_length: row.get(8)?,
        media_path: row.get(9)?,
        birth_date: row.get(10)?,
        update_date: row.get(11)?,
        stage: WorkStage::from_db_string(&row.get::<_, String>(12)?).unwrap_or_default(),
    })
}

fn md5_from_row(row: &Row<'_>) -> rusqlite::Result<ChecksumRecord> {
    Ok(ChecksumRecord {
        work_id: row.get(0)?,
        ordinal: row.get::<_, i64>(1)? as usize,
        md5_sum: row.get(2)?,
        date: row.get(3)?,
        section_id: row.get(4)?,
        seq_num: row.get(5)?,
        version_num: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Work Entries =====

    fn create_work_entry(&mut self, entry: &WorkEntry) -> StorageResult<()> {
        if self.work_entry_exists(&entry.uuid)? {
            return Err(StorageError::WorkExists(entry.uuid.clone()));
        }

        self.conn.execute(
            &format!(
                "INSERT INTO work_entries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                WORK_COLUMNS
            ),
            params![
                entry.uuid,
                entry.url,
                entry.last_url,
                entry.title,
                entry.author,
                entry.nickname,
                entry.source,
                entry.series,
                entry.series_length,
                entry.media_path,
                entry.birth_date,
                entry.update_date,
                entry.stage.to_db_string(),
            ],
        )?;
        Ok(())
    }

    fn read_work_entry(&self, uuid: &str) -> StorageResult<Option<WorkEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {} FROM work_entries WHERE uuid = ?1", WORK_COLUMNS),
                params![uuid],
                work_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    fn update_work_entry(&mut self, entry: &WorkEntry) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE work_entries SET url = ?2, last_url = ?3, title = ?4, author = ?5,
             nickname = ?6, source = ?7, series = ?8, series_length = ?9, media_path = ?10,
             birth_date = ?11, update_date = ?12, stage = ?13
             WHERE uuid = ?1",
            params![
                entry.uuid,
                entry.url,
                entry.last_url,
                entry.title,
                entry.author,
                entry.nickname,
                entry.source,
                entry.series,
                entry.series_length,
                entry.media_path,
                entry.birth_date,
                entry.update_date,
                entry.stage.to_db_string(),
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::WorkNotFound(entry.uuid.clone()));
        }
        Ok(())
    }

    fn delete_work_entry(&mut self, uuid: &str) -> StorageResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM work_entries WHERE uuid = ?1", params![uuid])?;
        Ok(changed > 0)
    }

    fn work_entry_exists(&self, uuid: &str) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM work_entries WHERE uuid = ?1",
                params![uuid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn work_entry_uuid_by_url(&self, url: &str) -> StorageResult<Option<String>> {
        let uuid = self
            .conn
            .query_row(
                "SELECT uuid FROM work_entries WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        Ok(uuid)
    }

    fn list_work_entries(&self, stage: Option<WorkStage>) -> StorageResult<Vec<WorkEntry>> {
        let entries = match stage {
            Some(stage) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM work_entries WHERE stage = ?1 ORDER BY title, uuid",
                    WORK_COLUMNS
                ))?;
                let rows = stmt.query_map(params![stage.to_db_string()], work_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {} FROM work_entries ORDER BY title, uuid",
                    WORK_COLUMNS
                ))?;
                let rows = stmt.query_map([], work_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(entries)
    }

    // ===== Checksums =====

    fn create_md5(&mut self, record: &ChecksumRecord) -> StorageResult<()> {
        if self.md5_exists(&record.work_id, record.ordinal)? {
            return Err(StorageError::ConstraintViolation(format!(
                "md5 for {} ordinal {} already exists",
                record.work_id, record.ordinal
            )));
        }

        self.conn.execute(
            &format!(
                "INSERT INTO md5_sums ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                MD5_COLUMNS
            ),
            params![
                record.work_id,
                record.ordinal as i64,
                record.md5_sum,
                record.date,
                record.section_id,
                record.seq_num,
                record.version_num,
            ],
        )?;
        Ok(())
    }

    fn update_md5(&mut self, record: &ChecksumRecord) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE md5_sums SET md5_sum = ?3, date = ?4, section_id = ?5, seq_num = ?6,
             version_num = ?7
             WHERE work_id = ?1 AND ordinal = ?2",
            params![
                record.work_id,
                record.ordinal as i64,
                record.md5_sum,
                record.date,
                record.section_id,
                record.seq_num,
                record.version_num,
            ],
        )?;
        Ok(())
    }

    fn read_md5(&self, work_id: &str, ordinal: usize) -> StorageResult<Option<ChecksumRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM md5_sums WHERE work_id = ?1 AND ordinal = ?2",
                    MD5_COLUMNS
                ),
                params![work_id, ordinal as i64],
                md5_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn read_md5_by_section_id(
        &self,
        work_id: &str,
        section_id: &str,
    ) -> StorageResult<Option<ChecksumRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM md5_sums WHERE work_id = ?1 AND section_id = ?2
                     ORDER BY ordinal LIMIT 1",
                    MD5_COLUMNS
                ),
                params![work_id, section_id],
                md5_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn read_md5_by_seq_num(
        &self,
        work_id: &str,
        seq_num: i64,
    ) -> StorageResult<Option<ChecksumRecord>> {
        let record = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM md5_sums WHERE work_id = ?1 AND seq_num = ?2
                     ORDER BY ordinal LIMIT 1",
                    MD5_COLUMNS
                ),
                params![work_id, seq_num],
                md5_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn read_md5s(&self, work_id: &str) -> StorageResult<Vec<ChecksumRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM md5_sums WHERE work_id = ?1 ORDER BY ordinal",
            MD5_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![work_id], md5_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn md5_exists(&self, work_id: &str, ordinal: usize) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM md5_sums WHERE work_id = ?1 AND ordinal = ?2",
                params![work_id, ordinal as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn delete_md5(&mut self, work_id: &str, ordinal: usize) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM md5_sums WHERE work_id = ?1 AND ordinal = ?2",
            params![work_id, ordinal as i64],
        )?;
        Ok(changed > 0)
    }

    // ===== Refresh Schedule =====

    fn upsert_refresh(&mut self, entry: &RefreshEntry) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO refresh (work_id, refresh_date) VALUES (?1, ?2)
             ON CONFLICT(work_id) DO UPDATE SET refresh_date = excluded.refresh_date",
            params![entry.work_id, entry.refresh_date],
        )?;
        Ok(())
    }

    fn read_refresh(&self, work_id: &str) -> StorageResult<Option<RefreshEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT work_id, refresh_date FROM refresh WHERE work_id = ?1",
                params![work_id],
                |row| {
                    Ok(RefreshEntry {
                        work_id: row.get(0)?,
                        refresh_date: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    fn delete_refresh(&mut self, work_id: &str) -> StorageResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM refresh WHERE work_id = ?1", params![work_id])?;
        Ok(changed > 0)
    }

    fn next_refresh(&self) -> StorageResult<Option<RefreshEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT work_id, refresh_date FROM refresh ORDER BY refresh_date, work_id LIMIT 1",
                [],
                |row| {
                    Ok(RefreshEntry {
                        work_id: row.get(0)?,
                        refresh_date: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    // ===== Error Entries =====

    fn create_error_entry(&mut self, entry: &ErrorEntry) -> StorageResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO error_entries (work_id, progress_num) VALUES (?1, ?2)",
            params![entry.work_id, entry.progress_num as i64],
        )?;
        Ok(())
    }

    fn error_entry_exists(&self, work_id: &str, progress_num: usize) -> StorageResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM error_entries WHERE work_id = ?1 AND progress_num = ?2",
                params![work_id, progress_num as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_error_entries(&self) -> StorageResult<Vec<ErrorEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT work_id, progress_num FROM error_entries ORDER BY work_id, progress_num",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ErrorEntry {
                    work_id: row.get(0)?,
                    progress_num: row.get::<_, i64>(1)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn delete_error_entry(&mut self, work_id: &str, progress_num: usize) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM error_entries WHERE work_id = ?1 AND progress_num = ?2",
            params![work_id, progress_num as i64],
        )?;
        Ok(changed > 0)
    }
}
