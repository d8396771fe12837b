//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Black Library catalog.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Works discovered or harvested
CREATE TABLE IF NOT EXISTS work_entries (
    uuid TEXT PRIMARY KEY,
    url TEXT NOT NULL UNIQUE,
    last_url TEXT NOT NULL DEFAULT '',
    title TEXT NOT NULL DEFAULT '',
    author TEXT NOT NULL DEFAULT '',
    nickname TEXT NOT NULL DEFAULT '',
    source TEXT NOT NULL DEFAULT '',
    series TEXT NOT NULL DEFAULT '',
    series_length INTEGER NOT NULL DEFAULT 1,
    media_path TEXT NOT NULL DEFAULT '',
    birth_date INTEGER NOT NULL DEFAULT 0,
    update_date INTEGER NOT NULL DEFAULT 0,
    stage TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_work_entries_stage ON work_entries(stage);

-- One checksum per saved section
CREATE TABLE IF NOT EXISTS md5_sums (
    work_id TEXT NOT NULL,
    ordinal INTEGER NOT NULL,
    md5_sum TEXT NOT NULL,
    date INTEGER NOT NULL,
    section_id TEXT NOT NULL,
    seq_num INTEGER,
    version_num INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (work_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_md5_sums_section ON md5_sums(work_id, section_id);
CREATE INDEX IF NOT EXISTS idx_md5_sums_seq ON md5_sums(work_id, seq_num);

-- Refresh schedule
CREATE TABLE IF NOT EXISTS refresh (
    work_id TEXT PRIMARY KEY,
    refresh_date INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_refresh_date ON refresh(refresh_date);

-- Sections waiting on the error replay lane
CREATE TABLE IF NOT EXISTS error_entries (
    work_id TEXT NOT NULL,
    progress_num INTEGER NOT NULL,
    PRIMARY KEY (work_id, progress_num)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        let result = initialize_schema(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize_schema(&conn).unwrap();
        let result = initialize_schema(&conn);

        assert!(result.is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["work_entries", "md5_sums", "refresh", "error_entries"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
