//! The embedding application
//!
//! `Library` ties the catalog, the version engine and the parser manager
//! together: it turns a URL list into work entries, schedules crawls when
//! works are due, and persists what finished jobs report back.

mod urls;

pub use urls::{parse_url_list, read_url_list};

use crate::config::Config;
use crate::parsers::{JobResult, ParserFactory, ParserKind, ParserManager};
use crate::storage::{
    ErrorEntry, RefreshEntry, SqliteStorage, Storage, StorageResult, WorkEntry, WorkStage,
};
use crate::versioning::VersionEngine;
use crate::Result;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Library {
    config: Config,
    storage: Arc<Mutex<SqliteStorage>>,
    manager: ParserManager,
}

impl Library {
    /// Opens the catalog named by the config and builds the manager
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.storage.storage_path)?;
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        Self::with_storage(config, storage)
    }

    /// Builds a library on top of an already opened catalog
    pub fn with_storage(config: Config, storage: SqliteStorage) -> Result<Self> {
        let storage = Arc::new(Mutex::new(storage));
        let versioning = Arc::new(VersionEngine::new(storage.clone()));
        let factory = Arc::new(ParserFactory::new(
            Some(versioning.clone()),
            config.parser.settings(),
        ));

        let mut manager = ParserManager::new(
            factory,
            &config.storage.storage_path,
            config.manager.worker_count,
            config.manager.kinds(),
        );

        let progress_storage = storage.clone();
        manager.register_progress_callback(Arc::new(move |uuid: &str, number: usize, error: bool| {
            if let Err(e) = record_progress(&progress_storage, uuid, number, error) {
                tracing::error!(uuid = %uuid, "Failed to record progress {}: {}", number, e);
            }
        }));

        let status_storage = storage.clone();
        let refresh_interval = config.library.refresh_interval_secs as i64;
        manager.register_database_status_callback(Arc::new(move |result: JobResult| {
            let now = chrono::Utc::now().timestamp();
            if let Err(e) = record_result(&status_storage, &result, now, refresh_interval) {
                tracing::error!(uuid = %result.metadata.uuid, "Failed to record job result: {}", e);
            }
        }));

        let version_engine = versioning.clone();
        manager.register_version_read_callback(Arc::new(move |uuid: &str, ordinal: usize| {
            version_engine.read_version_num(uuid, ordinal)
        }));

        Ok(Self {
            config,
            storage,
            manager,
        })
    }

    pub fn manager(&self) -> &ParserManager {
        &self.manager
    }

    pub fn storage(&self) -> &Arc<Mutex<SqliteStorage>> {
        &self.storage
    }

    /// Every work in the catalog
    pub fn works(&self) -> Result<Vec<WorkEntry>> {
        Ok(lock(&self.storage).list_work_entries(None)?)
    }

    /// Reads the configured URL list, empty when none is configured
    pub fn pull_urls(&self) -> Result<Vec<String>> {
        let path = match &self.config.library.url_list {
            Some(path) => path,
            None => return Ok(Vec::new()),
        };

        match read_url_list(Path::new(path)) {
            Ok(urls) => {
                tracing::debug!("Pulled {} urls from {}", urls.len(), path);
                Ok(urls)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("URL list {} does not exist", path);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Maps each URL onto its work entry, creating entries for new URLs
    ///
    /// URLs no parser handles are skipped.
    pub fn reconcile(&self, urls: &[String]) -> Result<Vec<WorkEntry>> {
        let mut storage = lock(&self.storage);
        let mut entries = Vec::with_capacity(urls.len());

        for url in urls {
            let kind = ParserKind::from_url(url);
            if !kind.is_supported() {
                tracing::warn!("No parser for {}, skipping", url);
                continue;
            }

            if let Some(uuid) = storage.work_entry_uuid_by_url(url)? {
                if let Some(entry) = storage.read_work_entry(&uuid)? {
                    entries.push(entry);
                    continue;
                }
            }

            let entry = WorkEntry {
                uuid: uuid::Uuid::new_v4().to_string(),
                url: url.clone(),
                last_url: url.clone(),
                source: kind.source_name().to_string(),
                series_length: 1,
                stage: WorkStage::Staging,
                ..Default::default()
            };
            storage.create_work_entry(&entry)?;
            tracing::info!(uuid = %entry.uuid, "New work {}", url);
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Stored works that should be crawled at `now`
    pub fn due_entries(&self, now: i64) -> Result<Vec<WorkEntry>> {
        let storage = lock(&self.storage);
        let mut due = Vec::new();

        for entry in storage.list_work_entries(None)? {
            let is_due = entry.stage == WorkStage::Staging
                || match storage.read_refresh(&entry.uuid)? {
                    Some(refresh) => refresh.refresh_date <= now,
                    None => true,
                };
            if is_due {
                due.push(entry);
            }
        }

        Ok(due)
    }

    /// Queues a crawl for every entry, starting at its known length
    ///
    /// Returns how many jobs were queued.
    pub fn schedule(&self, entries: &[WorkEntry]) -> usize {
        entries
            .iter()
            .filter(|entry| {
                self.manager.add_job(
                    &entry.uuid,
                    &entry.url,
                    &entry.last_url,
                    entry.series_length as usize,
                    0,
                    false,
                )
            })
            .count()
    }

    /// Queues a replay for every recorded section failure
    pub fn schedule_error_entries(&self) -> Result<usize> {
        let storage = lock(&self.storage);
        let mut queued = 0;

        for error in storage.list_error_entries()? {
            let entry = match storage.read_work_entry(&error.work_id)? {
                Some(entry) => entry,
                None => {
                    tracing::warn!(uuid = %error.work_id, "Error entry for unknown work");
                    continue;
                }
            };

            if self.manager.add_job(
                &entry.uuid,
                &entry.url,
                &entry.last_url,
                error.progress_num,
                error.progress_num,
                true,
            ) {
                queued += 1;
            }
        }

        Ok(queued)
    }

    /// One library cycle: pull, reconcile, then schedule what is due
    pub fn run_once(&self) -> Result<usize> {
        let urls = self.pull_urls()?;
        self.reconcile(&urls)?;

        let due = self.due_entries(chrono::Utc::now().timestamp())?;
        let queued = self.schedule(&due) + self.schedule_error_entries()?;

        tracing::info!("Library cycle queued {} jobs", queued);
        Ok(queued)
    }

    /// Drives one manager tick
    pub fn tick(&mut self) {
        self.manager.run_once();
    }

    pub fn is_idle(&self) -> bool {
        self.manager.is_idle()
    }

    pub async fn stop(&mut self) {
        self.manager.stop().await;
    }
}

fn lock(storage: &Mutex<SqliteStorage>) -> MutexGuard<'_, SqliteStorage> {
    storage.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_progress(
    storage: &Mutex<SqliteStorage>,
    uuid: &str,
    number: usize,
    error: bool,
) -> StorageResult<()> {
    let mut storage = lock(storage);

    if error {
        if !storage.error_entry_exists(uuid, number)? {
            tracing::warn!(uuid = %uuid, "Recording failed section {}", number);
            storage.create_error_entry(&ErrorEntry {
                work_id: uuid.to_string(),
                progress_num: number,
            })?;
        }
        return Ok(());
    }

    if let Some(mut entry) = storage.read_work_entry(uuid)? {
        let number = u32::try_from(number).unwrap_or(u32::MAX);
        if number > entry.series_length {
            entry.series_length = number;
            storage.update_work_entry(&entry)?;
        }
    }

    Ok(())
}

fn record_result(
    storage: &Mutex<SqliteStorage>,
    result: &JobResult,
    now: i64,
    refresh_interval: i64,
) -> StorageResult<()> {
    let mut storage = lock(storage);
    let metadata = &result.metadata;

    let existing = storage.read_work_entry(&metadata.uuid)?;
    let is_new = existing.is_none();
    let mut entry = existing.unwrap_or_else(|| WorkEntry {
        uuid: metadata.uuid.clone(),
        url: metadata.url.clone(),
        last_url: metadata.url.clone(),
        ..Default::default()
    });

    entry.title = metadata.title.clone();
    entry.author = metadata.author.clone();
    entry.nickname = metadata.nickname.clone();
    entry.source = metadata.source.clone();
    entry.media_path = metadata.media_path.clone();
    if !metadata.series.is_empty() {
        entry.series = metadata.series.clone();
    }
    if !result.is_error_job && !metadata.last_url.is_empty() {
        entry.last_url = metadata.last_url.clone();
    }
    entry.series_length = entry.series_length.max(metadata.series_length);
    entry.update_date = entry.update_date.max(metadata.update_date);
    if entry.birth_date == 0 {
        entry.birth_date = now;
    }
    entry.stage = WorkStage::Complete;

    if is_new {
        storage.create_work_entry(&entry)?;
    } else {
        storage.update_work_entry(&entry)?;
    }

    if result.is_error_job {
        for number in result.start_number..=result.end_number.max(result.start_number) {
            storage.delete_error_entry(&entry.uuid, number)?;
        }
    }

    storage.upsert_refresh(&RefreshEntry {
        work_id: entry.uuid.clone(),
        refresh_date: now + refresh_interval,
    })?;

    tracing::info!(
        uuid = %entry.uuid,
        "Updated work '{}' ({} sections)",
        entry.title,
        entry.series_length
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LibraryConfig, ManagerConfig, ParserConfig, StorageConfig};
    use crate::parsers::{JobStatus, ParserJob, ResultMetadata};
    use tempfile::TempDir;

    fn config(dir: &TempDir, url_list: Option<String>) -> Config {
        Config {
            storage: StorageConfig {
                storage_path: dir.path().join("store").display().to_string(),
                database_path: dir.path().join("catalog.db").display().to_string(),
            },
            manager: ManagerConfig::default(),
            parser: ParserConfig::default(),
            library: LibraryConfig {
                url_list,
                refresh_interval_secs: 60,
            },
        }
    }

    fn library(dir: &TempDir) -> Library {
        Library::with_storage(config(dir, None), SqliteStorage::new_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_pull_urls() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("urls.txt");
        std::fs::write(&list, "https://www.royalroad.com/fiction/1/a\n\n# skip\n").unwrap();

        let library = Library::with_storage(
            config(&dir, Some(list.display().to_string())),
            SqliteStorage::new_in_memory().unwrap(),
        )
        .unwrap();
        assert_eq!(library.pull_urls().unwrap(), vec!["https://www.royalroad.com/fiction/1/a"]);

        let missing = Library::with_storage(
            config(&dir, Some(dir.path().join("none.txt").display().to_string())),
            SqliteStorage::new_in_memory().unwrap(),
        )
        .unwrap();
        assert!(missing.pull_urls().unwrap().is_empty());
    }

    #[test]
    fn test_reconcile_creates_then_reuses_entries() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let urls = vec![
            "https://www.royalroad.com/fiction/1/a".to_string(),
            "https://www.youtube.com/playlist?list=x".to_string(),
        ];

        let first = library.reconcile(&urls).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].stage, WorkStage::Staging);
        assert_eq!(first[0].last_url, urls[0]);
        assert_eq!(first[0].series_length, 1);
        assert_eq!(first[0].source, ParserKind::Rr.source_name());

        let second = library.reconcile(&urls).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].uuid, first[0].uuid);
        assert_eq!(library.works().unwrap().len(), 1);
    }

    #[test]
    fn test_schedule_queues_due_entries_once() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let urls = vec!["https://www.royalroad.com/fiction/1/a".to_string()];
        library.reconcile(&urls).unwrap();

        let due = library.due_entries(0).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(library.schedule(&due), 1);
        assert_eq!(library.schedule(&due), 0);

        let jobs = library.manager().get_current_job_list();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::ManagerQueued);
    }

    #[test]
    fn test_complete_entry_waits_for_refresh() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let url = "https://www.royalroad.com/fiction/1/a".to_string();
        let entry = library.reconcile(&[url.clone()]).unwrap().remove(0);

        let mut result = JobResult::failed(&ParserJob::new(entry.uuid.clone(), url));
        result.has_error = false;
        record_result(library.storage(), &result, 1000, 60).unwrap();

        assert!(library.due_entries(1059).unwrap().is_empty());
        assert_eq!(library.due_entries(1060).unwrap().len(), 1);
    }

    #[test]
    fn test_record_progress() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let url = "https://www.royalroad.com/fiction/1/a".to_string();
        let entry = library.reconcile(&[url]).unwrap().remove(0);

        record_progress(library.storage(), &entry.uuid, 4, false).unwrap();
        record_progress(library.storage(), &entry.uuid, 2, false).unwrap();
        record_progress(library.storage(), &entry.uuid, 5, true).unwrap();
        record_progress(library.storage(), &entry.uuid, 5, true).unwrap();

        let storage = lock(library.storage());
        assert_eq!(storage.read_work_entry(&entry.uuid).unwrap().unwrap().series_length, 4);
        let errors = storage.list_error_entries().unwrap();
        assert_eq!(
            errors,
            vec![ErrorEntry {
                work_id: entry.uuid.clone(),
                progress_num: 5
            }]
        );
    }

    #[test]
    fn test_record_result_completes_work() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let url = "https://www.royalroad.com/fiction/1/a".to_string();
        let entry = library.reconcile(&[url.clone()]).unwrap().remove(0);

        let result = JobResult {
            metadata: ResultMetadata {
                uuid: entry.uuid.clone(),
                title: "a".to_string(),
                author: "someone".to_string(),
                source: ParserKind::Rr.source_name().to_string(),
                url: url.clone(),
                last_url: format!("{}/chapter/3/c", url),
                series_length: 3,
                update_date: 500,
                ..Default::default()
            },
            start_number: 1,
            end_number: 0,
            is_error_job: false,
            has_error: false,
        };
        record_result(library.storage(), &result, 1000, 60).unwrap();

        let storage = lock(library.storage());
        let stored = storage.read_work_entry(&entry.uuid).unwrap().unwrap();
        assert_eq!(stored.stage, WorkStage::Complete);
        assert_eq!(stored.title, "a");
        assert_eq!(stored.series_length, 3);
        assert_eq!(stored.birth_date, 1000);
        assert_eq!(stored.update_date, 500);
        assert_eq!(stored.last_url, result.metadata.last_url);
        assert_eq!(
            storage.read_refresh(&entry.uuid).unwrap().unwrap().refresh_date,
            1060
        );
    }

    #[test]
    fn test_error_replay_clears_entry_and_keeps_resume_point() {
        let dir = TempDir::new().unwrap();
        let library = library(&dir);
        let url = "https://www.royalroad.com/fiction/1/a".to_string();
        let entry = library.reconcile(&[url.clone()]).unwrap().remove(0);
        record_progress(library.storage(), &entry.uuid, 2, true).unwrap();

        assert_eq!(library.schedule_error_entries().unwrap(), 1);
        let jobs = library.manager().get_current_job_list();
        assert!(jobs.iter().all(|job| job.is_error_job));

        let mut job = ParserJob::new(entry.uuid.clone(), url.clone());
        job.start_number = 2;
        job.end_number = 2;
        job.is_error_job = true;
        let mut result = JobResult::failed(&job);
        result.metadata.last_url = format!("{}/chapter/2/b", url);
        result.has_error = false;
        record_result(library.storage(), &result, 1000, 60).unwrap();

        let storage = lock(library.storage());
        assert!(storage.list_error_entries().unwrap().is_empty());
        assert_eq!(storage.read_work_entry(&entry.uuid).unwrap().unwrap().last_url, url);
    }
}
