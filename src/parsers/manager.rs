//! Top-level job scheduler
//!
//! The manager owns one worker per configured source. Jobs are queued at
//! the manager, routed to a worker by URL on the next tick, and removed from
//! the in-flight map once their result comes back.

use crate::parsers::collections::{BlockingMap, BlockingQueue};
use crate::parsers::common::{
    DatabaseStatusCallback, JobKey, JobResult, JobStatus, JobStatusTracker, ParserJob,
    ParserKind, ProgressCallback, VersionReadCallback,
};
use crate::parsers::factory::ParserFactory;
use crate::parsers::worker::ParserWorker;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Routes jobs to per-source workers and tracks every in-flight job
pub struct ParserManager {
    workers: BTreeMap<ParserKind, ParserWorker>,
    jobs: BlockingQueue<ParserJob>,
    current_jobs: Arc<BlockingMap<JobKey, JobStatusTracker>>,
    results_rx: mpsc::UnboundedReceiver<JobResult>,
    database_status_callback: Option<DatabaseStatusCallback>,
}

impl ParserManager {
    /// Creates a manager with one worker per source in `kinds`
    ///
    /// Sources without a parser are skipped with a warning. Each worker runs
    /// at most `num_parsers` jobs at once and stores sections under
    /// `storage_path/<uuid>`.
    pub fn new(
        factory: Arc<ParserFactory>,
        storage_path: impl Into<PathBuf>,
        num_parsers: usize,
        kinds: impl IntoIterator<Item = ParserKind>,
    ) -> Self {
        let storage_path = storage_path.into();
        let current_jobs: Arc<BlockingMap<JobKey, JobStatusTracker>> = Arc::new(BlockingMap::new());
        let (results_tx, results_rx) = mpsc::unbounded_channel();

        let mut workers = BTreeMap::new();
        for kind in kinds {
            if !kind.is_supported() {
                tracing::warn!("No parser for {}, skipping worker", kind.source_name());
                continue;
            }

            let mut worker = ParserWorker::new(kind, factory.clone(), &storage_path, num_parsers);

            let status_map = current_jobs.clone();
            worker.register_job_status_callback(Arc::new(move |job: &ParserJob, status: JobStatus| {
                let tracker = JobStatusTracker {
                    uuid: job.uuid.clone(),
                    status,
                    is_error_job: job.is_error_job,
                };
                status_map.find_and_replace(&job.key(), tracker);
            }));

            let tx = results_tx.clone();
            worker.register_manager_notify_callback(Arc::new(move |result: JobResult| {
                if tx.send(result).is_err() {
                    tracing::warn!("Manager is gone, dropping job result");
                }
            }));

            tracing::info!(
                "Started worker for {} with {} parsers",
                kind.source_name(),
                num_parsers
            );
            workers.insert(kind, worker);
        }

        Self {
            workers,
            jobs: BlockingQueue::new(),
            current_jobs,
            results_rx,
            database_status_callback: None,
        }
    }

    /// Creates a manager with a worker for every supported source
    pub fn with_all_sources(
        factory: Arc<ParserFactory>,
        storage_path: impl Into<PathBuf>,
        num_parsers: usize,
    ) -> Self {
        Self::new(factory, storage_path, num_parsers, ParserKind::SUPPORTED)
    }

    pub fn register_database_status_callback(&mut self, callback: DatabaseStatusCallback) {
        self.database_status_callback = Some(callback);
    }

    pub fn register_progress_callback(&mut self, callback: ProgressCallback) {
        for worker in self.workers.values_mut() {
            worker.register_progress_callback(callback.clone());
        }
    }

    pub fn register_version_read_callback(&mut self, callback: VersionReadCallback) {
        for worker in self.workers.values_mut() {
            worker.register_version_read_callback(callback.clone());
        }
    }

    /// Queues a crawl of one work
    ///
    /// `start_number` below 1 is raised to 1. A job whose
    /// `(uuid, is_error_job)` is already in flight is ignored.
    ///
    /// # Returns
    ///
    /// `true` if the job was queued, `false` if it was a duplicate.
    pub fn add_job(
        &self,
        uuid: &str,
        url: &str,
        last_url: &str,
        start_number: usize,
        end_number: usize,
        is_error_job: bool,
    ) -> bool {
        let job = ParserJob {
            uuid: uuid.to_string(),
            url: url.to_string(),
            last_url: last_url.to_string(),
            start_number: start_number.max(1),
            end_number,
            is_error_job,
        };

        let tracker = JobStatusTracker {
            uuid: job.uuid.clone(),
            status: JobStatus::ManagerQueued,
            is_error_job,
        };

        if !self.current_jobs.insert_if_absent(job.key(), tracker) {
            tracing::debug!(uuid = %uuid, is_error_job, "Already working on job, ignoring {}", url);
            return false;
        }

        tracing::info!(uuid = %uuid, is_error_job, "Queued job {}", url);
        self.jobs.push(job);
        true
    }

    /// One manager tick
    ///
    /// Routes queued jobs to their workers, ticks every worker, then drains
    /// finished results.
    pub fn run_once(&mut self) {
        while let Some(job) = self.jobs.try_pop() {
            self.route(job);
        }

        for worker in self.workers.values_mut() {
            worker.run_once();
        }

        self.drain_results();
    }

    /// Snapshot of every in-flight job
    pub fn get_current_job_list(&self) -> Vec<JobStatusTracker> {
        self.current_jobs.values()
    }

    /// Whether a job for `uuid` is in flight on either lane
    pub fn still_working_on(&self, uuid: &str) -> bool {
        self.current_jobs.contains(&(uuid.to_string(), false))
            || self.current_jobs.contains(&(uuid.to_string(), true))
    }

    /// Whether no job is queued or in flight
    pub fn is_idle(&self) -> bool {
        self.jobs.is_empty() && self.current_jobs.is_empty()
    }

    /// Stops every worker and waits until their running jobs resolve
    pub async fn stop(&mut self) {
        tracing::info!("Stopping parser manager");

        for worker in self.workers.values_mut() {
            worker.stop().await;
        }
        self.drain_results();

        self.jobs.clear();
        let abandoned = self.current_jobs.keys();
        if !abandoned.is_empty() {
            tracing::warn!("Abandoning {} jobs that never ran", abandoned.len());
            for key in abandoned {
                self.current_jobs.erase(&key);
            }
        }
    }

    fn route(&self, job: ParserJob) {
        let kind = ParserKind::from_url(&job.url);

        let worker = match self.workers.get(&kind) {
            Some(worker) => worker,
            None => {
                tracing::error!(
                    uuid = %job.uuid,
                    url = %job.url,
                    is_error_job = job.is_error_job,
                    "No worker for {}, dropping job",
                    kind.source_name()
                );
                self.current_jobs.erase(&job.key());
                return;
            }
        };

        let key = job.key();
        if let Err(e) = worker.add_job(job) {
            tracing::error!(uuid = %key.0, is_error_job = key.1, "Failed to queue job: {}", e);
            self.current_jobs.erase(&key);
        }
    }

    fn drain_results(&mut self) {
        while let Ok(result) = self.results_rx.try_recv() {
            self.handle_result(result);
        }
    }

    fn handle_result(&self, result: JobResult) {
        if result.metadata.uuid.is_empty() || result.metadata.url.is_empty() {
            tracing::warn!("Job result without identity: {}", result);
        }

        self.current_jobs.erase(&result.key());

        if result.has_error {
            tracing::error!(
                uuid = %result.metadata.uuid,
                url = %result.metadata.url,
                is_error_job = result.is_error_job,
                "Job finished with errors"
            );
            return;
        }

        tracing::info!(uuid = %result.metadata.uuid, "Job finished: {}", result);
        if let Some(callback) = &self.database_status_callback {
            callback(result);
        }
    }
}
