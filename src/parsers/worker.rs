//! Per-source worker pool
//!
//! A worker owns the job queue and the in-flight tasks of one source. Its
//! `run_once` is driven by the manager tick: it collects finished tasks,
//! then dispatches at most one queued job if a pool slot is free.

use crate::parsers::collections::BlockingQueue;
use crate::parsers::common::{
    JobResult, JobStatus, JobStatusCallback, ManagerNotifyCallback, ParserJob, ParserKind,
    ProgressCallback, VersionReadCallback,
};
use crate::parsers::engine::parse;
use crate::parsers::factory::ParserFactory;
use crate::parsers::ParserError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Runs the jobs of one source on a bounded set of tasks
pub struct ParserWorker {
    kind: ParserKind,
    factory: Arc<ParserFactory>,
    storage_path: PathBuf,
    num_parsers: usize,
    jobs: BlockingQueue<ParserJob>,
    tasks: JoinSet<JobResult>,
    /// Job carried by each pooled task, by task id
    in_flight: HashMap<Id, ParserJob>,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
    job_status_callback: Option<JobStatusCallback>,
    notify_callback: Option<ManagerNotifyCallback>,
    version_read_callback: Option<VersionReadCallback>,
}

/// Everything a pooled task needs, detached from the worker
#[derive(Clone)]
struct JobContext {
    kind: ParserKind,
    factory: Arc<ParserFactory>,
    storage_path: PathBuf,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
    job_status_callback: Option<JobStatusCallback>,
    version_read_callback: Option<VersionReadCallback>,
}

impl JobContext {
    fn emit_status(&self, job: &ParserJob, status: JobStatus) {
        if let Some(callback) = &self.job_status_callback {
            callback(job, status);
        }
    }
}

impl ParserWorker {
    /// Creates a worker running at most `num_parsers` jobs at once
    pub fn new(
        kind: ParserKind,
        factory: Arc<ParserFactory>,
        storage_path: impl Into<PathBuf>,
        num_parsers: usize,
    ) -> Self {
        Self {
            kind,
            factory,
            storage_path: storage_path.into(),
            num_parsers: num_parsers.max(1),
            jobs: BlockingQueue::new(),
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            cancel: CancellationToken::new(),
            progress_callback: None,
            job_status_callback: None,
            notify_callback: None,
            version_read_callback: None,
        }
    }

    pub fn kind(&self) -> ParserKind {
        self.kind
    }

    pub fn register_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    pub fn register_job_status_callback(&mut self, callback: JobStatusCallback) {
        self.job_status_callback = Some(callback);
    }

    pub fn register_manager_notify_callback(&mut self, callback: ManagerNotifyCallback) {
        self.notify_callback = Some(callback);
    }

    pub fn register_version_read_callback(&mut self, callback: VersionReadCallback) {
        self.version_read_callback = Some(callback);
    }

    /// Queues a job after checking its identity fields
    pub fn add_job(&self, job: ParserJob) -> Result<(), ParserError> {
        if job.uuid.is_empty() {
            return Err(ParserError::EmptyJobField("uuid"));
        }
        if job.url.is_empty() {
            return Err(ParserError::EmptyJobField("url"));
        }

        tracing::debug!(uuid = %job.uuid, worker = %self.kind, "Worker queued job {}", job.url);
        if let Some(callback) = &self.job_status_callback {
            callback(&job, JobStatus::WorkerQueued);
        }
        self.jobs.push(job);

        Ok(())
    }

    /// One worker tick: collect finished tasks, then dispatch one job
    pub fn run_once(&mut self) {
        while let Some(joined) = self.tasks.try_join_next_with_id() {
            self.deliver(joined);
        }

        if self.cancel.is_cancelled() || self.tasks.len() >= self.num_parsers {
            return;
        }

        if let Some(job) = self.jobs.try_pop() {
            self.dispatch(job);
        }
    }

    /// Stops every running parser and waits for all tasks to resolve
    ///
    /// Jobs still queued are dropped. Results of drained tasks are delivered
    /// to the manager as usual.
    pub async fn stop(&mut self) {
        self.cancel.cancel();

        if !self.jobs.is_empty() {
            tracing::warn!(
                worker = %self.kind,
                "Dropping {} queued jobs on stop",
                self.jobs.len()
            );
            self.jobs.clear();
        }

        while let Some(joined) = self.tasks.join_next_with_id().await {
            self.deliver(joined);
        }

        tracing::info!(worker = %self.kind, "Worker stopped");
    }

    /// Number of dispatched jobs whose task has not been collected yet
    pub fn num_in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn num_queued(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.jobs.is_empty()
    }

    fn deliver(&mut self, joined: Result<(Id, JobResult), JoinError>) {
        let result = match joined {
            Ok((id, result)) => {
                self.in_flight.remove(&id);
                tracing::debug!(worker = %self.kind, "Job done: {}", result);
                result
            }
            Err(e) => {
                let job = match self.in_flight.remove(&e.id()) {
                    Some(job) => job,
                    None => {
                        tracing::error!(worker = %self.kind, "Pool task for an unknown job failed: {}", e);
                        return;
                    }
                };
                tracing::error!(
                    uuid = %job.uuid,
                    url = %job.url,
                    is_error_job = job.is_error_job,
                    worker = %self.kind,
                    "Pool task failed: {}",
                    e
                );
                if let Some(callback) = &self.job_status_callback {
                    callback(&job, JobStatus::Error);
                }
                JobResult::failed(&job)
            }
        };

        if let Some(callback) = &self.notify_callback {
            callback(result);
        }
    }

    fn dispatch(&mut self, job: ParserJob) {
        let context = JobContext {
            kind: self.kind,
            factory: self.factory.clone(),
            storage_path: self.storage_path.clone(),
            cancel: self.cancel.clone(),
            progress_callback: self.progress_callback.clone(),
            job_status_callback: self.job_status_callback.clone(),
            version_read_callback: self.version_read_callback.clone(),
        };

        tracing::info!(uuid = %job.uuid, worker = %self.kind, "Dispatching job {}", job.url);

        let tracked = job.clone();

        // a panicking job surfaces as an error result for that job
        let handle = self.tasks.spawn(async move {
            let status_context = context.clone();
            let identity = job.clone();

            match tokio::spawn(run_job(context, job)).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(
                        uuid = %identity.uuid,
                        url = %identity.url,
                        is_error_job = identity.is_error_job,
                        "Job task aborted: {}",
                        e
                    );
                    status_context.emit_status(&identity, JobStatus::Error);
                    JobResult::failed(&identity)
                }
            }
        });
        self.in_flight.insert(handle.id(), tracked);
    }
}

async fn run_job(context: JobContext, job: ParserJob) -> JobResult {
    let mut parser = match context.factory.parser_by_kind(context.kind) {
        Ok(parser) => parser,
        Err(e) => {
            tracing::error!(uuid = %job.uuid, url = %job.url, "Failed to build parser: {}", e);
            context.emit_status(&job, JobStatus::Error);
            return JobResult::failed(&job);
        }
    };

    let local_path = context.storage_path.join(&job.uuid);
    if let Err(e) = prepare_directory(&local_path).await {
        tracing::error!(uuid = %job.uuid, url = %job.url, "{}", e);
        context.emit_status(&job, JobStatus::Error);
        return JobResult::failed(&job);
    }

    let core = parser.core_mut();
    core.set_local_path(local_path);
    if let Some(callback) = &context.progress_callback {
        core.register_progress_callback(callback.clone());
    }
    if let Some(callback) = &context.version_read_callback {
        core.register_version_read_callback(callback.clone());
    }

    context.emit_status(&job, JobStatus::Working);

    let finished = CancellationToken::new();
    let watchdog = tokio::spawn(watchdog(
        context.cancel.clone(),
        finished.clone(),
        parser.core().cancel_token(),
    ));

    let result = parse(parser.as_mut(), &job).await;

    finished.cancel();
    if let Err(e) = watchdog.await {
        tracing::warn!(uuid = %job.uuid, "Watchdog task failed: {}", e);
    }

    let job_result = JobResult {
        metadata: result.metadata,
        start_number: job.start_number,
        end_number: job.end_number,
        is_error_job: job.is_error_job,
        has_error: result.has_error,
    };

    if job_result.has_error {
        tracing::error!(
            uuid = %job.uuid,
            url = %job.url,
            is_error_job = job.is_error_job,
            "Job failed"
        );
        context.emit_status(&job, JobStatus::Error);
    } else {
        context.emit_status(&job, JobStatus::Finished);
    }

    job_result
}

/// Stops the parser once the worker is stopped, unless the job ends first
async fn watchdog(
    worker_cancel: CancellationToken,
    finished: CancellationToken,
    parser_cancel: CancellationToken,
) {
    tokio::select! {
        _ = worker_cancel.cancelled() => parser_cancel.cancel(),
        _ = finished.cancelled() => {}
    }
}

/// Creates the work directory and checks that it can be written to
async fn prepare_directory(path: &Path) -> Result<(), ParserError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ParserError::StorageDirectory {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ParserError::StorageDirectory {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if metadata.permissions().readonly() {
        return Err(ParserError::StorageDirectory {
            path: path.to_path_buf(),
            reason: "directory is read-only".to_string(),
        });
    }

    Ok(())
}
