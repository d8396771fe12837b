//! The parse driver shared by every parser
//!
//! A parser is a set of synchronous hooks over a `ParserCore`. The async
//! `parse` driver owns every network fetch and every wait, and calls the
//! hooks in a fixed order:
//!
//! 1. `preprocess_target_url` and `calculate_index_bounds`
//! 2. fetch the target page, then `find_metadata` and `pre_parse_loop`
//! 3. politeness wait
//! 4. the section loop (`reached_end`, `next_section`, `parse_section`,
//!    `indicate_next_section`, `expended_attempts`)
//! 5. `post_parse_loop`, `save_last_url`, `save_update_date`
//!
//! Parsed documents never live across an await point, so hooks that take a
//! `&Html` stay synchronous.

use crate::parsers::common::{
    section_file_name, section_file_stem, ParserBehaviorKind, ParserJob, ParserKind,
    ParserResult, ProgressCallback, ResultMetadata, SectionInfo, VersionReadCallback,
};
use crate::parsers::fetcher::Fetcher;
use crate::parsers::pacing::PacingStrategy;
use crate::parsers::ParserError;
use crate::versioning::{SectionRef, VersionEngine};
use scraper::Html;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_AUTHOR: &str = "unknown-author";

/// Timing and retry settings of the section loop
#[derive(Debug, Clone, PartialEq)]
pub struct ParserSettings {
    /// Length of one loop tick
    pub tick: Duration,
    /// Wait between the target fetch and the first section fetch
    pub politeness_wait: Duration,
    /// Total timeout of one page fetch
    pub fetch_timeout: Duration,
    /// Attempts per section before `expended_attempts`
    pub max_attempts: u32,
    pub pacing: PacingStrategy,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            politeness_wait: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(15),
            max_attempts: 5,
            pacing: PacingStrategy::Short,
        }
    }
}

/// What the section loop should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionTarget {
    /// Fetch this URL and hand the body to `parse_section`
    Fetch(String),
    /// Nothing left inside the requested bounds
    Finished,
}

/// A section ready to be versioned and written
#[derive(Debug, Clone, Copy)]
pub struct SectionSave<'a> {
    /// 0-based position within the work
    pub ordinal: usize,
    /// Unsanitized section title
    pub name: &'a str,
    pub section_id: &'a str,
    pub seq_num: Option<i64>,
    pub date: i64,
    pub content: &'a str,
}

/// State every parser carries, whatever its source or variant
pub struct ParserCore {
    pub kind: ParserKind,
    pub uuid: String,
    pub title: String,
    pub author: String,
    pub nickname: String,
    pub target_url: String,
    pub local_path: PathBuf,
    /// 0-based cursor of the section being worked on
    pub index: usize,
    pub target_start_index: usize,
    pub target_end_index: usize,
    pub last_update_date: i64,
    fetcher: Fetcher,
    versioning: Option<Arc<VersionEngine>>,
    settings: ParserSettings,
    cancel: CancellationToken,
    progress_callback: Option<ProgressCallback>,
    version_read_callback: Option<VersionReadCallback>,
    storage_failed: bool,
}

impl ParserCore {
    pub fn new(
        kind: ParserKind,
        versioning: Option<Arc<VersionEngine>>,
        settings: ParserSettings,
    ) -> Result<Self, ParserError> {
        Ok(Self {
            kind,
            uuid: String::new(),
            title: format!("{}_title", kind.parser_name()),
            author: DEFAULT_AUTHOR.to_string(),
            nickname: String::new(),
            target_url: String::new(),
            local_path: PathBuf::new(),
            index: 0,
            target_start_index: 0,
            target_end_index: usize::MAX,
            last_update_date: 0,
            fetcher: Fetcher::new(settings.fetch_timeout)?,
            versioning,
            settings,
            cancel: CancellationToken::new(),
            progress_callback: None,
            version_read_callback: None,
            storage_failed: false,
        })
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn versioning(&self) -> Option<&Arc<VersionEngine>> {
        self.versioning.as_ref()
    }

    pub fn set_local_path(&mut self, path: impl Into<PathBuf>) {
        self.local_path = path.into();
    }

    pub fn register_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress_callback = Some(callback);
    }

    pub fn register_version_read_callback(&mut self, callback: VersionReadCallback) {
        self.version_read_callback = Some(callback);
    }

    /// Token that stops this parser when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn storage_failed(&self) -> bool {
        self.storage_failed
    }

    /// Reports a 1-based section number to the progress callback
    pub fn report_progress(&self, number: usize, error: bool) {
        if let Some(callback) = &self.progress_callback {
            callback(&self.uuid, number, error);
        }
    }

    /// Versions a section and writes it to the work's directory
    ///
    /// Unchanged content is not written again. When the write fails the
    /// checksum recorded for the section is restored and the parser is
    /// marked as having a storage failure.
    pub fn save_section(&mut self, save: SectionSave<'_>) -> Result<(), ParserError> {
        let name = section_file_stem(save.name);
        if save.content.is_empty() {
            return Err(ParserError::Section("section content is empty".to_string()));
        }

        let section = SectionRef {
            work_id: &self.uuid,
            ordinal: save.ordinal,
            section_id: save.section_id,
            seq_num: save.seq_num,
            date: save.date,
        };

        let check = match &self.versioning {
            Some(engine) => Some(engine.check_version(save.content, &section)?),
            None => None,
        };

        if let Some(check) = &check {
            if check.already_exists {
                tracing::debug!(
                    uuid = %self.uuid,
                    index = save.ordinal,
                    "Section unchanged, skipping write (md5: {})",
                    check.content_hash
                );
                return Ok(());
            }
        }

        let version_num = match &self.version_read_callback {
            Some(callback) => callback(&self.uuid, save.ordinal),
            None => check.as_ref().map(|c| c.version_num).unwrap_or(0),
        };

        let path = self
            .local_path
            .join(section_file_name(save.ordinal, &name, version_num));

        if let Err(e) = std::fs::write(&path, save.content) {
            tracing::error!(uuid = %self.uuid, index = save.ordinal, "Failed to write {}: {}", path.display(), e);
            if let (Some(engine), Some(check)) = (&self.versioning, &check) {
                if let Err(restore_err) = engine.restore(&section, check.previous.as_ref()) {
                    tracing::error!(uuid = %self.uuid, index = save.ordinal, "Failed to restore checksum: {}", restore_err);
                }
            }
            self.storage_failed = true;
            return Err(ParserError::SectionWrite { path, source: e });
        }

        tracing::info!(
            uuid = %self.uuid,
            index = save.ordinal,
            "Saved section {}",
            path.display()
        );
        Ok(())
    }
}

/// The hook set a parser implements
///
/// The two behavior variants implement this once each, and sources plug
/// into a variant through the variant's own source trait.
pub trait Parser: Send {
    fn core(&self) -> &ParserCore;

    fn core_mut(&mut self) -> &mut ParserCore;

    fn behavior(&self) -> ParserBehaviorKind;

    /// Chooses the first URL to fetch
    fn preprocess_target_url(&mut self, job: &ParserJob) -> String {
        job.url.clone()
    }

    /// Derives the index cursor and the section bounds from the job
    fn calculate_index_bounds(&mut self, job: &ParserJob);

    /// Extracts title, author and nickname from the target page
    fn find_metadata(&mut self, document: &Html);

    /// Discovers the sections to visit; an error aborts the job
    fn pre_parse_loop(&mut self, document: &Html, job: &ParserJob) -> Result<(), ParserError>;

    fn next_section(&mut self) -> SectionTarget;

    /// Extracts and saves the section fetched from `url`
    fn parse_section(&mut self, url: &str, body: &str) -> SectionInfo;

    fn reached_end(&self) -> bool;

    /// Called once the current section ran out of attempts
    fn expended_attempts(&mut self);

    fn indicate_next_section(&mut self);

    fn post_parse_loop(&mut self) {}

    fn save_last_url(&self, metadata: &mut ResultMetadata);

    fn save_update_date(&self, metadata: &mut ResultMetadata) {
        metadata.update_date = self.core().last_update_date;
    }
}

/// Runs a full parse of `job`
///
/// Never fails: every error is logged and folded into `has_error`.
/// `has_error` is false only when the section loop ended because the
/// parser reached the end of its content.
pub async fn parse(parser: &mut dyn Parser, job: &ParserJob) -> ParserResult {
    let mut result = ParserResult {
        metadata: ResultMetadata {
            uuid: job.uuid.clone(),
            url: job.url.clone(),
            last_url: job.last_url.clone(),
            ..Default::default()
        },
        is_error_job: job.is_error_job,
        has_error: true,
    };

    match run(parser, job, &mut result).await {
        Ok(()) => result.has_error = false,
        Err(ParserError::Cancelled) => {
            tracing::warn!(uuid = %job.uuid, url = %job.url, "Parse stopped before reaching the end");
        }
        Err(e) => {
            tracing::error!(uuid = %job.uuid, url = %job.url, "Parse failed: {}", e);
        }
    }

    result
}

async fn run(
    parser: &mut dyn Parser,
    job: &ParserJob,
    result: &mut ParserResult,
) -> Result<(), ParserError> {
    parser.core_mut().uuid = job.uuid.clone();

    let target_url = parser.preprocess_target_url(job);
    parser.core_mut().target_url = target_url.clone();
    parser.calculate_index_bounds(job);

    let fetcher = parser.core().fetcher.clone();
    let cancel = parser.core().cancel_token();
    let settings = parser.core().settings().clone();

    tracing::info!(
        uuid = %job.uuid,
        parser = %parser.core().kind,
        "Start parse of {} ({})",
        target_url,
        parser.behavior().name()
    );

    let body = fetch_cancellable(&fetcher, &cancel, &target_url).await?;
    {
        let document = Html::parse_document(&body);
        parser.find_metadata(&document);
        parser.pre_parse_loop(&document, job)?;
    }

    save_metadata(parser.core(), &mut result.metadata);

    wait_or_cancel(&cancel, settings.politeness_wait).await?;

    let outcome = parse_loop(parser, &fetcher, &cancel, &settings, &mut result.metadata).await;

    parser.post_parse_loop();
    parser.save_last_url(&mut result.metadata);
    parser.save_update_date(&mut result.metadata);

    outcome?;

    if parser.core().storage_failed() {
        return Err(ParserError::StorageFailed(job.uuid.clone()));
    }

    tracing::info!(uuid = %job.uuid, "Finished parse of {}", target_url);
    Ok(())
}

fn save_metadata(core: &ParserCore, metadata: &mut ResultMetadata) {
    metadata.title = core.title.clone();
    metadata.author = core.author.clone();
    metadata.nickname = core.nickname.clone();
    metadata.source = core.kind.source_name().to_string();
    metadata.media_path = core.local_path.display().to_string();
}

async fn parse_loop(
    parser: &mut dyn Parser,
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    settings: &ParserSettings,
    metadata: &mut ResultMetadata,
) -> Result<(), ParserError> {
    let mut remaining_attempts = settings.max_attempts;
    let mut wait_ticks = 0usize;
    let mut tick_counter = 0usize;

    loop {
        if cancel.is_cancelled() {
            return Err(ParserError::Cancelled);
        }
        if parser.core().storage_failed() {
            return Ok(());
        }

        if tick_counter >= wait_ticks {
            tick_counter = 0;
        }

        if tick_counter == 0 {
            if parser.reached_end() {
                return Ok(());
            }

            if remaining_attempts == 0 {
                remaining_attempts = settings.max_attempts;
                parser.expended_attempts();
                continue;
            }

            remaining_attempts -= 1;

            let section_info = match parser.next_section() {
                SectionTarget::Finished => return Ok(()),
                SectionTarget::Fetch(url) => match fetch_cancellable(fetcher, cancel, &url).await {
                    Ok(body) => parser.parse_section(&url, &body),
                    Err(ParserError::Cancelled) => return Err(ParserError::Cancelled),
                    Err(e) => {
                        tracing::warn!(uuid = %parser.core().uuid, "{}", e);
                        SectionInfo::failed()
                    }
                },
            };

            let index = parser.core().index;
            if section_info.has_error {
                tracing::warn!(
                    uuid = %parser.core().uuid,
                    index = index,
                    "Section parse failed, {} attempts remaining",
                    remaining_attempts
                );
                if remaining_attempts == 0 {
                    parser.core().report_progress(index + 1, true);
                }
            } else {
                parser.core().report_progress(index + 1, false);
                let number = u32::try_from(index + 1).unwrap_or(u32::MAX);
                metadata.series_length = metadata.series_length.max(number);
                remaining_attempts = settings.max_attempts;
                parser.indicate_next_section();
            }

            // failed attempts wait too, so retries are paced like sections
            wait_ticks = settings.pacing.wait_ticks(section_info.length);
        }

        tick_counter += 1;
        wait_or_cancel(cancel, settings.tick).await?;
    }
}

async fn fetch_cancellable(
    fetcher: &Fetcher,
    cancel: &CancellationToken,
    url: &str,
) -> Result<String, ParserError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ParserError::Cancelled),
        body = fetcher.fetch(url) => body,
    }
}

async fn wait_or_cancel(cancel: &CancellationToken, duration: Duration) -> Result<(), ParserError> {
    if duration.is_zero() {
        return if cancel.is_cancelled() {
            Err(ParserError::Cancelled)
        } else {
            Ok(())
        };
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(ParserError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
