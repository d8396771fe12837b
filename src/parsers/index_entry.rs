//! Index-entry parsers
//!
//! For sources that publish a table of contents. Every entry is discovered
//! up front, entries already stored with the same publish time are dropped,
//! and the rest are visited in discovery order.

use crate::parsers::common::{IndexEntry, ParserBehaviorKind, ParserJob, ParserKind, ResultMetadata, SectionInfo};
use crate::parsers::engine::{Parser, ParserCore, ParserSettings, SectionSave, SectionTarget};
use crate::parsers::html::last_path_segment;
use crate::parsers::ParserError;
use crate::versioning::VersionEngine;
use scraper::Html;
use std::collections::VecDeque;
use std::sync::Arc;

/// Work metadata a source found on its target page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub nickname: Option<String>,
}

impl SourceMetadata {
    /// Copies every found field onto the parser state
    pub fn apply(self, core: &mut ParserCore) {
        if let Some(title) = self.title {
            core.title = title;
        }
        if let Some(author) = self.author {
            core.author = author;
        }
        if let Some(nickname) = self.nickname {
            core.nickname = nickname;
        }
    }
}

/// Extracted section markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionContent {
    /// Title used in the section file name
    pub name: String,
    /// Markup written to disk and hashed
    pub html: String,
    /// Number of top-level elements in the content
    pub length: usize,
}

/// Source-specific extraction for an index-entry parser
pub trait IndexEntrySource: Send {
    fn kind(&self) -> ParserKind;

    fn preprocess_target_url(&self, job: &ParserJob) -> String {
        job.url.clone()
    }

    fn find_metadata(&self, document: &Html, target_url: &str) -> SourceMetadata;

    /// Every table of contents entry, in order
    fn find_index_entries(&self, document: &Html, target_url: &str) -> Vec<IndexEntry>;

    /// The content of a fetched section page
    fn section_content(&self, document: &Html, entry: &IndexEntry) -> Option<SectionContent>;

    /// Stable identifier of a section, derived from its URL
    fn section_id(&self, data_url: &str) -> String {
        last_path_segment(data_url).unwrap_or_else(|| data_url.to_string())
    }

    fn seq_num(&self, _data_url: &str) -> Option<i64> {
        None
    }
}

/// Parser over a source with an enumerable table of contents
pub struct IndexEntryParser<S> {
    core: ParserCore,
    source: S,
    queue: VecDeque<IndexEntry>,
    last_url: String,
}

impl<S: IndexEntrySource> IndexEntryParser<S> {
    pub fn new(
        source: S,
        versioning: Option<Arc<VersionEngine>>,
        settings: ParserSettings,
    ) -> Result<Self, ParserError> {
        Ok(Self {
            core: ParserCore::new(source.kind(), versioning, settings)?,
            source,
            queue: VecDeque::new(),
            last_url: String::new(),
        })
    }

    /// Entries still waiting to be visited
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drops stored entries, assigns ordinals and queues what is left
    ///
    /// An entry is dropped when a stored checksum has the same section id and
    /// the same date. A surviving entry keeps the ordinal of a stored record
    /// with its section id; otherwise it is appended after the highest stored
    /// ordinal, in discovery order.
    ///
    /// A regular crawl queues every survivor up to the end bound, so a section
    /// republished before the stored length is fetched again. An error replay
    /// only queues survivors inside its start and end window.
    fn queue_entries(&mut self, entries: Vec<IndexEntry>, is_error_job: bool) -> Result<(), ParserError> {
        let records = match self.core.versioning() {
            Some(engine) => engine.read_md5s(&self.core.uuid)?,
            None => Vec::new(),
        };

        tracing::debug!(
            uuid = %self.core.uuid,
            "Found {} index entries and {} stored checksums",
            entries.len(),
            records.len()
        );

        if let Some(latest) = records.iter().max_by_key(|record| record.ordinal) {
            self.core.last_update_date = latest.date;
        }

        let mut next_ordinal = records
            .iter()
            .map(|record| record.ordinal + 1)
            .max()
            .unwrap_or(0);

        for mut entry in entries {
            let section_id = self.source.section_id(&entry.data_url);
            let stored = records.iter().find(|record| record.section_id == section_id);

            entry.ordinal = match stored {
                Some(record) if record.date == entry.time_published => continue,
                Some(record) => record.ordinal,
                None => {
                    let ordinal = next_ordinal;
                    next_ordinal += 1;
                    ordinal
                }
            };

            if is_error_job && entry.ordinal < self.core.target_start_index {
                continue;
            }
            if entry.ordinal > self.core.target_end_index {
                continue;
            }

            self.queue.push_back(entry);
        }

        tracing::debug!(uuid = %self.core.uuid, "Queued {} index entries", self.queue.len());
        Ok(())
    }
}

impl<S: IndexEntrySource> Parser for IndexEntryParser<S> {
    fn core(&self) -> &ParserCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }

    fn behavior(&self) -> ParserBehaviorKind {
        ParserBehaviorKind::IndexEntry
    }

    fn preprocess_target_url(&mut self, job: &ParserJob) -> String {
        self.source.preprocess_target_url(job)
    }

    fn calculate_index_bounds(&mut self, job: &ParserJob) {
        self.core.index = 0;
        self.core.target_start_index = job.start_number.saturating_sub(1);
        self.core.target_end_index = if job.end_number == 0 {
            usize::MAX
        } else {
            job.end_number - 1
        };
    }

    fn find_metadata(&mut self, document: &Html) {
        self.source
            .find_metadata(document, &self.core.target_url)
            .apply(&mut self.core);
    }

    fn pre_parse_loop(&mut self, document: &Html, job: &ParserJob) -> Result<(), ParserError> {
        let entries = self.source.find_index_entries(document, &self.core.target_url);
        if entries.is_empty() {
            return Err(ParserError::Discovery(format!(
                "no index entries found at {}",
                self.core.target_url
            )));
        }

        self.queue_entries(entries, job.is_error_job)
    }

    fn next_section(&mut self) -> SectionTarget {
        match self.queue.front() {
            Some(entry) => {
                self.core.index = entry.ordinal;
                SectionTarget::Fetch(entry.data_url.clone())
            }
            None => SectionTarget::Finished,
        }
    }

    fn parse_section(&mut self, url: &str, body: &str) -> SectionInfo {
        let entry = match self.queue.front() {
            Some(entry) => entry.clone(),
            None => {
                tracing::error!(uuid = %self.core.uuid, "No queued entry for {}", url);
                return SectionInfo::failed();
            }
        };

        let content = {
            let document = Html::parse_document(body);
            self.source.section_content(&document, &entry)
        };

        let content = match content {
            Some(content) => content,
            None => {
                tracing::error!(uuid = %self.core.uuid, index = entry.ordinal, "No section content found at {}", url);
                return SectionInfo::failed();
            }
        };

        let section_id = self.source.section_id(&entry.data_url);
        let save = SectionSave {
            ordinal: entry.ordinal,
            name: &content.name,
            section_id: &section_id,
            seq_num: self.source.seq_num(&entry.data_url),
            date: entry.time_published,
            content: &content.html,
        };

        match self.core.save_section(save) {
            Ok(()) => SectionInfo::parsed(content.length),
            Err(e) => {
                tracing::error!(uuid = %self.core.uuid, index = entry.ordinal, "Failed to save section: {}", e);
                SectionInfo::failed()
            }
        }
    }

    fn reached_end(&self) -> bool {
        self.queue.is_empty()
    }

    fn expended_attempts(&mut self) {
        tracing::warn!(
            uuid = %self.core.uuid,
            index = self.core.index,
            "Attempts expended, leaving {} sections for the next run",
            self.queue.len()
        );
        self.queue.clear();
    }

    fn indicate_next_section(&mut self) {
        let entry = match self.queue.pop_front() {
            Some(entry) => entry,
            None => {
                tracing::error!(uuid = %self.core.uuid, "Tried to advance past an empty queue");
                return;
            }
        };

        if entry.time_published >= self.core.last_update_date {
            self.core.last_update_date = entry.time_published;
        }
        self.last_url = entry.data_url;
    }

    fn save_last_url(&self, metadata: &mut ResultMetadata) {
        if !self.last_url.is_empty() {
            metadata.last_url = self.last_url.clone();
        }
    }

    fn save_update_date(&self, metadata: &mut ResultMetadata) {
        metadata.update_date = self.core.last_update_date;
        if metadata.update_date <= 0 {
            tracing::error!(
                uuid = %self.core.uuid,
                "Failed to get update date, last update date: {}",
                self.core.last_update_date
            );
        }
    }
}
