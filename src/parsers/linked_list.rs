//! Linked-list parsers
//!
//! For sources without a table of contents: every page links to the next
//! one, and the walk ends at the first page without a next link.

use crate::parsers::common::{ParserBehaviorKind, ParserJob, ParserKind, ResultMetadata, SectionInfo};
use crate::parsers::engine::{Parser, ParserCore, ParserSettings, SectionSave, SectionTarget};
use crate::parsers::html::last_path_segment;
use crate::parsers::index_entry::{SectionContent, SourceMetadata};
use crate::parsers::ParserError;
use crate::versioning::VersionEngine;
use scraper::Html;
use std::sync::Arc;

/// One page of a linked-list work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSection {
    pub content: SectionContent,
    /// Absolute URL of the following page, `None` on the last page
    pub next_url: Option<String>,
    /// Last modification time of the page (unix seconds)
    pub updated: Option<i64>,
}

/// Source-specific extraction for a linked-list parser
pub trait LinkedListSource: Send {
    fn kind(&self) -> ParserKind;

    fn preprocess_target_url(&self, job: &ParserJob) -> String {
        job.url.clone()
    }

    fn find_metadata(&self, document: &Html, target_url: &str) -> SourceMetadata;

    /// URL of the first section, found on the target page
    fn first_url(&self, document: &Html, target_url: &str) -> Option<String>;

    /// Content and links of the section at `url`
    fn section_page(&self, document: &Html, url: &str) -> Option<LinkedSection>;

    fn section_id(&self, url: &str) -> String {
        last_path_segment(url).unwrap_or_else(|| url.to_string())
    }

    fn seq_num(&self, _url: &str) -> Option<i64> {
        None
    }

    /// Whether a stored last URL is a section a parse can resume from
    fn can_resume(&self, last_url: &str) -> bool {
        self.seq_num(last_url).is_some()
    }
}

/// Parser that follows next links from page to page
pub struct LinkedListParser<S> {
    core: ParserCore,
    source: S,
    next_url: String,
    last_parsed_url: String,
    reached_end: bool,
}

impl<S: LinkedListSource> LinkedListParser<S> {
    pub fn new(
        source: S,
        versioning: Option<Arc<VersionEngine>>,
        settings: ParserSettings,
    ) -> Result<Self, ParserError> {
        Ok(Self {
            core: ParserCore::new(source.kind(), versioning, settings)?,
            source,
            next_url: String::new(),
            last_parsed_url: String::new(),
            reached_end: false,
        })
    }

    pub fn next_url(&self) -> &str {
        &self.next_url
    }

    fn resumes(&self, job: &ParserJob) -> bool {
        !(job.url == job.last_url || job.last_url.is_empty() || !self.source.can_resume(&job.last_url))
    }
}

impl<S: LinkedListSource> Parser for LinkedListParser<S> {
    fn core(&self) -> &ParserCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ParserCore {
        &mut self.core
    }

    fn behavior(&self) -> ParserBehaviorKind {
        ParserBehaviorKind::LinkedList
    }

    fn preprocess_target_url(&mut self, job: &ParserJob) -> String {
        self.source.preprocess_target_url(job)
    }

    fn calculate_index_bounds(&mut self, job: &ParserJob) {
        self.core.index = 0;

        let stale_last_url = !job.last_url.is_empty() && !self.source.can_resume(&job.last_url);
        if stale_last_url {
            self.core.target_start_index = 0;
            self.core.target_end_index = usize::MAX;
            return;
        }

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
        if self.resumes(job) {
            self.next_url = job.last_url.clone();
            self.core.index = job.start_number.saturating_sub(1);
        } else {
            self.next_url = self
                .source
                .first_url(document, &job.url)
                .unwrap_or_default();
        }

        if self.next_url.is_empty() {
            return Err(ParserError::Discovery(format!(
                "no first section found at {}",
                self.core.target_url
            )));
        }

        tracing::debug!(uuid = %self.core.uuid, index = self.core.index, "First section url: {}", self.next_url);
        Ok(())
    }

    fn next_section(&mut self) -> SectionTarget {
        if self.core.index > self.core.target_end_index {
            self.reached_end = true;
            return SectionTarget::Finished;
        }
        SectionTarget::Fetch(self.next_url.clone())
    }

    fn parse_section(&mut self, url: &str, body: &str) -> SectionInfo {
        let working_index = self.core.index;

        let page = {
            let document = Html::parse_document(body);
            self.source.section_page(&document, url)
        };

        let page = match page {
            Some(page) => page,
            None => {
                tracing::error!(uuid = %self.core.uuid, index = working_index, "No section found at {}", url);
                return SectionInfo::failed();
            }
        };

        if working_index >= self.core.target_start_index {
            let section_id = self.source.section_id(url);
            let save = SectionSave {
                ordinal: working_index,
                name: &page.content.name,
                section_id: &section_id,
                seq_num: self.source.seq_num(url),
                date: page.updated.unwrap_or(0),
                content: &page.content.html,
            };
            if let Err(e) = self.core.save_section(save) {
                tracing::error!(uuid = %self.core.uuid, index = working_index, "Failed to save section: {}", e);
                return SectionInfo::failed();
            }
        } else {
            tracing::debug!(
                uuid = %self.core.uuid,
                index = working_index,
                "Before start index {}, skipping save",
                self.core.target_start_index
            );
        }

        match page.next_url {
            Some(next_url) => self.next_url = next_url,
            None => {
                tracing::debug!(uuid = %self.core.uuid, "Reached end of linked list at {}", url);
                self.reached_end = true;
            }
        }

        if let Some(updated) = page.updated {
            self.core.last_update_date = self.core.last_update_date.max(updated);
        }
        self.last_parsed_url = url.to_string();

        SectionInfo::parsed(page.content.length)
    }

    fn reached_end(&self) -> bool {
        self.reached_end
    }

    fn expended_attempts(&mut self) {
        tracing::warn!(uuid = %self.core.uuid, index = self.core.index, "Attempts expended at {}", self.next_url);
        self.reached_end = true;
    }

    fn indicate_next_section(&mut self) {
        self.core.index += 1;
    }

    /// Stores the last parsed section so the next run resumes on it
    fn save_last_url(&self, metadata: &mut ResultMetadata) {
        if self.last_parsed_url.is_empty() {
            tracing::debug!(uuid = %self.core.uuid, "No section parsed, keeping last url {}", metadata.last_url);
            return;
        }
        metadata.last_url = self.last_parsed_url.clone();
    }
}
