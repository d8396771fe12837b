//! Archive of Our Own
//!
//! A work is fetched as one full-work page, so it has a single index entry.

use crate::parsers::common::{IndexEntry, ParserJob, ParserKind};
use crate::parsers::html::{child_element_count, select_first, select_text};
use crate::parsers::index_entry::{IndexEntrySource, SectionContent, SourceMetadata};
use crate::parsers::sources::parse_date;
use scraper::Html;

const FULL_WORK_QUERY: &str = "?view_full_work=true&view_adult=true";

#[derive(Debug, Clone, Copy, Default)]
pub struct Ao3Source;

impl IndexEntrySource for Ao3Source {
    fn kind(&self) -> ParserKind {
        ParserKind::Ao3
    }

    fn preprocess_target_url(&self, job: &ParserJob) -> String {
        format!("{}{}", job.url, FULL_WORK_QUERY)
    }

    fn find_metadata(&self, document: &Html, _target_url: &str) -> SourceMetadata {
        SourceMetadata {
            title: select_text(document, "h2.title.heading"),
            author: select_text(document, "a[rel=author]"),
            nickname: None,
        }
    }

    fn find_index_entries(&self, document: &Html, target_url: &str) -> Vec<IndexEntry> {
        let name = select_text(document, "h2.title.heading")
            .unwrap_or_else(|| self.section_id(target_url));
        let time_published = select_text(document, "dd.published")
            .and_then(|text| parse_date(&text, "%Y-%m-%d"))
            .unwrap_or(0);

        vec![IndexEntry {
            data_url: target_url.to_string(),
            name,
            time_published,
            ordinal: 0,
        }]
    }

    fn section_content(&self, document: &Html, entry: &IndexEntry) -> Option<SectionContent> {
        let workskin = select_first(document, "#workskin")?;

        // word count in thousands, the closest thing to a length the page offers
        let length = select_text(document, "dd.words")
            .and_then(|words| words.replace(',', "").parse::<usize>().ok())
            .map(|words| words / 1000)
            .unwrap_or_else(|| child_element_count(workskin));

        Some(SectionContent {
            name: entry.name.clone(),
            html: workskin.html(),
            length,
        })
    }
}
