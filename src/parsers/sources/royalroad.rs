//! Royal Road

use crate::parsers::common::{IndexEntry, ParserKind};
use crate::parsers::html::{
    child_element_count, element_text, last_path_segment, leading_number, resolve_link,
    select_all, select_attr, select_first, select_text, select_within,
};
use crate::parsers::index_entry::{IndexEntrySource, SectionContent, SourceMetadata};
use scraper::Html;

#[derive(Debug, Clone, Copy, Default)]
pub struct RoyalRoadSource;

impl IndexEntrySource for RoyalRoadSource {
    fn kind(&self) -> ParserKind {
        ParserKind::Rr
    }

    fn find_metadata(&self, document: &Html, _target_url: &str) -> SourceMetadata {
        let title = select_attr(document, "meta[property=\"og:url\"]", "content")
            .and_then(|url| last_path_segment(&url))
            .or_else(|| select_text(document, "h1"));

        SourceMetadata {
            title,
            author: select_attr(document, "meta[property=\"books:author\"]", "content"),
            nickname: None,
        }
    }

    fn find_index_entries(&self, document: &Html, target_url: &str) -> Vec<IndexEntry> {
        let mut entries = Vec::new();

        for row in select_all(document, "tbody tr") {
            let link = match select_within(row, "td a[href]") {
                Some(link) => link,
                None => continue,
            };
            let data_url = match link
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, target_url))
            {
                Some(url) => url,
                None => continue,
            };
            let time_published = select_within(row, "time[unixtime]")
                .and_then(|time| time.value().attr("unixtime"))
                .and_then(|unixtime| unixtime.trim().parse().ok())
                .unwrap_or(0);

            entries.push(IndexEntry {
                name: element_text(link).unwrap_or_default(),
                data_url,
                time_published,
                ordinal: entries.len(),
            });
        }

        entries
    }

    fn section_content(&self, document: &Html, entry: &IndexEntry) -> Option<SectionContent> {
        let content = select_first(document, "div.chapter-inner.chapter-content")?;

        Some(SectionContent {
            name: self.section_id(&entry.data_url),
            html: content.html(),
            length: child_element_count(content),
        })
    }

    /// Chapter number, the path segment after `/chapter/`
    fn seq_num(&self, data_url: &str) -> Option<i64> {
        let (_, rest) = data_url.split_once("/chapter/")?;
        leading_number(rest)
    }
}
