//! WordPress serials
//!
//! Every chapter is a blog post with a "next post" link. A work is resumed
//! from the post it was last parsed at.

use crate::parsers::common::{ParserJob, ParserKind};
use crate::parsers::html::{
    child_element_count, resolve_link, select_attr, select_first, select_text,
};
use crate::parsers::index_entry::{SectionContent, SourceMetadata};
use crate::parsers::linked_list::{LinkedListSource, LinkedSection};
use crate::parsers::sources::parse_datetime;
use scraper::Html;

#[derive(Debug, Clone, Copy, Default)]
pub struct WordPressSource;

impl LinkedListSource for WordPressSource {
    fn kind(&self) -> ParserKind {
        ParserKind::Wp
    }

    fn preprocess_target_url(&self, job: &ParserJob) -> String {
        if job.last_url.is_empty() {
            job.url.clone()
        } else {
            job.last_url.clone()
        }
    }

    fn find_metadata(&self, document: &Html, _target_url: &str) -> SourceMetadata {
        SourceMetadata {
            title: select_attr(document, "meta[property=\"og:site_name\"]", "content"),
            author: select_text(document, "span.author.vcard a"),
            nickname: None,
        }
    }

    fn first_url(&self, _document: &Html, target_url: &str) -> Option<String> {
        Some(target_url.to_string())
    }

    fn section_page(&self, document: &Html, url: &str) -> Option<LinkedSection> {
        let content = select_first(document, "div.entry-content")?;
        let name = select_text(document, "h1.entry-title")?;

        let next_url = select_attr(document, "div.nav-next a", "href")
            .and_then(|href| resolve_link(&href, url));
        let updated = select_attr(document, "time.updated", "datetime")
            .and_then(|datetime| parse_datetime(&datetime, "%Y-%m-%dT%H:%M:%S"));

        Some(LinkedSection {
            content: SectionContent {
                name,
                html: content.html(),
                length: child_element_count(content),
            },
            next_url,
            updated,
        })
    }

    /// Any post is a valid resume point
    fn can_resume(&self, last_url: &str) -> bool {
        !last_url.is_empty()
    }
}
