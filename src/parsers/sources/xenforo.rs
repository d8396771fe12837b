//! XenForo forums: SpaceBattles and Sufficient Velocity
//!
//! A work is a thread whose story posts carry threadmarks. Each threadmarked
//! post links to the next one; the section URL names the post in its
//! fragment, as in `.../threads/name.123/page-4#post-456`.

use crate::parsers::common::{ParserJob, ParserKind};
use crate::parsers::html::{
    child_element_count, element_text, resolve_link, select_first, select_within,
};
use crate::parsers::index_entry::{SectionContent, SourceMetadata};
use crate::parsers::linked_list::{LinkedListSource, LinkedSection};
use scraper::{ElementRef, Html};

#[derive(Debug, Clone, Copy)]
pub struct XenForoSource {
    kind: ParserKind,
}

impl XenForoSource {
    pub fn spacebattles() -> Self {
        Self {
            kind: ParserKind::Sbf,
        }
    }

    pub fn sufficient_velocity() -> Self {
        Self {
            kind: ParserKind::Svf,
        }
    }

    /// Work title from a thread URL: `/threads/some-name.123/` gives `some-name`
    fn title_from_url(url: &str) -> Option<String> {
        let (before_id, _) = url.rsplit_once('.')?;
        let title = before_id.rsplit('/').next()?;
        if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        }
    }

    /// Post id named by a section URL, the text after its last `-`
    fn post_id(url: &str) -> Option<&str> {
        let (_, id) = url.rsplit_once('-')?;
        if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
            Some(id)
        } else {
            None
        }
    }

    fn find_post<'a>(document: &'a Html, post_id: &str) -> Option<ElementRef<'a>> {
        select_first(document, &format!("[data-content=\"post-{}\"]", post_id))
            .or_else(|| select_first(document, &format!("#js-post-{}", post_id)))
            .or_else(|| select_first(document, &format!("#post-{}", post_id)))
    }

    /// Section name: the threadmark label, lowercased with spaces as dashes
    fn section_name(post: ElementRef<'_>, post_id: &str) -> String {
        select_within(post, ".message-cell--threadmark-header .threadmarkLabel")
            .or_else(|| select_within(post, ".message-cell--threadmark-header span"))
            .and_then(element_text)
            .map(|label| label.to_lowercase().replace(' ', "-"))
            .unwrap_or_else(|| format!("post-{}", post_id))
    }
}

impl LinkedListSource for XenForoSource {
    fn kind(&self) -> ParserKind {
        self.kind
    }

    fn preprocess_target_url(&self, job: &ParserJob) -> String {
        if job.url == job.last_url || job.last_url.is_empty() {
            job.url.clone()
        } else {
            job.last_url.clone()
        }
    }

    fn find_metadata(&self, document: &Html, target_url: &str) -> SourceMetadata {
        let author = select_first(document, ".hasThreadmark")
            .and_then(|post| select_within(post, ".message-userDetails h4"))
            .and_then(element_text);

        SourceMetadata {
            title: Self::title_from_url(target_url),
            author,
            nickname: None,
        }
    }

    fn first_url(&self, document: &Html, target_url: &str) -> Option<String> {
        let post = select_first(document, ".hasThreadmark")?;
        let post_id = post
            .value()
            .attr("data-content")
            .map(str::to_string)
            .or_else(|| {
                post.value()
                    .attr("id")
                    .map(|id| id.trim_start_matches("js-").to_string())
            })?;

        let thread_url = target_url.split('#').next().unwrap_or(target_url);
        Some(format!("{}#{}", thread_url, post_id))
    }

    fn section_page(&self, document: &Html, url: &str) -> Option<LinkedSection> {
        let post_id = Self::post_id(url)?;
        let post = Self::find_post(document, post_id)?;
        let body = select_within(post, ".message-body .bbWrapper")?;

        let next_url = select_within(post, ".threadmark-control--next[href]")
            .and_then(|next| next.value().attr("href"))
            .and_then(|href| resolve_link(href, url));

        let updated = select_within(post, ".message-attribution-main time[data-time]")
            .or_else(|| select_within(post, "time[data-time]"))
            .and_then(|time| time.value().attr("data-time"))
            .and_then(|time| time.trim().parse().ok());

        Some(LinkedSection {
            content: SectionContent {
                name: Self::section_name(post, post_id),
                html: body.html(),
                length: child_element_count(body),
            },
            next_url,
            updated,
        })
    }

    fn section_id(&self, url: &str) -> String {
        match Self::post_id(url) {
            Some(id) => format!("post-{}", id),
            None => url.to_string(),
        }
    }

    fn seq_num(&self, url: &str) -> Option<i64> {
        Self::post_id(url).and_then(|id| id.parse().ok())
    }
}
