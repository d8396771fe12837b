//! Types shared by parsers, workers and the manager

use std::fmt;
use std::sync::Arc;

/// Every source a URL can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParserKind {
    Error,
    Ao3,
    Ffn,
    Rr,
    Sbf,
    Svf,
    Wp,
    Yt,
}

impl ParserKind {
    /// URL matching order; the first canonical domain found in a URL wins
    pub const ROUTING_ORDER: [ParserKind; 7] = [
        ParserKind::Ao3,
        ParserKind::Ffn,
        ParserKind::Sbf,
        ParserKind::Svf,
        ParserKind::Wp,
        ParserKind::Rr,
        ParserKind::Yt,
    ];

    /// Sources that have a parser implementation
    pub const SUPPORTED: [ParserKind; 5] = [
        ParserKind::Ao3,
        ParserKind::Rr,
        ParserKind::Sbf,
        ParserKind::Svf,
        ParserKind::Wp,
    ];

    /// Resolves a URL to its source by substring match on canonical domains
    pub fn from_url(url: &str) -> Self {
        Self::ROUTING_ORDER
            .into_iter()
            .find(|kind| {
                kind.canonical_domain()
                    .map(|domain| url.contains(domain))
                    .unwrap_or(false)
            })
            .unwrap_or(ParserKind::Error)
    }

    /// Parses a config short name such as `rr` or `sbf`
    pub fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "ao3" => Some(Self::Ao3),
            "ffn" => Some(Self::Ffn),
            "rr" => Some(Self::Rr),
            "sbf" => Some(Self::Sbf),
            "svf" => Some(Self::Svf),
            "wp" => Some(Self::Wp),
            "yt" => Some(Self::Yt),
            _ => None,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Ao3 => "ao3",
            Self::Ffn => "ffn",
            Self::Rr => "rr",
            Self::Sbf => "sbf",
            Self::Svf => "svf",
            Self::Wp => "wp",
            Self::Yt => "yt",
        }
    }

    pub fn parser_name(&self) -> &'static str {
        match self {
            Self::Error => "error_parser",
            Self::Ao3 => "ao3_parser",
            Self::Ffn => "ffn_parser",
            Self::Rr => "rr_parser",
            Self::Sbf => "sbf_parser",
            Self::Svf => "svf_parser",
            Self::Wp => "wp_parser",
            Self::Yt => "yt_parser",
        }
    }

    /// Source name stored on work entries
    pub fn source_name(&self) -> &'static str {
        match self {
            Self::Error => "source-name-error",
            Self::Ao3 => "archive-of-our-own",
            Self::Ffn => "fanfiction",
            Self::Rr => "royal-road",
            Self::Sbf => "spacebattles-forums",
            Self::Svf => "sufficient-velocity-forums",
            Self::Wp => "wordpress",
            Self::Yt => "youtube",
        }
    }

    pub fn source_url(&self) -> &'static str {
        match self {
            Self::Error => "error-source-url",
            Self::Ao3 => "https://archiveofourown.org",
            Self::Ffn => "https://www.fanfiction.net",
            Self::Rr => "https://www.royalroad.com",
            Self::Sbf => "https://forums.spacebattles.com",
            Self::Svf => "https://forums.sufficientvelocity.com",
            Self::Wp => "https://wordpress.com",
            Self::Yt => "https://www.youtube.com",
        }
    }

    /// Substring that identifies the source inside a URL
    pub fn canonical_domain(&self) -> Option<&'static str> {
        match self {
            Self::Error => None,
            Self::Ao3 => Some("archiveofourown.org"),
            Self::Ffn => Some("www.fanfiction.net"),
            Self::Rr => Some("www.royalroad.com"),
            Self::Sbf => Some("forums.spacebattles.com"),
            Self::Svf => Some("forums.sufficientvelocity.com"),
            Self::Wp => Some("wordpress.com"),
            Self::Yt => Some("youtube.com"),
        }
    }

    pub fn is_supported(&self) -> bool {
        Self::SUPPORTED.contains(self)
    }

    /// Pagination strategy the source's parser uses
    pub fn behavior(&self) -> ParserBehaviorKind {
        match self {
            Self::Ao3 | Self::Ffn | Self::Rr | Self::Yt => ParserBehaviorKind::IndexEntry,
            Self::Sbf | Self::Svf | Self::Wp => ParserBehaviorKind::LinkedList,
            Self::Error => ParserBehaviorKind::Error,
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.parser_name())
    }
}

/// Pagination strategy of a parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserBehaviorKind {
    Error,
    IndexEntry,
    LinkedList,
}

impl ParserBehaviorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "error_behavior",
            Self::IndexEntry => "index_entry",
            Self::LinkedList => "linked_list",
        }
    }
}

/// Where a job currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Error,
    ManagerQueued,
    WorkerQueued,
    Working,
    Finished,
}

impl JobStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Error => "job_error",
            Self::ManagerQueued => "job_manager_queued",
            Self::WorkerQueued => "job_worker_queued",
            Self::Working => "job_working",
            Self::Finished => "job_finished",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dedup key of a job: work identity plus the error-replay lane flag
pub type JobKey = (String, bool);

/// One crawl request for one work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserJob {
    pub uuid: String,
    pub url: String,
    /// Resume point from the previous run, empty when unknown
    pub last_url: String,
    /// 1-based first section to save
    pub start_number: usize,
    /// 1-based last section to save, 0 means no bound
    pub end_number: usize,
    pub is_error_job: bool,
}

impl ParserJob {
    pub fn new(uuid: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            uuid: uuid.into(),
            last_url: url.clone(),
            url,
            start_number: 1,
            end_number: 0,
            is_error_job: false,
        }
    }

    pub fn key(&self) -> JobKey {
        (self.uuid.clone(), self.is_error_job)
    }
}

impl fmt::Display for ParserJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uuid: {} url: {} last_url: {} start_number: {} end_number: {} is_error_job: {}",
            self.uuid, self.url, self.last_url, self.start_number, self.end_number, self.is_error_job
        )
    }
}

/// Work metadata collected during a parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultMetadata {
    pub uuid: String,
    pub title: String,
    pub author: String,
    pub nickname: String,
    pub source: String,
    pub url: String,
    pub last_url: String,
    pub series: String,
    pub series_length: u32,
    pub media_path: String,
    pub update_date: i64,
}

impl Default for ResultMetadata {
    fn default() -> Self {
        Self {
            uuid: String::new(),
            title: String::new(),
            author: String::new(),
            nickname: String::new(),
            source: String::new(),
            url: String::new(),
            last_url: String::new(),
            series: String::new(),
            series_length: 1,
            media_path: String::new(),
            update_date: 0,
        }
    }
}

/// What `Parser::parse` hands back to the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserResult {
    pub metadata: ResultMetadata,
    pub is_error_job: bool,
    pub has_error: bool,
}

impl Default for ParserResult {
    fn default() -> Self {
        Self {
            metadata: ResultMetadata::default(),
            is_error_job: false,
            has_error: true,
        }
    }
}

/// Final, once-per-job outcome surfaced by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub metadata: ResultMetadata,
    pub start_number: usize,
    pub end_number: usize,
    pub is_error_job: bool,
    pub has_error: bool,
}

impl JobResult {
    /// An error result carrying the identity of `job`
    pub fn failed(job: &ParserJob) -> Self {
        Self {
            metadata: ResultMetadata {
                uuid: job.uuid.clone(),
                url: job.url.clone(),
                last_url: job.last_url.clone(),
                ..Default::default()
            },
            start_number: job.start_number,
            end_number: job.end_number,
            is_error_job: job.is_error_job,
            has_error: true,
        }
    }

    pub fn key(&self) -> JobKey {
        (self.metadata.uuid.clone(), self.is_error_job)
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uuid: {} url: {} last_url: {} series_length: {} start_number: {} end_number: {} is_error_job: {} has_error: {}",
            self.metadata.uuid,
            self.metadata.url,
            self.metadata.last_url,
            self.metadata.series_length,
            self.start_number,
            self.end_number,
            self.is_error_job,
            self.has_error
        )
    }
}

/// One row of an enumerated table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub data_url: String,
    pub name: String,
    /// Unix seconds, 0 when the source shows no date
    pub time_published: i64,
    /// 0-based position of the section within the work
    pub ordinal: usize,
}

/// Result of one `parse_section` attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionInfo {
    /// Content size proxy, the number of top-level elements
    pub length: usize,
    pub has_error: bool,
}

impl SectionInfo {
    pub fn failed() -> Self {
        Self {
            length: 0,
            has_error: true,
        }
    }

    pub fn parsed(length: usize) -> Self {
        Self {
            length,
            has_error: false,
        }
    }
}

/// Live status of an in-flight job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusTracker {
    pub uuid: String,
    pub status: JobStatus,
    pub is_error_job: bool,
}

impl fmt::Display for JobStatusTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uuid: {} job_status: {} is_error_job: {}",
            self.uuid, self.status, self.is_error_job
        )
    }
}

/// Progress notification: work id, 1-based section number, error flag
pub type ProgressCallback = Arc<dyn Fn(&str, usize, bool) + Send + Sync>;

/// Status transition of a job
pub type JobStatusCallback = Arc<dyn Fn(&ParserJob, JobStatus) + Send + Sync>;

/// Final result of a job, delivered by a worker to its manager
pub type ManagerNotifyCallback = Arc<dyn Fn(JobResult) + Send + Sync>;

/// Successful job result, delivered by the manager to the embedder
pub type DatabaseStatusCallback = Arc<dyn Fn(JobResult) + Send + Sync>;

/// Stored version number of a section: work id, 0-based ordinal
pub type VersionReadCallback = Arc<dyn Fn(&str, usize) -> u16 + Send + Sync>;

/// File name of a saved section
///
/// The ordinal is 0-based and written 1-based, zero-padded to 4 digits;
/// the version is zero-padded to 3 digits.
pub fn section_file_name(ordinal: usize, section_name: &str, version_num: u16) -> String {
    format!(
        "SEC{:04}_{}_VER{:03}.html",
        ordinal + 1,
        section_name,
        version_num
    )
}

const UNALLOWED_FILE_CHARS: &str = " /\\*?<>:;=[]!@|.,%#'\"";

/// Makes a section title safe to embed in a file name
///
/// Unallowed characters become `-`, runs of `-` collapse to one, and
/// leading or trailing `-` are removed.
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len());
    for ch in name.chars() {
        let ch = if UNALLOWED_FILE_CHARS.contains(ch) || ch.is_control() {
            '-'
        } else {
            ch
        };
        if ch == '-' && sanitized.ends_with('-') {
            continue;
        }
        sanitized.push(ch);
    }
    sanitized.trim_matches('-').to_string()
}

/// Stem used when a section title has no usable characters
pub const FALLBACK_SECTION_STEM: &str = "section";

/// Longest section stem in bytes, leaving room for the prefix and suffix
pub const MAX_SECTION_STEM_BYTES: usize = 200;

/// The title part of a section file name
///
/// The sanitized title is cut to `MAX_SECTION_STEM_BYTES` on a character
/// boundary. A title with nothing left after sanitizing becomes `section`.
pub fn section_file_stem(name: &str) -> String {
    let mut stem = sanitize_file_name(name);

    if stem.len() > MAX_SECTION_STEM_BYTES {
        let mut end = MAX_SECTION_STEM_BYTES;
        while !stem.is_char_boundary(end) {
            end -= 1;
        }
        stem.truncate(end);
        let trimmed = stem.trim_end_matches('-').len();
        stem.truncate(trimmed);
    }

    if stem.is_empty() {
        FALLBACK_SECTION_STEM.to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_kind_from_url() {
        assert_eq!(
            ParserKind::from_url("https://archiveofourown.org/works/0000000"),
            ParserKind::Ao3
        );
        assert_eq!(
            ParserKind::from_url("https://www.royalroad.com/fiction/1/some-fiction"),
            ParserKind::Rr
        );
        assert_eq!(
            ParserKind::from_url(
                "https://forums.spacebattles.com/threads/some-fiction-name.1234567/"
            ),
            ParserKind::Sbf
        );
        assert_eq!(
            ParserKind::from_url(
                "https://forums.sufficientvelocity.com/threads/some-fiction-name.123456/"
            ),
            ParserKind::Svf
        );
        assert_eq!(
            ParserKind::from_url("https://some-name.wordpress.com/"),
            ParserKind::Wp
        );
        assert_eq!(
            ParserKind::from_url("https://www.fanfiction.net/s/1/1/"),
            ParserKind::Ffn
        );
        assert_eq!(
            ParserKind::from_url("https://www.youtube.com/playlist?list=x"),
            ParserKind::Yt
        );
        assert_eq!(
            ParserKind::from_url("https://example.com/story"),
            ParserKind::Error
        );
    }

    #[test]
    fn test_routing_first_match_wins() {
        // a wordpress blog that links an ao3 work in its path resolves to ao3
        assert_eq!(
            ParserKind::from_url("https://blog.wordpress.com/archiveofourown.org/works/1"),
            ParserKind::Ao3
        );
    }

    #[test]
    fn test_parser_kind_names() {
        assert_eq!(ParserKind::Ao3.parser_name(), "ao3_parser");
        assert_eq!(ParserKind::Error.parser_name(), "error_parser");
        assert_eq!(ParserKind::Rr.source_name(), "royal-road");
        assert_eq!(ParserKind::Error.source_url(), "error-source-url");
        assert_eq!(ParserKind::Sbf.to_string(), "sbf_parser");
    }

    #[test]
    fn test_short_name_roundtrip() {
        for kind in ParserKind::ROUTING_ORDER {
            assert_eq!(ParserKind::from_short_name(kind.short_name()), Some(kind));
        }
        assert_eq!(ParserKind::from_short_name("nope"), None);
    }

    #[test]
    fn test_behaviors() {
        assert_eq!(ParserKind::Rr.behavior(), ParserBehaviorKind::IndexEntry);
        assert_eq!(ParserKind::Ao3.behavior(), ParserBehaviorKind::IndexEntry);
        assert_eq!(ParserKind::Svf.behavior(), ParserBehaviorKind::LinkedList);
        assert_eq!(ParserKind::Wp.behavior(), ParserBehaviorKind::LinkedList);
        assert!(!ParserKind::Ffn.is_supported());
        assert!(ParserKind::Sbf.is_supported());
    }

    #[test]
    fn test_job_status_names() {
        assert_eq!(JobStatus::Error.name(), "job_error");
        assert_eq!(JobStatus::ManagerQueued.name(), "job_manager_queued");
        assert_eq!(JobStatus::WorkerQueued.name(), "job_worker_queued");
        assert_eq!(JobStatus::Working.name(), "job_working");
        assert_eq!(JobStatus::Finished.name(), "job_finished");
    }

    #[test]
    fn test_section_file_name() {
        assert_eq!(section_file_name(0, "foo", 0), "SEC0001_foo_VER000.html");
        assert_eq!(
            section_file_name(41, "The-Return", 12),
            "SEC0042_The-Return_VER012.html"
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Chapter 1: The Start!"), "Chapter-1-The-Start");
        assert_eq!(sanitize_file_name("--a//b--"), "a-b");
        assert_eq!(sanitize_file_name("plain"), "plain");
        assert_eq!(sanitize_file_name("?!."), "");
        assert_eq!(sanitize_file_name("Ünïcode café"), "Ünïcode-café");
    }

    #[test]
    fn test_section_file_stem_falls_back_when_empty() {
        assert_eq!(section_file_stem("..."), "section");
        assert_eq!(section_file_stem(""), "section");
        assert_eq!(section_file_stem("Part 2"), "Part-2");
    }

    #[test]
    fn test_section_file_stem_truncates_long_titles() {
        let stem = section_file_stem(&"word ".repeat(100));
        assert!(stem.len() <= MAX_SECTION_STEM_BYTES);
        assert!(stem.starts_with("word-word"));
        assert!(!stem.ends_with('-'));

        let stem = section_file_stem(&"é".repeat(150));
        assert!(stem.len() <= MAX_SECTION_STEM_BYTES);
        assert_eq!(stem.chars().count(), 100);
    }

    #[test]
    fn test_failed_result_keeps_identity() {
        let mut job = ParserJob::new("uuid-1", "https://www.royalroad.com/fiction/1/x");
        job.is_error_job = true;
        let result = JobResult::failed(&job);

        assert!(result.has_error);
        assert_eq!(result.key(), job.key());
        assert_eq!(result.metadata.url, job.url);
    }
}
