//! Shared fixtures for the integration tests

use black_library::parsers::{PacingStrategy, ParserSettings};
use black_library::storage::SqliteStorage;
use black_library::VersionEngine;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Settings with millisecond ticks so whole jobs finish quickly
pub fn fast_settings() -> ParserSettings {
    ParserSettings {
        tick: Duration::from_millis(5),
        politeness_wait: Duration::from_millis(5),
        fetch_timeout: Duration::from_secs(5),
        max_attempts: 3,
        pacing: PacingStrategy::Short,
    }
}

pub fn version_engine() -> Arc<VersionEngine> {
    let storage = SqliteStorage::new_in_memory().expect("Failed to open in-memory storage");
    Arc::new(VersionEngine::new(Arc::new(Mutex::new(storage))))
}

/// Sorted names of the files in a directory
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A Royal Road table of contents listing `(slug, chapter number, unixtime)`
pub fn royalroad_toc(fiction_path: &str, chapters: &[(&str, u32, i64)]) -> String {
    let rows: String = chapters
        .iter()
        .map(|(slug, number, unixtime)| {
            format!(
                r#"<tr class="chapter-row"><td><a href="{path}/chapter/{number}/{slug}">{slug}</a></td><td><time unixtime="{unixtime}">then</time></td></tr>"#,
                path = fiction_path,
                number = number,
                slug = slug,
                unixtime = unixtime
            )
        })
        .collect();

    format!(
        r#"<html><head>
            <meta property="og:url" content="https://www.royalroad.com/fiction/1/test-fiction">
            <meta property="books:author" content="Tester">
        </head><body>
            <h1>Test Fiction</h1>
            <table id="chapters"><tbody>{}</tbody></table>
        </body></html>"#,
        rows
    )
}

pub fn royalroad_chapter(text: &str) -> String {
    format!(
        r#"<html><body><div class="chapter-inner chapter-content"><p>{}</p><p>more</p></div></body></html>"#,
        text
    )
}
