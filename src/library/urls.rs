//! URL list intake

use std::path::Path;

/// Parses a URL list: one URL per line, `#` starts a comment line
///
/// Lines are trimmed, blanks and comments dropped, and the result is
/// sorted with duplicates removed.
pub fn parse_url_list(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    urls.sort();
    urls.dedup();
    urls
}

/// Reads and parses a URL list file
pub fn read_url_list(path: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_url_list(&text))
}
