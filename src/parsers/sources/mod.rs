//! Site-specific extraction
//!
//! Each source plugs into one of the two parser variants. Selectors follow
//! the markup the sites serve today and are expected to drift.

mod ao3;
mod royalroad;
mod wordpress;
mod xenforo;

pub use ao3::Ao3Source;
pub use royalroad::RoyalRoadSource;
pub use wordpress::WordPressSource;
pub use xenforo::XenForoSource;

use chrono::{NaiveDate, NaiveDateTime};

/// Parses a calendar date as midnight UTC, in unix seconds
pub(crate) fn parse_date(text: &str, format: &str) -> Option<i64> {
    NaiveDate::parse_from_str(text.trim(), format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc().timestamp())
}

/// Parses a date and time as UTC, in unix seconds
///
/// Anything after the formatted prefix, such as a timezone offset, is
/// ignored.
pub(crate) fn parse_datetime(text: &str, format: &str) -> Option<i64> {
    let text = text.trim();
    let prefix = text.get(..19).unwrap_or(text);
    NaiveDateTime::parse_from_str(prefix, format)
        .ok()
        .map(|datetime| datetime.and_utc().timestamp())
}
