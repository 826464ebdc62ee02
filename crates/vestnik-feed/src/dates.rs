//! `pubDate` decoding.
//!
//! Feeds in the wild stamp items with anything from strict RFC 1123 to
//! weekday-less or named-zone variants. Decoding tries a fixed ordered list
//! of strategies; the first success wins.

use chrono::{DateTime, NaiveDateTime};

use crate::FeedError;

/// Numeric-offset layouts not covered by the RFC 2822 parser.
const OFFSET_LAYOUTS: &[&str] = &[
    // 02 Jan 2006 15:04:05 -0700 (weekday-less)
    "%d %b %Y %H:%M:%S %z",
];

/// Layouts whose zone is a name (or absent). chrono cannot resolve zone
/// abbreviations to offsets, so these parse naively and count as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    // ANSIC: Mon Jan  2 15:04:05 2006
    "%a %b %e %H:%M:%S %Y",
    // Unix date with a literal UTC/GMT zone: Mon Jan  2 15:04:05 UTC 2006
    "%a %b %e %H:%M:%S UTC %Y",
    "%a %b %e %H:%M:%S GMT %Y",
    // RFC 850: Monday, 02-Jan-06 15:04:05 GMT
    "%A, %d-%b-%y %H:%M:%S GMT",
];

/// Decode an RSS `pubDate` string into unix seconds.
///
/// # Errors
///
/// Returns [`FeedError::DateFormat`] when no layout matches. Callers emit
/// the item anyway with `pub_date = 0`.
pub fn decode_pub_date(raw: &str) -> Result<i64, FeedError> {
    let raw = raw.trim();

    // RFC 2822 covers RFC 1123(Z) and RFC 822(Z), including single-digit
    // days, two-digit years, and the obsolete named zones (GMT, EST, ...).
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Ok(dt.timestamp());
    }

    for layout in OFFSET_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(raw, layout) {
            return Ok(dt.timestamp());
        }
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Ok(dt.and_utc().timestamp());
        }
    }

    Err(FeedError::DateFormat {
        value: raw.to_string(),
    })
}
