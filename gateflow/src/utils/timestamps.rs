//! Timestamp formats used in saved runs.

use chrono::{DateTime, Local, TimeZone};

const FILE_STAMP: &str = "%Y%m%d-%H%M%S";
const DISPLAY_STAMP: &str = "%Y-%m-%d %H:%M:%S";
const MONTH_STAMP: &str = "%Y-%m";

/// Formats a time as a file-name stem, e.g. `20250102-030405`.
#[must_use]
pub fn file_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(FILE_STAMP).to_string()
}

/// Formats a time for humans, e.g. `2025-01-02 03:04:05`.
#[must_use]
pub fn display_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(DISPLAY_STAMP).to_string()
}

/// Returns the current local year and month, e.g. `2025-01`.
#[must_use]
pub fn current_month() -> String {
    Local::now().format(MONTH_STAMP).to_string()
}
