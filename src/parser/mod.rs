pub mod detail;
pub mod listing;

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Selector};
use thiserror::Error;

/// Date format shared by the listing and detail pages once the weekday is dropped,
/// e.g. `01 Jan 2024` from `Mon, 01 Jan 2024`.
pub const PAGE_DATE_FORMAT: &str = "%d %b %Y";

/// Stored timestamps assume Brisbane time; the offset is fixed, never computed.
pub const STORE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+10:00";

static NEWLINE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\n\r]+").unwrap());
static WHITESPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());
static SIGNATURES_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)signatures.*").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("malformed listing row {row}: {reason}")]
    MalformedRow { row: usize, reason: &'static str },
    #[error("unparseable date {0:?}")]
    BadDate(String),
}

/// The weekday prefix is not checked against the date; only day, month and year count.
pub fn parse_page_date(text: &str) -> Result<NaiveDate, ExtractError> {
    let text = text.trim();
    let date = text.split_once(", ").map_or(text, |(_, rest)| rest);
    NaiveDate::parse_from_str(date.trim(), PAGE_DATE_FORMAT).map_err(|_| ExtractError::BadDate(text.to_string()))
}

pub fn format_store_datetime(dt: &NaiveDateTime) -> String {
    dt.format(STORE_DATETIME_FORMAT).to_string()
}

pub fn format_store_date(date: &NaiveDate) -> String {
    format_store_datetime(&date.and_time(NaiveTime::MIN))
}

/// Newline runs become one `\n`, then any other 2+ whitespace run becomes one space.
pub fn normalize_body(text: &str) -> String {
    let collapsed = NEWLINE_RUN_RE.replace_all(text, "\n");
    WHITESPACE_RUN_RE.replace_all(&collapsed, " ").trim().to_string()
}

/// `"1,234 signatures as of today"` -> `"1,234"`. No numeric interpretation.
pub fn signature_snapshot(raw: &str) -> String {
    SIGNATURES_SUFFIX_RE.replace(raw, "").trim().to_string()
}

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}
