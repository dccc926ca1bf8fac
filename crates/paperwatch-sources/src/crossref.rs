//! Crossref works-API adapter
//!
//! Fallback for journals without a usable feed: queries the works
//! endpoint filtered by publication date, newest first, one page of
//! up to 100 rows. Rate-limit and server errors are retried with
//! exponential backoff, honoring a server-supplied `Retry-After`.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde_json::Value;

use paperwatch_core::record::{Journal, Paper, SourceFetch};
use paperwatch_core::{classify, http, FailureKind, FetchError};

const BASE_URL: &str = "https://api.crossref.org/journals";
const PAGE_ROWS: u32 = 100;
const MAX_ATTEMPTS: u32 = 3;
const BASE_DELAY: Duration = Duration::from_secs(2);

/// Date fields tried in priority order when resolving a publication
/// date from a works item.
const DATE_FIELDS: &[&str] = &["published", "published-online", "published-print", "issued"];

/// Fetches recent works for a journal by registry identifier.
#[derive(Debug, Default)]
pub struct CrossrefFetcher;

impl CrossrefFetcher {
    pub fn fetch(&self, journal: &Journal, days_back: i64) -> SourceFetch {
        let from_date = (Utc::now() - chrono::Duration::days(days_back)).format("%Y-%m-%d");
        let url = format!(
            "{BASE_URL}/{}/works?filter=from-pub-date:{from_date}&rows={PAGE_ROWS}&sort=published&order=desc",
            journal.issn
        );

        let body = match get_with_retry(&url) {
            Ok(body) => body,
            Err(e) => {
                let kind = classify(&e);
                log::error!("{}: works API failed ({kind}): {e}", journal.name);
                return SourceFetch::failed(kind, e.to_string());
            }
        };

        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(e) => {
                let message = format!("invalid JSON from works API: {e}");
                log::error!("{}: {message}", journal.name);
                return SourceFetch::failed(FailureKind::Protocol, message);
            }
        };

        let papers = match json["message"]["items"].as_array() {
            Some(items) => items
                .iter()
                .filter_map(|item| parse_item(item, journal))
                .collect(),
            None => Vec::new(),
        };

        SourceFetch {
            papers,
            failure: None,
        }
    }
}

/// GET with retry for rate limit (429) and server errors (5xx). Other
/// failures are final on first sight.
fn get_with_retry(url: &str) -> Result<String, FetchError> {
    let mut attempt = 0u32;
    loop {
        match http::get(url) {
            Ok(resp) if resp.is_success() => return Ok(resp.body),
            Ok(resp) => {
                let transient = resp.status == 429 || resp.status >= 500;
                if transient && attempt + 1 < MAX_ATTEMPTS {
                    attempt += 1;
                    let delay = resp
                        .retry_after
                        .map(Duration::from_secs)
                        .unwrap_or_else(|| backoff_duration(attempt));
                    log::warn!(
                        "works API HTTP {}, retry {attempt}/{} in {delay:?}",
                        resp.status,
                        MAX_ATTEMPTS - 1
                    );
                    std::thread::sleep(delay);
                } else {
                    return Err(FetchError::http_status(
                        resp.status,
                        "works API request failed",
                    ));
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff: 2^attempt seconds (2s, 4s, ...).
const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Convert one works item; items without a usable title are dropped.
fn parse_item(item: &Value, journal: &Journal) -> Option<Paper> {
    let title = item["title"]
        .as_array()
        .and_then(|titles| titles.first())
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim();
    if title.is_empty() {
        return None;
    }

    let authors = item["author"]
        .as_array()
        .map(|authors| authors.iter().filter_map(author_name).collect())
        .unwrap_or_default();

    let doi = item["DOI"].as_str().unwrap_or("").to_string();
    let url = if doi.is_empty() {
        String::new()
    } else {
        format!("https://doi.org/{doi}")
    };

    let mut abstract_text = item["abstract"].as_str().unwrap_or("").to_string();
    if abstract_text.starts_with("<jats:") {
        abstract_text = strip_markup(&abstract_text);
    }

    Some(Paper {
        title: title.to_string(),
        journal_name: journal.name.clone(),
        authors,
        abstract_text,
        doi,
        url,
        published_date: resolve_published(item),
        fetched_at: None,
    })
}

/// `given family`, joined with a space; partial names are kept.
fn author_name(author: &Value) -> Option<String> {
    let given = author["given"].as_str().unwrap_or("").trim();
    let family = author["family"].as_str().unwrap_or("").trim();
    let name = [given, family]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    (!name.is_empty()).then_some(name)
}

/// Try each date field in priority order; a field whose components do
/// not form a valid calendar date is skipped, not an error.
fn resolve_published(item: &Value) -> Option<NaiveDate> {
    DATE_FIELDS
        .iter()
        .find_map(|field| date_from_parts(&item[*field]))
}

/// Crossref dates are `{"date-parts": [[year, month?, day?]]}`; missing
/// month/day default to 1.
fn date_from_parts(field: &Value) -> Option<NaiveDate> {
    let parts = field.get("date-parts")?.as_array()?.first()?.as_array()?;
    let year = i32::try_from(parts.first()?.as_i64()?).ok()?;
    let month = u32::try_from(parts.get(1).and_then(Value::as_i64).unwrap_or(1)).ok()?;
    let day = u32::try_from(parts.get(2).and_then(Value::as_i64).unwrap_or(1)).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Remove all markup tags, keeping text content.
fn strip_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}
