//! Canonical record types flowing through the pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::failure::FailureKind;

/// One journal article in canonical form.
///
/// Adapters produce these from heterogeneous upstream representations;
/// the store persists them. `fetched_at` is stamped by the store on
/// insert, never by an adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paper {
    pub title: String,
    pub journal_name: String,
    pub authors: Vec<String>,
    pub abstract_text: String,
    /// Raw DOI as seen upstream (may carry a resolver prefix).
    pub doi: String,
    /// Raw URL as seen upstream.
    pub url: String,
    pub published_date: Option<NaiveDate>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Static description of one monitored journal, loaded from the journal
/// list file once per run and never mutated by the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Journal {
    pub name: String,
    pub feed_url: String,
    /// Registry identifier used for the works-API fallback.
    pub issn: String,
    /// Operational status; only "working" entries are fetched via feed.
    pub status: String,
}

impl Journal {
    /// Whether the journal can be fetched via its feed. Requires a real
    /// URL (hand-maintained lists use "-" as a placeholder) and an
    /// operational status flag.
    pub fn has_feed(&self) -> bool {
        !self.feed_url.is_empty()
            && self.feed_url != "-"
            && self.status.eq_ignore_ascii_case("working")
    }

    pub fn has_issn(&self) -> bool {
        !self.issn.is_empty()
    }
}

/// One-shot result of a single adapter call.
///
/// Adapters never abort the run: transport and structural failures end
/// the call early and are reported here alongside whatever records were
/// recovered before the failure.
#[derive(Debug, Default)]
pub struct SourceFetch {
    pub papers: Vec<Paper>,
    pub failure: Option<SourceFailure>,
}

impl SourceFetch {
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            papers: Vec::new(),
            failure: Some(SourceFailure {
                kind,
                message: message.into(),
            }),
        }
    }
}

/// Classified failure reported by an adapter after its call completes.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub kind: FailureKind,
    pub message: String,
}
