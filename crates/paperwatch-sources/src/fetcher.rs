//! Fetch orchestration across configured journals
//!
//! Journals are drained strictly one at a time, in list order. The
//! iterator returned by [`PaperFetcher::fetch_all`] is a pass-through:
//! records reach the caller as each source is drained, and one
//! source's failure never prevents the next from being attempted.

use std::time::Duration;

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use paperwatch_core::record::{Journal, Paper};
use paperwatch_core::{fmt_num, is_shutdown_requested, FailureKind};

use crate::crossref::CrossrefFetcher;
use crate::feed::FeedFetcher;

/// Which adapter produced a record or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Feed,
    CrossrefApi,
}

impl AdapterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Feed => "feed",
            Self::CrossrefApi => "crossref",
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source that reported a failure during the run.
#[derive(Debug, Clone)]
pub struct FailedSource {
    pub journal: String,
    pub adapter: AdapterKind,
    pub kind: FailureKind,
    pub message: String,
}

/// Statistics for one orchestrator invocation. Reset at the start of
/// each `fetch_all` and readable after the iterator is exhausted.
#[derive(Debug, Default)]
pub struct RunStats {
    pub fetched: usize,
    pub failed: Vec<FailedSource>,
    pub skipped: Vec<String>,
}

impl RunStats {
    /// Summary table for the end-of-run report.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Fetch Run")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Records fetched").fg(Color::Green),
            Cell::new(fmt_num(self.fetched)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Sources failed"),
            Cell::new(self.failed.len().to_string()),
        ]);
        table.add_row(vec![
            Cell::new("Sources skipped"),
            Cell::new(self.skipped.len().to_string()),
        ]);

        format!("\n{table}")
    }

    /// Log one line per failed and skipped source.
    pub fn log_problems(&self) {
        for failure in &self.failed {
            log::warn!(
                "{} ({}): {}: {}",
                failure.journal,
                failure.adapter,
                failure.kind,
                failure.message
            );
        }
        for journal in &self.skipped {
            log::warn!("{journal}: skipped (no feed URL or ISSN)");
        }
    }
}

/// Sequences the two adapters across the configured journal list.
pub struct PaperFetcher {
    feed: FeedFetcher,
    crossref: CrossrefFetcher,
    days_back: i64,
    rate_limit: Duration,
    stats: RunStats,
}

impl PaperFetcher {
    pub fn new(days_back: i64, rate_limit: Duration) -> Self {
        Self {
            feed: FeedFetcher,
            crossref: CrossrefFetcher,
            days_back,
            rate_limit,
            stats: RunStats::default(),
        }
    }

    /// Lazily fetch every journal, yielding records as each source is
    /// drained. Read [`Self::last_run_stats`] after exhaustion.
    pub fn fetch_all<'a>(&'a mut self, journals: &'a [Journal]) -> FetchAll<'a> {
        self.stats = RunStats::default();
        FetchAll {
            fetcher: self,
            journals,
            next_idx: 0,
            current: Vec::new().into_iter(),
        }
    }

    /// Statistics from the most recent `fetch_all` drain.
    pub fn last_run_stats(&self) -> &RunStats {
        &self.stats
    }
}

/// Pause between consecutive sources only: never before the first, and
/// therefore never after the last. A zero interval disables pausing.
fn should_pause(next_idx: usize, rate_limit: Duration) -> bool {
    next_idx > 0 && !rate_limit.is_zero()
}

/// Pass-through iterator over all journals' records.
pub struct FetchAll<'a> {
    fetcher: &'a mut PaperFetcher,
    journals: &'a [Journal],
    next_idx: usize,
    current: std::vec::IntoIter<Paper>,
}

impl Iterator for FetchAll<'_> {
    type Item = Paper;

    fn next(&mut self) -> Option<Paper> {
        loop {
            if let Some(paper) = self.current.next() {
                self.fetcher.stats.fetched += 1;
                return Some(paper);
            }

            if self.next_idx >= self.journals.len() {
                return None;
            }
            if is_shutdown_requested() {
                log::warn!("shutdown requested, stopping fetch");
                self.next_idx = self.journals.len();
                return None;
            }

            if should_pause(self.next_idx, self.fetcher.rate_limit) {
                std::thread::sleep(self.fetcher.rate_limit);
            }

            let journal = &self.journals[self.next_idx];
            self.next_idx += 1;

            let (adapter, outcome) = if journal.has_feed() {
                log::info!("Fetching {} via feed", journal.name);
                (
                    AdapterKind::Feed,
                    self.fetcher.feed.fetch(journal, self.fetcher.days_back),
                )
            } else if journal.has_issn() {
                log::info!("Fetching {} via works API", journal.name);
                (
                    AdapterKind::CrossrefApi,
                    self.fetcher.crossref.fetch(journal, self.fetcher.days_back),
                )
            } else {
                log::warn!("{}: no fetch method available", journal.name);
                self.fetcher.stats.skipped.push(journal.name.clone());
                continue;
            };

            if let Some(failure) = outcome.failure {
                self.fetcher.stats.failed.push(FailedSource {
                    journal: journal.name.clone(),
                    adapter,
                    kind: failure.kind,
                    message: failure.message,
                });
            }
            self.current = outcome.papers.into_iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_source_journal(name: &str) -> Journal {
        Journal {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn journals_without_fetch_method_are_skipped() {
        let journals = vec![no_source_journal("A"), no_source_journal("B")];
        let mut fetcher = PaperFetcher::new(7, Duration::ZERO);
        let papers: Vec<_> = fetcher.fetch_all(&journals).collect();

        assert!(papers.is_empty());
        let stats = fetcher.last_run_stats();
        assert_eq!(stats.fetched, 0);
        assert_eq!(stats.skipped, vec!["A".to_string(), "B".to_string()]);
        assert!(stats.failed.is_empty());
    }

    #[test]
    fn failed_source_does_not_block_following_sources() {
        // Port 1 on loopback: connection fails fast without touching
        // the network, exercising the real failure path.
        let journals = vec![
            Journal {
                name: "Broken".into(),
                feed_url: "http://127.0.0.1:1/feed.xml".into(),
                status: "Working".into(),
                ..Default::default()
            },
            no_source_journal("After"),
        ];
        let mut fetcher = PaperFetcher::new(7, Duration::ZERO);
        let papers: Vec<_> = fetcher.fetch_all(&journals).collect();

        assert!(papers.is_empty());
        let stats = fetcher.last_run_stats();
        assert_eq!(stats.failed.len(), 1);
        assert_eq!(stats.failed[0].journal, "Broken");
        assert_eq!(stats.failed[0].adapter, AdapterKind::Feed);
        assert_eq!(stats.failed[0].kind, FailureKind::FeedFetch);
        assert_eq!(stats.skipped, vec!["After".to_string()]);
    }

    #[test]
    fn stats_reset_between_runs() {
        let journals = vec![no_source_journal("A")];
        let mut fetcher = PaperFetcher::new(7, Duration::ZERO);
        let _: Vec<_> = fetcher.fetch_all(&journals).collect();
        let _: Vec<_> = fetcher.fetch_all(&journals).collect();
        assert_eq!(fetcher.last_run_stats().skipped.len(), 1);
    }

    #[test]
    fn pause_only_between_sources() {
        let interval = Duration::from_millis(500);
        assert!(!should_pause(0, interval));
        assert!(should_pause(1, interval));
        assert!(should_pause(2, interval));
    }

    #[test]
    fn zero_interval_disables_pausing() {
        assert!(!should_pause(1, Duration::ZERO));
        assert!(!should_pause(5, Duration::ZERO));
    }

    #[test]
    fn adapter_kind_labels() {
        assert_eq!(AdapterKind::Feed.as_str(), "feed");
        assert_eq!(AdapterKind::CrossrefApi.as_str(), "crossref");
    }

    #[test]
    fn format_table_mentions_counts() {
        let stats = RunStats {
            fetched: 1234,
            failed: Vec::new(),
            skipped: vec!["X".into()],
        };
        let table = stats.format_table();
        assert!(table.contains("1,234"));
        assert!(table.contains("Records fetched"));
    }
}
