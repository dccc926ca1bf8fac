//! Deduplicating SQLite store for canonical records
//!
//! One database file holds every record ever seen. Insertion is
//! idempotent across three identity handles: the identity key (primary
//! key) plus unique partial indexes on normalized DOI and URL, so the
//! same article reached along different routes still counts once.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use paperwatch_core::record::Paper;
use paperwatch_core::{identity_key, normalize_doi, normalize_url};

use crate::authors;
use crate::migrate;

const PAPER_COLUMNS: &str =
    "title, journal_name, authors, abstract, doi, url, published_date, fetched_at";

/// Per-store aggregate counts.
#[derive(Debug)]
pub struct StoreStats {
    pub total: i64,
    pub notified: i64,
    pub unnotified: i64,
    pub by_journal: Vec<(String, i64)>,
}

/// Handle to the paper database. Construction bootstraps the schema
/// and runs pending migrations; both must succeed before any query.
pub struct PaperStore {
    conn: Connection,
}

impl PaperStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create store dir: {}", parent.display())
                })?;
            }
        }
        let mut conn = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;
        migrate::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        migrate::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Insert records, returning exactly those that were new. The whole
    /// batch is one transaction; duplicate-key rejections inside it are
    /// expected and silently skipped, only storage failures abort.
    pub fn save_batch(&mut self, papers: &[Paper]) -> Result<Vec<Paper>> {
        let fetched_at = Utc::now();
        let tx = self.conn.transaction()?;
        let mut inserted = Vec::new();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO papers
                 (unique_id, normalized_doi, normalized_url, title, journal_name,
                  authors, abstract, doi, url, published_date, fetched_at, notified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
            )?;
            for paper in papers {
                let key = identity_key(paper);
                let changed = stmt.execute(params![
                    key,
                    non_empty(normalize_doi(&paper.doi)),
                    non_empty(normalize_url(&paper.url)),
                    paper.title,
                    paper.journal_name,
                    authors::to_column(&paper.authors),
                    paper.abstract_text,
                    paper.doi,
                    paper.url,
                    paper.published_date.map(|d| d.to_string()),
                    fetched_at.to_rfc3339(),
                ])?;
                if changed > 0 {
                    log::info!("new paper: {}", elide(&paper.title, 60));
                    let mut paper = paper.clone();
                    paper.fetched_at = Some(fetched_at);
                    inserted.push(paper);
                }
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Whether this record matches no stored row on any identity
    /// handle: identity key, normalized DOI, or normalized URL.
    pub fn is_new(&self, paper: &Paper) -> Result<bool> {
        let key = identity_key(paper);
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM papers
                 WHERE unique_id = ?1
                    OR (?2 IS NOT NULL AND normalized_doi = ?2)
                    OR (?3 IS NOT NULL AND normalized_url = ?3)
                 LIMIT 1",
                params![
                    key,
                    non_empty(normalize_doi(&paper.doi)),
                    non_empty(normalize_url(&paper.url)),
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_none())
    }

    /// Records not yet acknowledged by the notifier, newest first.
    pub fn get_unnotified(&self) -> Result<Vec<Paper>> {
        let sql = format!(
            "SELECT {PAPER_COLUMNS} FROM papers WHERE notified = 0 ORDER BY fetched_at DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let papers = stmt
            .query_map([], row_to_paper)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(papers)
    }

    /// Records fetched within the last `days`, grouped by journal with
    /// the newest publications first.
    pub fn get_recent(&self, days: i64) -> Result<Vec<Paper>> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let sql = format!(
            "SELECT {PAPER_COLUMNS} FROM papers
             WHERE fetched_at >= ?1
             ORDER BY journal_name, published_date DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let papers = stmt
            .query_map(params![cutoff], row_to_paper)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(papers)
    }

    /// Flip the notified flag for each given record.
    pub fn mark_notified(&mut self, papers: &[Paper]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare("UPDATE papers SET notified = 1 WHERE unique_id = ?1")?;
            for paper in papers {
                stmt.execute(params![identity_key(paper)])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_stats(&self) -> Result<StoreStats> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))?;
        let notified: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM papers WHERE notified = 1",
            [],
            |row| row.get(0),
        )?;
        let mut stmt = self.conn.prepare(
            "SELECT journal_name, COUNT(*) FROM papers GROUP BY journal_name ORDER BY journal_name",
        )?;
        let by_journal = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(StoreStats {
            total,
            notified,
            unnotified: total - notified,
            by_journal,
        })
    }
}

fn row_to_paper(row: &Row<'_>) -> rusqlite::Result<Paper> {
    Ok(Paper {
        title: row.get(0)?,
        journal_name: row.get(1)?,
        authors: authors::from_column(&row.get::<_, Option<String>>(2)?.unwrap_or_default()),
        abstract_text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        doi: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        url: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        published_date: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .and_then(parse_stored_date),
        fetched_at: row
            .get::<_, Option<String>>(7)?
            .as_deref()
            .and_then(parse_stored_timestamp),
    })
}

/// Dates are written as `YYYY-MM-DD`; rows from older deployments hold
/// full datetimes, which parse down to their date component.
fn parse_stored_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.date_naive())
                .ok()
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|dt| dt.date())
                .ok()
        })
}

fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
                .map(|dt| dt.and_utc())
                .ok()
        })
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Truncate on a character boundary for log lines.
fn elide(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
