//! Schema bootstrap and versioned migration
//!
//! The applied schema generation is stored as data in the `metadata`
//! table and advanced only by fully-committed migration steps. Every
//! step is idempotent, so running the whole sequence on each startup
//! is safe: at target version it is a no-op. Migration failures
//! propagate; the store is unusable until the schema is consistent.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use paperwatch_core::{normalize_doi, normalize_url};

/// Current schema generation. Equals the last migration's version.
pub const SCHEMA_VERSION: i64 = 1;

struct Migration {
    version: i64,
    name: &'static str,
    apply: fn(&Connection) -> Result<()>,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "normalized identity columns",
    apply: add_normalized_identity,
}];

/// Create missing tables and bring the schema up to
/// [`SCHEMA_VERSION`]. Each pending step runs in its own transaction
/// together with the version bump.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    bootstrap(conn).context("schema bootstrap failed")?;

    let current = schema_version(conn)?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        (migration.apply)(&tx).with_context(|| {
            format!(
                "migration v{} ({}) failed",
                migration.version, migration.name
            )
        })?;
        set_schema_version(&tx, migration.version)?;
        tx.commit()?;
        log::info!(
            "store schema migrated to v{} ({})",
            migration.version,
            migration.name
        );
    }
    Ok(())
}

/// Create the paper and metadata tables if absent. A database from
/// before the versioning scheme keeps its existing paper table; the
/// migration sequence fills the gap.
fn bootstrap(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS papers (
            unique_id TEXT PRIMARY KEY,
            normalized_doi TEXT,
            normalized_url TEXT,
            title TEXT NOT NULL,
            journal_name TEXT NOT NULL,
            authors TEXT,
            abstract TEXT,
            doi TEXT,
            url TEXT,
            published_date TEXT,
            fetched_at TEXT NOT NULL,
            notified INTEGER DEFAULT 0
        )
        "#,
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_papers_journal ON papers(journal_name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_papers_fetched ON papers(fetched_at)",
        [],
    )?;
    Ok(())
}

/// Stored schema generation; 0 when the marker has never been written.
pub fn schema_version(conn: &Connection) -> Result<i64> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![version.to_string()],
    )?;
    Ok(())
}

/// v1: add `normalized_doi` / `normalized_url`, backfill existing rows,
/// then enforce uniqueness of non-empty values via partial indexes.
fn add_normalized_identity(conn: &Connection) -> Result<()> {
    let columns = table_columns(conn, "papers")?;
    if !columns.iter().any(|c| c == "normalized_doi") {
        conn.execute("ALTER TABLE papers ADD COLUMN normalized_doi TEXT", [])?;
    }
    if !columns.iter().any(|c| c == "normalized_url") {
        conn.execute("ALTER TABLE papers ADD COLUMN normalized_url TEXT", [])?;
    }

    backfill_normalized(conn)?;

    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_papers_normalized_doi
         ON papers(normalized_doi)
         WHERE normalized_doi IS NOT NULL AND normalized_doi != ''",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_papers_normalized_url
         ON papers(normalized_url)
         WHERE normalized_url IS NOT NULL AND normalized_url != ''",
        [],
    )?;
    Ok(())
}

/// Compute normalized values for rows missing them. Existing values
/// are never overwritten, and a computed value already claimed by
/// another row is skipped so the unique indexes can be created.
fn backfill_normalized(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT unique_id, doi, url, normalized_doi, normalized_url FROM papers",
    )?;
    let rows: Vec<(String, Option<String>, Option<String>, Option<String>, Option<String>)> =
        stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut backfilled = 0usize;
    for (unique_id, doi, url, current_doi, current_url) in rows {
        if is_blank(&current_doi) {
            let value = normalize_doi(doi.as_deref().unwrap_or(""));
            if !value.is_empty() && !value_taken(conn, "normalized_doi", &value, &unique_id)? {
                conn.execute(
                    "UPDATE papers SET normalized_doi = ?1 WHERE unique_id = ?2",
                    params![value, unique_id],
                )?;
                backfilled += 1;
            }
        }
        if is_blank(&current_url) {
            let value = normalize_url(url.as_deref().unwrap_or(""));
            if !value.is_empty() && !value_taken(conn, "normalized_url", &value, &unique_id)? {
                conn.execute(
                    "UPDATE papers SET normalized_url = ?1 WHERE unique_id = ?2",
                    params![value, unique_id],
                )?;
                backfilled += 1;
            }
        }
    }
    if backfilled > 0 {
        log::info!("backfilled {backfilled} normalized identity values");
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().unwrap_or("").is_empty()
}

/// Whether `value` already belongs to a row other than `unique_id`.
/// `column` is a compile-time constant, never user input.
fn value_taken(conn: &Connection, column: &str, value: &str, unique_id: &str) -> Result<bool> {
    let sql =
        format!("SELECT 1 FROM papers WHERE {column} = ?1 AND unique_id != ?2 LIMIT 1");
    let found: Option<i64> = conn
        .query_row(&sql, params![value, unique_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let sql = format!("PRAGMA table_info({table})");
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(columns)
}
