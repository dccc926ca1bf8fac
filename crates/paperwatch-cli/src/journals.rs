//! Journal list loading
//!
//! The monitored journals live in a hand-maintained TOML file with one
//! `[[journal]]` table per entry. Loaded once per run, read-only.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

use paperwatch_core::Journal;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JournalsFile {
    journal: Vec<Journal>,
}

/// Load and validate the journal list. Entries without a name are
/// skipped with a warning; an empty result is an error since a run
/// without sources can only do nothing.
pub fn load_journals(path: &Path) -> Result<Vec<Journal>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read journal list: {}", path.display()))?;
    let file: JournalsFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse journal list: {}", path.display()))?;

    let mut journals = Vec::new();
    for journal in file.journal {
        if journal.name.trim().is_empty() {
            log::warn!("{}: skipping journal entry without a name", path.display());
            continue;
        }
        journals.push(journal);
    }

    ensure!(!journals.is_empty(), "no journals in {}", path.display());
    log::info!("loaded {} journals from {}", journals.len(), path.display());
    Ok(journals)
}
