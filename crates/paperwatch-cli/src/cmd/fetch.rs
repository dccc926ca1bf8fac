//! Fetch subcommand - run the acquisition pipeline once

use anyhow::Result;

use paperwatch_core::{fmt_num, SharedProgress};
use paperwatch_sources::PaperFetcher;
use paperwatch_store::PaperStore;

use crate::config::Config;
use crate::journals;

pub fn run(config: &Config, progress: &SharedProgress) -> Result<()> {
    let journals = journals::load_journals(&config.journals.path)?;

    // A broken or half-migrated store cannot be fetched into safely;
    // open errors end the run before any request goes out.
    let mut store = PaperStore::open(&config.store.path)?;

    let mut fetcher = PaperFetcher::new(config.fetch.days_back, config.fetch.rate_limit());

    let pb = progress.status_line("fetch");
    let mut papers = Vec::new();
    for paper in fetcher.fetch_all(&journals) {
        papers.push(paper);
        pb.set_message(format!("{} records", papers.len()));
    }
    pb.finish_and_clear();

    let inserted = store.save_batch(&papers)?;

    let stats = fetcher.last_run_stats();
    stats.log_problems();
    progress.println(stats.format_table());
    progress.println(format!(
        "{} new of {} fetched",
        fmt_num(inserted.len()),
        fmt_num(stats.fetched)
    ));

    Ok(())
}
