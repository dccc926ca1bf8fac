//! Recent subcommand - records fetched within a window

use anyhow::Result;
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use paperwatch_core::fmt_num;
use paperwatch_store::PaperStore;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RecentArgs {
    /// Window in days over fetch timestamps
    #[arg(short, long, default_value_t = 7)]
    pub days: i64,
}

pub fn run(args: RecentArgs, config: &Config) -> Result<()> {
    let store = PaperStore::open(&config.store.path)?;
    let papers = store.get_recent(args.days)?;

    if papers.is_empty() {
        eprintln!("No records fetched in the last {} days", args.days);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Journal").fg(Color::Cyan),
            Cell::new("Published").fg(Color::Cyan),
            Cell::new("Title").fg(Color::Cyan),
            Cell::new("DOI").fg(Color::Cyan),
        ]);
    for paper in &papers {
        table.add_row(vec![
            Cell::new(&paper.journal_name),
            Cell::new(
                paper
                    .published_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(&paper.title),
            Cell::new(&paper.doi),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!("{} records", fmt_num(papers.len()));
    Ok(())
}
