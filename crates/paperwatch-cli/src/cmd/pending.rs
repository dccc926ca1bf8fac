//! Pending subcommand - records awaiting notification
//!
//! The notifier itself lives outside this tool; `--ack` records that
//! it has picked these entries up.

use anyhow::Result;
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use paperwatch_core::fmt_num;
use paperwatch_store::PaperStore;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Mark the listed records as notified
    #[arg(long)]
    pub ack: bool,
}

pub fn run(args: PendingArgs, config: &Config) -> Result<()> {
    let mut store = PaperStore::open(&config.store.path)?;
    let pending = store.get_unnotified()?;

    if pending.is_empty() {
        eprintln!("No pending records");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Fetched").fg(Color::Cyan),
            Cell::new("Journal").fg(Color::Cyan),
            Cell::new("Title").fg(Color::Cyan),
        ]);
    for paper in &pending {
        table.add_row(vec![
            Cell::new(
                paper
                    .fetched_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(&paper.journal_name),
            Cell::new(&paper.title),
        ]);
    }

    eprintln!("\n{table}");
    eprintln!("{} pending records", fmt_num(pending.len()));

    if args.ack {
        store.mark_notified(&pending)?;
        log::info!("marked {} records as notified", pending.len());
    }
    Ok(())
}
