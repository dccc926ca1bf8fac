//! Status subcommand - store statistics

use anyhow::Result;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use paperwatch_core::fmt_num;
use paperwatch_store::PaperStore;

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let store = PaperStore::open(&config.store.path)?;
    let stats = store.get_stats()?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Journal")
                .fg(Color::Cyan)
                .add_attribute(comfy_table::Attribute::Bold),
            Cell::new("Records").fg(Color::Cyan),
        ]);
    for (journal, count) in &stats.by_journal {
        table.add_row(vec![
            Cell::new(journal),
            Cell::new(fmt_num(*count as usize)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total").fg(Color::Green),
        Cell::new(fmt_num(stats.total as usize)).fg(Color::Green),
    ]);

    eprintln!("\n{table}");
    eprintln!(
        "{} notified, {} pending",
        fmt_num(stats.notified as usize),
        fmt_num(stats.unnotified as usize)
    );
    Ok(())
}
