//! paperwatch - journal monitoring pipeline
//!
//! Collects newly published articles from journal feeds and the
//! Crossref works API, deduplicates them against a local store, and
//! reports what arrived.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod journals;

use config::Config;

#[derive(Parser)]
#[command(name = "paperwatch")]
#[command(about = "Journal article monitoring pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./paperwatch.toml or ~/.config/paperwatch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all journals and store new records
    Fetch,
    /// Show store statistics
    Status,
    /// List records fetched recently
    Recent(cmd::recent::RecentArgs),
    /// List records awaiting notification
    Pending(cmd::pending::PendingArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(paperwatch_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug  — the spinner shows activity
    //   non-TTY: info unless --debug          — logs are the only indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    paperwatch_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    paperwatch_core::set_http_config(paperwatch_core::HttpConfig {
        timeout: Duration::from_secs(config.fetch.timeout_secs),
        contact: config.crossref.mailto.clone(),
    });

    match cli.command {
        Command::Fetch => {
            setup_signal_handler();
            cmd::fetch::run(&config, &progress)
        }
        Command::Status => cmd::status::run(&config),
        Command::Recent(args) => cmd::recent::run(args, &config),
        Command::Pending(args) => cmd::pending::run(args, &config),
        Command::Config => {
            use comfy_table::{
                modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table,
            };

            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_header(vec![
                    Cell::new("Setting").fg(Color::Cyan),
                    Cell::new("Value").fg(Color::Cyan),
                ]);

            table.add_row(vec![
                "Journal list",
                &config.journals.path.display().to_string(),
            ]);
            table.add_row(vec!["Store", &config.store.path.display().to_string()]);
            table.add_row(vec!["Lookback", &format!("{} days", config.fetch.days_back)]);
            table.add_row(vec!["Timeout", &format!("{}s", config.fetch.timeout_secs)]);
            table.add_row(vec![
                "Rate limit",
                &format!("{:.1}s", config.fetch.rate_limit_secs),
            ]);
            table.add_row(vec![
                "Crossref contact",
                if config.crossref.mailto.is_some() {
                    "configured"
                } else {
                    "not set"
                },
            ]);

            eprintln!("\n{table}");
            Ok(())
        }
    }
}

fn setup_signal_handler() {
    // First signal: graceful stop after the current source.
    // Second signal: force exit.
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    unsafe {
        for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
            signal_hook::low_level::register(signal, || {
                if paperwatch_core::shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
            .expect("failed to register signal handler");
        }
    }
}
