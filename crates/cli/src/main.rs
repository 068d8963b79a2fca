//! Settle CLI - settle command

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use settle_watcher::{CancellationToken, DirsWatcher, EventKind, WatchEvent, WatcherConfig};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

/// Settle - print file events once writers have finished
#[derive(Parser)]
#[command(name = "settle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directories to watch (not recursive)
    #[arg(default_value = "./")]
    dirs: Vec<PathBuf>,

    /// Quiet period in milliseconds; 0 prints every raw event
    #[arg(short, long)]
    quiet_ms: Option<i64>,

    /// Capacity of the event stream
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// TOML file with watcher settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    fn watcher_config(&self) -> Result<WatcherConfig> {
        let mut config = match &self.config {
            Some(path) => WatcherConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => WatcherConfig::default(),
        };
        if let Some(quiet_ms) = self.quiet_ms {
            config.quiet_period_ms = quiet_ms;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let config = cli.watcher_config()?;
    let shutdown = CancellationToken::new();

    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            ctrl_c.cancel();
        }
    });

    let mut watcher = DirsWatcher::watch_dirs(cli.dirs.clone(), config, shutdown)
        .context("Failed to start watching")?;
    match watcher.config().quiet_period() {
        Some(quiet) => info!("Coalescing with a {:?} quiet period", quiet),
        None => info!("Coalescing disabled, printing raw events"),
    }

    // Each directory reports exactly one terminal error
    let mut running = watcher.dirs().len();
    while let Some(event) = watcher.recv().await {
        print_event(&event);
        if event.is_terminal() {
            running = running.saturating_sub(1);
            if running == 0 {
                break;
            }
        }
    }

    Ok(())
}

fn print_event(event: &WatchEvent) {
    match &event.kind {
        EventKind::Created if event.startup => println!("{} {}", "=".dimmed(), event),
        EventKind::Created => println!("{} {}", "+".green(), event),
        EventKind::Modified => println!("{} {}", "~".yellow(), event),
        EventKind::Deleted => println!("{} {}", "-".red(), event),
        EventKind::Error(err) if err.is_terminal() => {
            println!("{} {}", "✗".red(), event.to_string().red())
        }
        EventKind::Error(_) => warn!("{}", event),
    }
}
