//! oaindex - bulk-load OpenAlex snapshots into a search index
//!
//! Streams gzip line-delimited snapshot files, projects each record type's
//! fields, and writes them through the bulk API of an Elasticsearch-compatible
//! backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::Cell;
use oaindex_core::LogTarget;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "oaindex")]
#[command(about = "Bulk-load OpenAlex snapshots into a search index")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./oaindex.toml or ~/.config/oaindex/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest snapshot folders into their indexes
    Ingest(cmd::ingest::IngestArgs),
    /// Create target indexes (no ingestion)
    Schema(cmd::schema::SchemaArgs),
    /// Query an index
    Search(cmd::search::SearchArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = Arc::new(oaindex_core::ProgressContext::new());

    // Logging:
    //   --log-file: everything at info (or debug) goes to the file
    //   TTY:        quiet (warn) unless --debug, progress bars show activity
    //   non-TTY:    info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let (target, quiet) = match &cli.log_file {
        Some(path) => (LogTarget::File(path.as_path()), false),
        None if is_tty => (LogTarget::Terminal(progress.multi()), !cli.debug),
        None => (LogTarget::Stderr, false),
    };
    oaindex_core::init_logging(quiet, cli.debug, target)?;

    let config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Ingest(args) => {
            oaindex_core::install_signal_handlers()?;
            cmd::ingest::run(args, &config, &progress)
        }
        Command::Schema(args) => cmd::schema::run(args, &config),
        Command::Search(args) => cmd::search::run(args, &config),
        Command::Config => {
            print_config(&config);
            Ok(())
        }
    }
}

fn print_config(config: &Config) {
    let mut table = cmd::styled_table(&["Setting", "Value"]);
    let backend = &config.backend;
    let ingest = &config.ingest;
    let timeout = backend
        .ingest_timeout_secs
        .map_or_else(|| "none".to_string(), |s| format!("{s}s"));
    let rows: Vec<(String, String)> = vec![
        ("Backend URL".into(), backend.url.clone()),
        (
            "Credentials".into(),
            if backend.username.is_some() {
                "configured".into()
            } else {
                "not set".into()
            },
        ),
        ("Ingest timeout".into(), timeout),
        ("Query timeout".into(), format!("{}s", backend.query_timeout_secs)),
        ("Snapshot root".into(), config.snapshot.root.display().to_string()),
        ("Batch size".into(), ingest.batch_size.to_string()),
        (
            "Bulk requests".into(),
            format!(
                "{} per chunk, {} threads, queue {}",
                ingest.chunk_size, ingest.thread_count, ingest.queue_size
            ),
        ),
        (
            "Strategy".into(),
            format!("{} ({} workers)", ingest.strategy, ingest.workers),
        ),
        ("Max retries".into(), ingest.max_retries.to_string()),
        (
            "Max folders".into(),
            ingest
                .max_folders
                .map_or_else(|| "all".to_string(), |n| n.to_string()),
        ),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    for rt in oaindex_ingest::RecordType::all() {
        let overrides = config.overrides(*rt);
        let name = overrides
            .name
            .clone()
            .unwrap_or_else(|| rt.index_name().to_string());
        table.add_row(vec![
            Cell::new(format!("Index ({})", rt.folder_name())),
            Cell::new(name),
        ]);
    }

    eprintln!("\n{table}");
}
