//! Ingest subcommand - bulk-load snapshot folders into the search index

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use oaindex_core::{SharedProgress, fmt_num, is_shutdown_requested};
use oaindex_ingest::{ElasticClient, MemoryBackend, RunSummary, SearchBackend, Strategy};

use super::{TypeArg, print_summary, record_types};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Record types to ingest, in order (default: all)
    #[arg(value_enum)]
    pub types: Vec<TypeArg>,

    /// Snapshot data directory holding works/, sources/, ...
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Backend URL
    #[arg(long)]
    pub url: Option<String>,

    /// Actions per accumulated batch
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Actions per bulk request
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Concurrent bulk requests per batch
    #[arg(short, long)]
    pub thread_count: Option<usize>,

    /// Bulk requests queued ahead of the senders
    #[arg(long)]
    pub queue_size: Option<usize>,

    /// File scheduling: sequential or fan-out
    #[arg(short, long)]
    pub strategy: Option<Strategy>,

    /// Concurrent files in fan-out mode
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Only the first N dated subfolders
    #[arg(short = 'l', long)]
    pub max_folders: Option<usize>,

    /// Retries per bulk request on connection errors, 429 and 5xx
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Decode and batch without a backend (documents are kept in memory)
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: IngestArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let mut walk = config.walk_config();
    if let Some(n) = args.batch_size {
        walk.batch_size = n;
    }
    if let Some(n) = args.chunk_size {
        walk.submit.chunk_size = n;
    }
    if let Some(n) = args.thread_count {
        walk.submit.thread_count = n;
    }
    if let Some(n) = args.queue_size {
        walk.submit.queue_size = n;
    }
    if let Some(s) = args.strategy {
        walk.strategy = s;
    }
    if let Some(n) = args.workers {
        walk.workers = n;
    }
    if args.max_folders.is_some() {
        walk.max_folders = args.max_folders;
    }
    if let Some(n) = args.max_retries {
        walk.submit.max_retries = n;
    }

    let root = args.root.unwrap_or_else(|| config.snapshot.root.clone());
    let types = record_types(&args.types);
    let jobs: Vec<oaindex_ingest::Config> = types
        .into_iter()
        .map(|record_type| oaindex_ingest::Config {
            snapshot_root: root.clone(),
            record_type,
            index: config.overrides(record_type),
            walk: walk.clone(),
        })
        .collect();

    if args.dry_run {
        log::info!("Dry run: documents stay in memory");
        let backend = MemoryBackend::new();
        ingest_with(&backend, &jobs, progress)
    } else {
        let es = config.elastic_config(args.url.as_deref(), config.backend.ingest_timeout_secs);
        let client = ElasticClient::connect(&es)
            .with_context(|| format!("Failed to set up client for {}", es.url))?;
        log::info!("Backend: {}", client.base_url());
        ingest_with(&client, &jobs, progress)
    }
}

fn ingest_with<B: SearchBackend>(
    backend: &B,
    jobs: &[oaindex_ingest::Config],
    progress: &SharedProgress,
) -> Result<()> {
    let mut failed_files = 0;
    for job in jobs {
        if is_shutdown_requested() {
            log::warn!("Stop requested, skipping {}", job.record_type);
            continue;
        }
        let summary = oaindex_ingest::run(job, backend, progress)?;
        print_run_summary(&summary);
        failed_files += summary.files_failed();
    }

    if failed_files > 0 {
        anyhow::bail!("{failed_files} files failed");
    }
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    let index = if summary.created_index {
        format!("{} (created)", summary.index)
    } else {
        summary.index.clone()
    };
    let mut rows = vec![
        ("Index", index),
        (
            "Files",
            format!(
                "{} completed, {} failed, {} skipped",
                summary.files_completed,
                summary.files_failed(),
                summary.files_skipped
            ),
        ),
        ("Folders", summary.folders.to_string()),
        (
            "Lines",
            format!(
                "{} read, {} dropped",
                fmt_num(summary.lines_read),
                fmt_num(summary.dropped)
            ),
        ),
        (
            "Documents",
            format!(
                "{} indexed, {} rejected",
                fmt_num(summary.indexed),
                fmt_num(summary.rejected)
            ),
        ),
        ("Batches", fmt_num(summary.batches)),
    ];
    if let Some(docs) = summary.index_docs {
        rows.push(("Index size", format!("{} docs", fmt_num(docs as usize))));
    }
    rows.push((
        "Time",
        format!(
            "{:.1}s ({:.0} docs/s)",
            summary.elapsed.as_secs_f64(),
            summary.throughput()
        ),
    ));
    rows.push((
        "Started",
        summary.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ));
    for (path, _) in &summary.failed {
        rows.push(("Failed", path.display().to_string()));
    }

    let title = format!("{} Ingest", summary.record_type);
    print_summary(&title, &rows);
}
