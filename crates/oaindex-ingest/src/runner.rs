//! Run orchestration: registrar, then the snapshot walk

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Local};
use oaindex_core::ProgressContext;

use crate::backend::SearchBackend;
use crate::config::Config;
use crate::record_type::RecordType;
use crate::registrar::{IndexTarget, ensure_index};
use crate::walker::{FileStats, WalkReport, Walker};

/// Ingest one record type into its index
pub fn run<B: SearchBackend + ?Sized>(
    config: &Config,
    backend: &B,
    progress: &ProgressContext,
) -> anyhow::Result<RunSummary> {
    let started_at = Local::now();
    let start = Instant::now();

    let target = IndexTarget::new(config.record_type, &config.index);
    let created_index = ensure_index(backend, &target)
        .with_context(|| format!("failed to ensure index '{}'", target.index))?;

    let root = config.type_root();
    log::info!(
        "Ingesting {} from {} into '{}'",
        config.record_type,
        root.display(),
        target.index
    );
    let walker = Walker::new(backend, config.record_type, &target.index, &config.walk, progress);
    let report = walker
        .walk(&root)
        .with_context(|| format!("failed to list snapshot folder {}", root.display()))?;

    let index_docs = match backend.count(&target.index) {
        Ok(n) => Some(n),
        Err(e) => {
            log::warn!("Could not count documents in '{}': {e}", target.index);
            None
        }
    };

    let summary = RunSummary::from_report(
        config.record_type,
        target.index,
        created_index,
        report,
        index_docs,
        started_at,
        start.elapsed(),
    );
    summary.log();
    Ok(summary)
}

/// Summary of one record type's run
#[derive(Debug)]
pub struct RunSummary {
    pub record_type: RecordType,
    pub index: String,
    pub created_index: bool,
    pub folders: usize,
    pub files_completed: usize,
    pub files_skipped: usize,
    pub lines_read: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub batches: usize,
    pub indexed: usize,
    pub rejected: usize,
    /// Documents in the index after the run, when the backend could say
    pub index_docs: Option<u64>,
    pub failed: Vec<(PathBuf, String)>,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_report(
        record_type: RecordType,
        index: String,
        created_index: bool,
        report: WalkReport,
        index_docs: Option<u64>,
        started_at: DateTime<Local>,
        elapsed: Duration,
    ) -> Self {
        let sum = |f: fn(&FileStats) -> usize| -> usize { report.completed.iter().map(f).sum() };
        Self {
            record_type,
            index,
            created_index,
            folders: report.folders,
            files_completed: report.completed.len(),
            files_skipped: report.skipped,
            lines_read: sum(|s| s.lines_read),
            emitted: sum(|s| s.emitted),
            dropped: sum(|s| s.dropped),
            batches: sum(|s| s.batches),
            indexed: sum(|s| s.indexed),
            rejected: sum(|s| s.rejected),
            index_docs,
            failed: report.failed,
            started_at,
            elapsed,
        }
    }

    pub fn files_failed(&self) -> usize {
        self.failed.len()
    }

    /// True when no file failed
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Indexed documents per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.indexed as f64 / secs
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        log::info!(
            "=== {} Summary (started {}) ===",
            self.record_type,
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        log::info!(
            "Files: {} completed, {} failed, {} skipped in {} folders",
            self.files_completed,
            self.files_failed(),
            self.files_skipped,
            self.folders
        );
        log::info!(
            "Records: {} indexed, {} rejected, {} dropped of {} lines ({} batches)",
            self.indexed,
            self.rejected,
            self.dropped,
            self.lines_read,
            self.batches
        );
        if let Some(docs) = self.index_docs {
            log::info!("Index '{}' holds {docs} documents", self.index);
        }
        log::info!("Time: {:.1}s", self.elapsed.as_secs_f64());
        if self.indexed > 0 {
            log::info!("Throughput: {:.0} docs/sec", self.throughput());
        }
        for (path, err) in &self.failed {
            log::error!("Failed: {} ({err})", path.display());
        }
    }
}
