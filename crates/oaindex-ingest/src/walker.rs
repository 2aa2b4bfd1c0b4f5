//! Snapshot walker: folder/file discovery and the per-file pipeline
//!
//! Layout is `<root>/<dated-subfolder>/<part-file>`. Each file runs
//! decode → batch → submit to completion on one thread. Fan-out mode runs
//! several files of the same subfolder at once and waits for the whole
//! subfolder before moving on.

use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use oaindex_core::{
    BatchAccumulator, DEFAULT_BATCH_SIZE, ProgressContext, WorkQueue, drain_batches,
    is_shutdown_requested,
};
use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, SearchBackend};
use crate::decoder::{DecodeError, RecordDecoder};
use crate::record_type::RecordType;
use crate::submitter::{BulkSubmitter, SubmitConfig};

/// How files of one subfolder are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One file at a time
    #[default]
    Sequential,
    /// Bounded worker pool per subfolder
    #[serde(alias = "fanout", alias = "parallel")]
    FanOut,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "fan-out" | "fanout" | "parallel" => Ok(Self::FanOut),
            other => Err(format!(
                "unknown strategy '{other}' (expected sequential or fan-out)"
            )),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => f.write_str("sequential"),
            Self::FanOut => f.write_str("fan-out"),
        }
    }
}

/// Worker count default: available cores, capped at 8
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(8)
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkConfig {
    pub strategy: Strategy,
    /// Concurrent files in fan-out mode
    pub workers: usize,
    /// Actions per accumulated batch
    pub batch_size: usize,
    /// Only the first N subfolders (sorted)
    pub max_folders: Option<usize>,
    pub submit: SubmitConfig,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            workers: default_workers(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_folders: None,
            submit: SubmitConfig::default(),
        }
    }
}

/// One dated subfolder and its part files, both in sorted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFolder {
    pub name: String,
    pub path: PathBuf,
    pub files: Vec<PathBuf>,
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn sorted_entries(dir: &Path, want_dir: bool) -> io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if is_hidden(&path) {
            continue;
        }
        let file_type = entry.file_type()?;
        if (want_dir && file_type.is_dir()) || (!want_dir && file_type.is_file()) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// List subfolders of `root`, then the files of each.
///
/// Plain files directly under `root` (e.g. a manifest) are ignored.
pub fn discover(root: &Path, max_folders: Option<usize>) -> io::Result<Vec<SnapshotFolder>> {
    let mut dirs = sorted_entries(root, true)?;
    if let Some(max) = max_folders {
        dirs.truncate(max);
    }
    dirs.into_iter()
        .map(|path| {
            let files = sorted_entries(&path, false)?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(SnapshotFolder { name, path, files })
        })
        .collect()
}

/// Error that ends processing of one file
#[derive(Debug)]
pub enum FileError {
    Io(io::Error),
    Decode(DecodeError),
    Backend(BackendError),
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Backend(e) => write!(f, "backend: {e}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Backend(e) => Some(e),
        }
    }
}

impl From<io::Error> for FileError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DecodeError> for FileError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<BackendError> for FileError {
    fn from(e: BackendError) -> Self {
        Self::Backend(e)
    }
}

/// Statistics for one completed file
#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    pub path: PathBuf,
    pub lines_read: usize,
    pub emitted: usize,
    pub dropped: usize,
    pub batches: usize,
    pub indexed: usize,
    pub rejected: usize,
    pub elapsed: Duration,
}

impl FileStats {
    pub fn log(&self) {
        log::info!(
            "{}: {} indexed, {} rejected, {} dropped of {} lines in {} batches ({:.1}s)",
            file_label(&self.path),
            self.indexed,
            self.rejected,
            self.dropped,
            self.lines_read,
            self.batches,
            self.elapsed.as_secs_f64()
        );
    }
}

/// Per-walk result: which files finished, which failed, which never started
#[derive(Debug, Default)]
pub struct WalkReport {
    pub folders: usize,
    pub completed: Vec<FileStats>,
    pub failed: Vec<(PathBuf, String)>,
    /// Files not started because of a stop request
    pub skipped: usize,
}

impl WalkReport {
    fn record(&mut self, path: &Path, result: Result<FileStats, FileError>) {
        match result {
            Ok(stats) => {
                stats.log();
                self.completed.push(stats);
            }
            Err(e) => {
                log::error!("{}: failed: {e}", file_label(path));
                self.failed.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    pub fn files(&self) -> usize {
        self.completed.len() + self.failed.len() + self.skipped
    }
}

/// `<subfolder>/<file>` for log lines and progress bars
pub fn file_label(path: &Path) -> String {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    match path.parent().and_then(Path::file_name) {
        Some(parent) => format!("{}/{file}", parent.to_string_lossy()),
        None => file.into_owned(),
    }
}

/// Drives the per-file pipeline for one record type
pub struct Walker<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
    record_type: RecordType,
    index: Arc<str>,
    config: &'a WalkConfig,
    progress: &'a ProgressContext,
}

impl<'a, B: SearchBackend + ?Sized> Walker<'a, B> {
    pub fn new(
        backend: &'a B,
        record_type: RecordType,
        index: &str,
        config: &'a WalkConfig,
        progress: &'a ProgressContext,
    ) -> Self {
        Self {
            backend,
            record_type,
            index: Arc::from(index),
            config,
            progress,
        }
    }

    /// Process every file under `root`, continuing past failed files.
    ///
    /// Only a failure to list the snapshot is returned as an error.
    pub fn walk(&self, root: &Path) -> io::Result<WalkReport> {
        let folders = discover(root, self.config.max_folders)?;
        let total_files: usize = folders.iter().map(|f| f.files.len()).sum();
        log::info!(
            "{}: {} files in {} folders under {} ({} strategy)",
            self.record_type,
            total_files,
            folders.len(),
            root.display(),
            self.config.strategy
        );

        let pool = match self.config.strategy {
            Strategy::FanOut => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(self.config.workers.max(1))
                    .thread_name(|i| format!("oaindex-file-{i}"))
                    .build()
                    .map_err(io::Error::other)?,
            ),
            Strategy::Sequential => None,
        };

        let report = Mutex::new(WalkReport {
            folders: folders.len(),
            ..Default::default()
        });
        for folder in &folders {
            if is_shutdown_requested() {
                report.lock().unwrap().skipped += folder.files.len();
                continue;
            }
            log::info!("{}: {} files", folder.name, folder.files.len());
            let bar = self.progress.folder_bar(&folder.name, folder.files.len());
            match &pool {
                None => {
                    for file in &folder.files {
                        self.run_file(file, &report, &bar);
                    }
                }
                Some(pool) => self.fan_out(pool, folder, &report, &bar),
            }
            bar.finish_and_clear();
        }

        let mut report = report.into_inner().unwrap();
        report.completed.sort_by(|a, b| a.path.cmp(&b.path));
        report.failed.sort();
        if report.skipped > 0 {
            log::warn!("Stop requested: {} files not started", report.skipped);
        }
        Ok(report)
    }

    fn fan_out(
        &self,
        pool: &rayon::ThreadPool,
        folder: &SnapshotFolder,
        report: &Mutex<WalkReport>,
        bar: &ProgressBar,
    ) {
        let queue: WorkQueue<&Path> = folder.files.iter().map(PathBuf::as_path).collect();
        let workers = self.config.workers.max(1).min(queue.len());
        // returns once every file of the folder is done
        pool.scope(|s| {
            for _ in 0..workers {
                s.spawn(|_| {
                    while let Some(file) = queue.next() {
                        self.run_file(file, report, bar);
                    }
                });
            }
        });
    }

    fn run_file(&self, file: &Path, report: &Mutex<WalkReport>, bar: &ProgressBar) {
        if is_shutdown_requested() {
            report.lock().unwrap().skipped += 1;
            return;
        }
        let result = self.process_file(file);
        bar.inc(1);
        report.lock().unwrap().record(file, result);
    }

    /// Run decode → batch → submit over one file.
    pub fn process_file(&self, path: &Path) -> Result<FileStats, FileError> {
        let start = Instant::now();
        let label = file_label(path);
        let mut decoder = RecordDecoder::open(path, self.record_type.config(), self.index.clone())?;
        let counter = decoder.byte_counter();
        let pb = self.progress.file_bar(&label, decoder.total_bytes());

        let submitter = BulkSubmitter::new(self.backend, self.config.submit);
        let mut acc = BatchAccumulator::new(self.config.batch_size);
        let mut indexed = 0;
        let mut rejected = 0;
        let mut batch_no = 0;

        let drained = drain_batches(
            decoder.by_ref().map(|r| r.map_err(FileError::from)),
            &mut acc,
            |batch| {
                batch_no += 1;
                let batch_label = format!("{label} batch {batch_no}");
                let report = submitter.submit(&batch, &batch_label)?;
                indexed += report.indexed;
                rejected += report.rejected();
                pb.set_position(counter.load(Ordering::Relaxed));
                log::info!(
                    "{batch_label}: {}/{} indexed in {} chunks ({:.2}s)",
                    report.indexed,
                    report.attempted,
                    report.chunks,
                    report.elapsed.as_secs_f64()
                );
                Ok(())
            },
        );
        pb.finish_and_clear();
        let drained = drained?;

        let stats = decoder.stats();
        Ok(FileStats {
            path: path.to_path_buf(),
            lines_read: stats.lines_read,
            emitted: stats.emitted,
            dropped: stats.dropped,
            batches: drained.batches,
            indexed,
            rejected,
            elapsed: start.elapsed(),
        })
    }
}
