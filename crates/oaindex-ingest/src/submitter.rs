//! Concurrent bulk submission of one batch
//!
//! A batch is cut into chunks of `chunk_size` actions. A producer feeds the
//! chunks through a queue bounded at `queue_size` to `thread_count` workers,
//! each issuing one bulk request per chunk. `submit` returns only after every
//! chunk has been answered, so at most one batch per caller is in flight.

use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use oaindex_core::retry_with_backoff;

use crate::backend::{BackendError, ItemOutcome, SearchBackend};
use crate::decoder::IndexAction;

/// Bulk-write tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitConfig {
    /// Actions per bulk request
    pub chunk_size: usize,
    /// Concurrent bulk requests
    pub thread_count: usize,
    /// Chunks queued ahead of the workers
    pub queue_size: usize,
    /// Extra attempts per chunk on retryable errors
    pub max_retries: u32,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5_000,
            thread_count: 4,
            queue_size: 4,
            max_retries: 0,
        }
    }
}

/// Outcome of submitting one batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub indexed: usize,
    /// Rejected items with the backend's reason
    pub failures: Vec<ItemOutcome>,
    pub chunks: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn rejected(&self) -> usize {
        self.failures.len()
    }
}

type ChunkResult = (usize, Result<Vec<ItemOutcome>, BackendError>);

pub struct BulkSubmitter<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
    config: SubmitConfig,
}

impl<'a, B: SearchBackend + ?Sized> BulkSubmitter<'a, B> {
    pub fn new(backend: &'a B, config: SubmitConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &SubmitConfig {
        &self.config
    }

    fn send_chunk(&self, label: &str, idx: usize, chunk: &[IndexAction]) -> ChunkResult {
        let label = format!("{label} chunk {idx}");
        let result = retry_with_backoff(&label, self.config.max_retries, || {
            self.backend.bulk(chunk)
        });
        (idx, result)
    }

    /// Submit every action of `batch` and wait for all of them.
    ///
    /// Rejected items never stop sibling chunks. A chunk whose request fails
    /// as a whole (after retries) makes the call return that error, but only
    /// once all other chunks have been attempted.
    pub fn submit(&self, batch: &[IndexAction], label: &str) -> Result<BatchReport, BackendError> {
        let start = Instant::now();
        let chunks: Vec<&[IndexAction]> = batch.chunks(self.config.chunk_size.max(1)).collect();
        let workers = self.config.thread_count.max(1).min(chunks.len());

        let mut results: Vec<ChunkResult> = if workers <= 1 {
            chunks
                .iter()
                .enumerate()
                .map(|(idx, chunk)| self.send_chunk(label, idx, chunk))
                .collect()
        } else {
            let (tx, rx) = mpsc::sync_channel::<(usize, &[IndexAction])>(self.config.queue_size.max(1));
            let rx = Mutex::new(rx);
            let collected: Mutex<Vec<ChunkResult>> = Mutex::new(Vec::with_capacity(chunks.len()));

            thread::scope(|s| {
                for _ in 0..workers {
                    s.spawn(|| {
                        loop {
                            // lock released before the request goes out
                            let next = rx.lock().unwrap().recv();
                            let Ok((idx, chunk)) = next else { break };
                            let result = self.send_chunk(label, idx, chunk);
                            collected.lock().unwrap().push(result);
                        }
                    });
                }
                for (idx, chunk) in chunks.iter().copied().enumerate() {
                    if tx.send((idx, chunk)).is_err() {
                        break;
                    }
                }
                drop(tx);
            });
            collected.into_inner().unwrap()
        };
        results.sort_by_key(|(idx, _)| *idx);

        let mut report = BatchReport {
            attempted: batch.len(),
            chunks: chunks.len(),
            ..Default::default()
        };
        let mut first_error = None;
        for (idx, result) in results {
            match result {
                Ok(outcomes) => {
                    for outcome in outcomes {
                        if outcome.is_ok() {
                            report.indexed += 1;
                        } else {
                            log_failure(label, &outcome);
                            report.failures.push(outcome);
                        }
                    }
                }
                Err(e) => {
                    log::error!("{label}: chunk {idx} failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        report.elapsed = start.elapsed();

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

fn log_failure(label: &str, outcome: &ItemOutcome) {
    match &outcome.error {
        Some(err) => log::warn!(
            "{label}: {} rejected ({}): {}: {}",
            outcome.id,
            outcome.status,
            err.kind,
            err.reason
        ),
        None => log::warn!("{label}: {} rejected ({})", outcome.id, outcome.status),
    }
}
