//! oaindex core - shared plumbing for snapshot ingestion
//!
//! Gzip line readers, batching, work distribution, retry, logging
//! and progress reporting used by the ingestion pipeline.

pub mod accumulator;
pub mod gzip;
pub mod logging;
pub mod progress;
pub mod retry;
pub mod shutdown;
pub mod work_queue;

// Re-exports for convenience
pub use accumulator::{BatchAccumulator, DEFAULT_BATCH_SIZE, DrainStats, drain_batches};
pub use gzip::{ByteCounter, GzipReader, open_gzip_file};
pub use logging::{IndicatifLogger, LogTarget, init_logging};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use retry::{Retryable, retry_with_backoff};
pub use shutdown::{install_signal_handlers, is_shutdown_requested};
pub use work_queue::WorkQueue;
