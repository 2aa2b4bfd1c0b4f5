//! Retry with exponential backoff for backend calls

use std::fmt::Display;
use std::time::Duration;

/// Errors that can tell whether another attempt might succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff: 2^attempt seconds (2s, 4s, 8s, ...)
pub const fn backoff_duration(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}

/// Retry a fallible operation with exponential backoff.
///
/// Retryable errors are retried up to `max_retries` times; `max_retries = 0`
/// makes exactly one attempt. Returns the first `Ok`, or the final `Err` on
/// exhaustion / non-retryable error.
pub fn retry_with_backoff<T, E: Retryable + Display>(
    label: &str,
    max_retries: u32,
    mut attempt_fn: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_retries && e.is_retryable() => {
                attempt += 1;
                log::warn!("{label}: attempt {attempt}/{max_retries} failed: {e}, retrying...");
                std::thread::sleep(backoff_duration(attempt));
            }
            Err(e) => {
                if max_retries > 0 {
                    log::error!("{label}: failed permanently: {e}");
                }
                return Err(e);
            }
        }
    }
}
