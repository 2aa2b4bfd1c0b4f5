//! Fixed-size batch accumulator and a generic drain loop over fallible items

/// Default number of items per flushed batch.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Buffers items and hands them out in batches of at most `capacity`.
///
/// Arrival order is preserved within and across batches.
#[derive(Debug)]
pub struct BatchAccumulator<T> {
    buf: Vec<T>,
    capacity: usize,
}

impl<T> BatchAccumulator<T> {
    /// Create an accumulator flushing every `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an item; returns a full batch once the threshold is reached.
    pub fn push(&mut self, item: T) -> Option<Vec<T>> {
        self.buf.push(item);
        if self.is_full() {
            Some(self.take_batch())
        } else {
            None
        }
    }

    /// Number of items currently buffered
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take buffered items, resetting internal state
    pub fn take_batch(&mut self) -> Vec<T> {
        std::mem::replace(&mut self.buf, Vec::with_capacity(self.capacity))
    }

    /// Take the trailing, possibly undersized batch (None when nothing is buffered)
    pub fn finish(&mut self) -> Option<Vec<T>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take_batch())
        }
    }
}

/// Statistics from draining a stream through an accumulator
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub items: usize,
    pub batches: usize,
}

/// Pull items from `items`, accumulate them, and hand each batch to `flush`.
///
/// Stops at the first error from either the stream or `flush`. The trailing
/// batch is flushed at end-of-stream. `flush` blocks the loop until it
/// returns, so at most one batch is in flight per caller.
pub fn drain_batches<T, E>(
    items: impl IntoIterator<Item = Result<T, E>>,
    acc: &mut BatchAccumulator<T>,
    mut flush: impl FnMut(Vec<T>) -> Result<(), E>,
) -> Result<DrainStats, E> {
    let mut stats = DrainStats::default();
    for item in items {
        let item = item?;
        stats.items += 1;
        if let Some(batch) = acc.push(item) {
            stats.batches += 1;
            flush(batch)?;
        }
    }
    if let Some(batch) = acc.finish() {
        stats.batches += 1;
        flush(batch)?;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(n: usize, capacity: usize) -> Vec<usize> {
        let mut acc = BatchAccumulator::new(capacity);
        let mut out = Vec::new();
        let items = (0..n).map(Ok::<_, ()>);
        drain_batches(items, &mut acc, |b| {
            out.push(b.len());
            Ok(())
        })
        .unwrap();
        out
    }

    #[test]
    fn batch_count_is_ceil() {
        assert_eq!(sizes(10, 3), vec![3, 3, 3, 1]);
        assert_eq!(sizes(9, 3), vec![3, 3, 3]);
        assert_eq!(sizes(2, 5), vec![2]);
    }

    #[test]
    fn empty_stream_flushes_nothing() {
        assert!(sizes(0, 4).is_empty());
    }

    #[test]
    fn preserves_order() {
        let mut acc = BatchAccumulator::new(2);
        let mut seen = Vec::new();
        drain_batches((1..=5).map(Ok::<_, ()>), &mut acc, |b| {
            seen.extend(b);
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn zero_capacity_clamped() {
        let mut acc = BatchAccumulator::new(0);
        assert_eq!(acc.capacity(), 1);
        assert_eq!(acc.push('a'), Some(vec!['a']));
    }

    #[test]
    fn stream_error_stops_before_flush() {
        let mut acc = BatchAccumulator::new(10);
        let mut flushed = 0;
        let items = vec![Ok(1), Err("bad line"), Ok(3)];
        let res = drain_batches(items, &mut acc, |_| {
            flushed += 1;
            Ok(())
        });
        assert_eq!(res, Err("bad line"));
        assert_eq!(flushed, 0);
    }

    #[test]
    fn stats_report_items_and_batches() {
        let mut acc = BatchAccumulator::new(4);
        let stats = drain_batches((0..9).map(Ok::<_, ()>), &mut acc, |_| Ok(())).unwrap();
        assert_eq!(stats, DrainStats { items: 9, batches: 3 });
    }
}
