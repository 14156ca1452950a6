//! Prefetch Queue — Background Production over a Bounded Channel
//!
//! Decouples a producer's pacing from its consumer's by running the producer
//! on its own task and streaming items through a bounded channel:
//!
//! ```text
//! RecordSource ─→ worker task ─→ [bounded mpsc, 16] ─→ PrefetchStream::next()
//! ```
//!
//! The channel bound is the only synchronization: a full channel blocks the
//! worker (backpressure), an empty one blocks the consumer (wake-up). After
//! the source finishes or fails, the worker sends exactly one terminal
//! message, so the consumer always terminates instead of blocking forever.
//!
//! Producer failures are delivered to the consumer as an error before the
//! stream ends — exhaustion and failure are distinguishable. Dropping the
//! stream mid-iteration aborts the worker task; a worker blocked on a full
//! channel observes the closed channel and stops as well.
//!
//! ## Usage
//!
//! ```ignore
//! use splitbin_storage::{Dataset, Prefetcher, ScanOptions};
//!
//! let dataset = Dataset::new("/data/train");
//! let prefetcher = Prefetcher::new(move || {
//!     dataset.scan_binwise(ScanOptions { shuffle: true, seed: None })
//! });
//!
//! let mut stream = prefetcher.start();
//! while let Some(record) = stream.next().await {
//!     train_step(record?);
//! }
//!
//! // Each start() spawns a fresh worker with fresh state.
//! let mut second_epoch = prefetcher.start();
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use splitbin_core::error::{Error, Result};

use crate::source::RecordSource;

/// Default bound of the prefetch channel.
pub const QUEUE_DEPTH: usize = 16;

/// Messages from the worker to the consumer. `Finished` and `Failed` are
/// terminal: the worker sends one of them exactly once, last.
enum Feed<T> {
    Item(T),
    Finished,
    Failed(Error),
}

/// Runs a [`RecordSource`] on a background task, streaming its items
/// through a bounded channel.
///
/// Construction does no work; every [`start`](Prefetcher::start) call
/// builds a fresh source, worker and channel.
pub struct Prefetcher<F> {
    make_source: F,
    depth: usize,
}

impl<F, S> Prefetcher<F>
where
    F: Fn() -> S,
    S: RecordSource + 'static,
    S::Item: 'static,
{
    pub fn new(make_source: F) -> Self {
        Self {
            make_source,
            depth: QUEUE_DEPTH,
        }
    }

    /// Override the channel bound (must be nonzero).
    pub fn with_depth(mut self, depth: usize) -> Self {
        assert!(depth > 0, "prefetch queue depth must be nonzero");
        self.depth = depth;
        self
    }

    /// Spawn a worker driving a fresh source, and return its consumer half.
    pub fn start(&self) -> PrefetchStream<S::Item> {
        let (tx, rx) = mpsc::channel(self.depth);
        let mut source = (self.make_source)();

        let worker = tokio::spawn(async move {
            loop {
                match source.try_next().await {
                    Ok(Some(item)) => {
                        // Send fails only when the consumer is gone.
                        if tx.send(Feed::Item(item)).await.is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.send(Feed::Finished).await;
                        return;
                    }
                    Err(e) => {
                        warn!(error = %e, "record source failed mid-stream");
                        let _ = tx.send(Feed::Failed(e)).await;
                        return;
                    }
                }
            }
        });

        PrefetchStream {
            rx,
            worker: Some(worker),
            terminated: false,
        }
    }
}

/// Consumer half of a running prefetch pipeline.
pub struct PrefetchStream<T> {
    rx: mpsc::Receiver<Feed<T>>,
    worker: Option<JoinHandle<()>>,
    terminated: bool,
}

impl<T> PrefetchStream<T> {
    /// Next prefetched item, blocking until the worker has one.
    ///
    /// Returns `None` once the producer has finished or failed; a failure is
    /// delivered once as `Some(Err(_))` before the stream ends.
    pub async fn next(&mut self) -> Option<Result<T>> {
        if self.terminated {
            return None;
        }
        match self.rx.recv().await {
            Some(Feed::Item(item)) => Some(Ok(item)),
            Some(Feed::Finished) | None => {
                self.finish();
                None
            }
            Some(Feed::Failed(e)) => {
                self.finish();
                Some(Err(e))
            }
        }
    }

    /// Drain every remaining item, failing on a producer error.
    pub async fn collect(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(next) = self.next().await {
            items.push(next?);
        }
        Ok(items)
    }

    fn finish(&mut self) {
        self.terminated = true;
        // The worker returned before sending its terminal message.
        self.worker.take();
    }
}

impl<T> Drop for PrefetchStream<T> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IterSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_drained_stream_matches_direct_iteration() {
        let prefetcher = Prefetcher::new(|| IterSource::new(0..1000u32));
        let items = prefetcher.start().collect().await.unwrap();
        let direct: Vec<u32> = (0..1000).collect();
        assert_eq!(items, direct);
    }

    #[tokio::test]
    async fn test_depth_one_still_delivers_everything() {
        let prefetcher = Prefetcher::new(|| IterSource::new(0..100u32)).with_depth(1);
        let items = prefetcher.start().collect().await.unwrap();
        assert_eq!(items.len(), 100);
    }

    #[tokio::test]
    async fn test_empty_source_terminates_immediately() {
        let prefetcher = Prefetcher::new(|| IterSource::new(std::iter::empty::<u32>()));
        let mut stream = prefetcher.start();
        assert!(stream.next().await.is_none());
        // Terminal state is sticky.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_restart_produces_fresh_sequence() {
        let prefetcher = Prefetcher::new(|| IterSource::new(0..10u32));
        let first = prefetcher.start().collect().await.unwrap();
        let second = prefetcher.start().collect().await.unwrap();
        assert_eq!(first, second);
    }

    /// Source that yields `ok` items and then fails.
    struct FailingSource {
        remaining: u32,
    }

    #[async_trait]
    impl RecordSource for FailingSource {
        type Item = u32;

        async fn try_next(&mut self) -> Result<Option<u32>> {
            if self.remaining == 0 {
                return Err(std::io::Error::other("producer exploded").into());
            }
            self.remaining -= 1;
            Ok(Some(self.remaining))
        }
    }

    #[tokio::test]
    async fn test_producer_failure_is_delivered_then_stream_ends() {
        let prefetcher = Prefetcher::new(|| FailingSource { remaining: 3 });
        let mut stream = prefetcher.start();

        for _ in 0..3 {
            assert!(stream.next().await.unwrap().is_ok());
        }
        let failure = stream.next().await.unwrap();
        assert!(matches!(failure, Err(Error::Io(_))));
        assert!(stream.next().await.is_none());
    }

    /// Endless source counting how many items it has produced.
    struct CountingSource {
        produced: Arc<AtomicUsize>,
        delay: Duration,
    }

    #[async_trait]
    impl RecordSource for CountingSource {
        type Item = usize;

        async fn try_next(&mut self) -> Result<Option<usize>> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(Some(self.produced.fetch_add(1, Ordering::SeqCst)))
        }
    }

    #[tokio::test]
    async fn test_full_channel_applies_backpressure() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let prefetcher = Prefetcher::new(move || CountingSource {
            produced: counter.clone(),
            delay: Duration::ZERO,
        })
        .with_depth(4);

        let mut stream = prefetcher.start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Unconsumed: the worker fills the channel and blocks. It can be at
        // most one produced-but-unsent item ahead of the bound.
        let idle = produced.load(Ordering::SeqCst);
        assert!(idle <= 5, "worker ran ahead of the channel bound: {idle}");

        assert!(stream.next().await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_worker() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let prefetcher = Prefetcher::new(move || CountingSource {
            produced: counter.clone(),
            delay: Duration::from_millis(1),
        })
        .with_depth(2);

        let mut stream = prefetcher.start();
        assert!(stream.next().await.unwrap().is_ok());
        drop(stream);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let settled = produced.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            settled,
            produced.load(Ordering::SeqCst),
            "worker kept producing after the stream was dropped"
        );
    }
}
