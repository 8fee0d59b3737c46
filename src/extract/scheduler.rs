//! Self-replenishing offset queue for one entity kind's worker pool.
//!
//! The scheduler seeds one starting offset per worker stripe and is then fed
//! by the workers themselves: a full page at `offset` re-enqueues
//! `offset + limit * workers`, so stripe *i* visits exactly
//! `{i*L, i*L + N*L, i*L + 2*N*L, ...}` — a partition of the offset space
//! with no overlap and no gaps.
//!
//! # Termination
//!
//! Each stripe stays live until a partial page (or cancellation) ends it.
//! The live-stripe count, not queue emptiness, is the termination signal:
//! the decrement that reaches zero closes the internal semaphore, waking
//! every worker blocked in [`next`](OffsetScheduler::next). Re-enqueues only
//! ever come from a live stripe, so no push can race the close.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::debug;

/// Multi-producer/multi-consumer queue of pending page offsets.
///
/// Mutated only by its own kind's workers; never shared across entity kinds.
#[derive(Debug)]
pub struct OffsetScheduler {
    /// Pending offsets, FIFO by arrival.
    queue: Mutex<VecDeque<u64>>,
    /// One permit per queued offset; closed when the last stripe ends.
    pending: Semaphore,
    /// Stripes that have not yet seen their terminal page.
    live_stripes: AtomicUsize,
    /// Distance between consecutive offsets of one stripe (`limit * workers`).
    stride: u64,
}

impl OffsetScheduler {
    /// Creates a scheduler seeded with one starting offset per worker:
    /// `0, L, 2L, ..., (N-1)*L`.
    ///
    /// # Panics
    ///
    /// Panics if `workers` or `page_limit` is zero.
    #[must_use]
    pub fn new(workers: usize, page_limit: usize) -> Self {
        assert!(workers > 0, "scheduler requires at least one worker stripe");
        assert!(page_limit > 0, "page limit must be positive");

        let queue: VecDeque<u64> = (0..workers as u64)
            .map(|i| i * page_limit as u64)
            .collect();
        let seeded = queue.len();

        Self {
            queue: Mutex::new(queue),
            pending: Semaphore::new(seeded),
            live_stripes: AtomicUsize::new(workers),
            stride: (page_limit * workers) as u64,
        }
    }

    /// Returns the stripe stride: the offset distance to the next page of
    /// the same stripe.
    #[must_use]
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Returns the number of stripes that have not yet terminated.
    #[must_use]
    pub fn live_stripes(&self) -> usize {
        self.live_stripes.load(Ordering::SeqCst)
    }

    /// Takes the next pending offset, waiting while the queue is empty but
    /// stripes remain live.
    ///
    /// Returns `None` once every stripe has terminated and the queue has
    /// drained — the exhaustion signal for this entity kind.
    pub async fn next(&self) -> Option<u64> {
        match self.pending.acquire().await {
            Ok(permit) => {
                permit.forget();
                self.pop()
            }
            // Closed: every stripe has terminated, and a terminated stripe
            // never left an offset behind, so there is nothing to drain.
            // Handing out a leftover here would let a worker retire a stripe
            // that was never live.
            Err(_) => None,
        }
    }

    /// Enqueues the next offset of a live stripe.
    pub fn push(&self, offset: u64) {
        self.lock_queue().push_back(offset);
        self.pending.add_permits(1);
    }

    /// Records that one stripe reached its terminal page.
    ///
    /// The call that retires the last live stripe closes the queue, waking
    /// every worker blocked in [`next`](Self::next).
    pub fn complete_stripe(&self) {
        let previous = self.live_stripes.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "stripe completed more times than seeded");
        if previous == 1 {
            debug!("last stripe terminated; closing offset queue");
            self.pending.close();
        }
    }

    fn pop(&self) -> Option<u64> {
        self.lock_queue().pop_front()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<u64>> {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
