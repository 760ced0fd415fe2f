//! Per-source execution lanes.
//!
//! The [`PriorityScheduler`] is the fairness layer above the hard cap
//! enforced by [`AdmissionLimiter`](crate::limiter::AdmissionLimiter):
//! page-image work and listing work enter separate lanes, and the pages
//! lane is capped at the source's connection budget. A chapter fanning out
//! dozens of page downloads therefore queues at most `capacity` waiters
//! ahead of any listing acquisition in the limiter's FIFO, which bounds how
//! long metadata listing can be delayed. The limiter stays the safety net;
//! the lanes only decide who gets to line up.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Parallel width of the listing lane.
const LISTING_LANE_WIDTH: usize = 2;

/// Work classification for lane selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    /// Series, chapter and page-list fetches
    Listing,
    /// Page image fetches
    Pages,
}

/// Per-source pair of bounded execution lanes
#[derive(Clone)]
pub struct PriorityScheduler {
    listing: Arc<Semaphore>,
    pages: Arc<Semaphore>,
    pages_width: usize,
}

impl PriorityScheduler {
    /// Create a scheduler whose pages lane admits `max_connections`
    /// concurrent page downloads (minimum 1).
    pub fn new(max_connections: usize) -> Self {
        let pages_width = max_connections.max(1);
        Self {
            listing: Arc::new(Semaphore::new(LISTING_LANE_WIDTH)),
            pages: Arc::new(Semaphore::new(pages_width)),
            pages_width,
        }
    }

    /// Enter a lane, waiting for a slot; cancellation abandons the wait.
    ///
    /// The returned [`LaneSlot`] frees the lane when dropped.
    pub async fn enter(&self, lane: Lane, token: &CancellationToken) -> Result<LaneSlot> {
        let semaphore = match lane {
            Lane::Listing => &self.listing,
            Lane::Pages => &self.pages,
        };
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            slot = Arc::clone(semaphore).acquire_owned() => {
                let slot = slot.map_err(|_| Error::Cancelled)?;
                Ok(LaneSlot { _slot: slot })
            }
        }
    }

    /// Width of the pages lane (the source's connection cap).
    pub fn pages_width(&self) -> usize {
        self.pages_width
    }
}

/// RAII occupation of one lane slot
pub struct LaneSlot {
    _slot: OwnedSemaphorePermit,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn pages_lane_caps_concurrency_at_connection_budget() {
        let scheduler = PriorityScheduler::new(2);
        let token = CancellationToken::new();
        let in_lane = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..12 {
            let scheduler = scheduler.clone();
            let token = token.clone();
            let in_lane = Arc::clone(&in_lane);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _slot = scheduler.enter(Lane::Pages, &token).await.unwrap();
                let now = in_lane.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_lane.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn listing_lane_is_open_while_pages_lane_is_saturated() {
        let scheduler = PriorityScheduler::new(1);
        let token = CancellationToken::new();

        let _page_slot = scheduler.enter(Lane::Pages, &token).await.unwrap();

        // Listing work must not queue behind the saturated pages lane
        let listing_slot = tokio::time::timeout(
            Duration::from_millis(50),
            scheduler.enter(Lane::Listing, &token),
        )
        .await;
        assert!(
            listing_slot.is_ok(),
            "listing lane starved by page-image work"
        );
    }

    #[tokio::test]
    async fn lane_entry_observes_cancellation() {
        let scheduler = PriorityScheduler::new(1);
        let token = CancellationToken::new();
        let _held = scheduler.enter(Lane::Pages, &token).await.unwrap();

        token.cancel();
        let outcome = scheduler.enter(Lane::Pages, &token).await;
        assert!(matches!(outcome, Err(Error::Cancelled)));
    }
}
