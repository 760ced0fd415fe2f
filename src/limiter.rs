//! Admission control for network operations.
//!
//! Two gates live here:
//!
//! - [`AdmissionLimiter`] — the per-source permit pool. Every network
//!   operation bound to a source (series listing, chapter listing, page
//!   listing, page images) must hold a permit while its I/O is in flight.
//!   All granularities draw from the same pool, so heavy page-image traffic
//!   on a source directly throttles how fast that source's metadata can be
//!   re-listed.
//! - [`PagePhaseGate`] — a process-wide, source-independent gate bounding
//!   how many tasks are simultaneously in their page phase.
//!
//! Both hand out RAII guards: release happens exactly once per successful
//! acquisition on every exit path, success, failure or cancellation.
//! Acquisition never times out on its own; the cancellation token is the
//! only way to abandon a pending acquisition.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Per-source bounded permit pool shared by every kind of network call the
/// source performs.
#[derive(Clone)]
pub struct AdmissionLimiter {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionLimiter {
    /// Create a limiter with the given connection budget (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit, abandoning the wait only if `token` is cancelled.
    ///
    /// The returned [`AdmissionPermit`] releases the permit when dropped.
    /// Permits are granted in FIFO order, so a listing operation queued
    /// behind page-image traffic is served as soon as an in-flight
    /// operation completes.
    pub async fn acquire(&self, token: &CancellationToken) -> Result<AdmissionPermit> {
        tokio::select! {
            // A pending cancellation wins even when a permit is free
            biased;
            () = token.cancelled() => {
                tracing::debug!("admission acquire abandoned by cancellation");
                Err(Error::Cancelled)
            }
            permit = Arc::clone(&self.permits).acquire_owned() => {
                // The semaphore is never closed while the limiter exists
                let permit = permit.map_err(|_| Error::Cancelled)?;
                Ok(AdmissionPermit { _permit: permit })
            }
        }
    }

    /// The configured connection budget.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free (capacity minus in-flight operations).
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// RAII guard for one unit of a source's connection budget.
///
/// Dropping the guard returns the permit; there is no other way to release
/// it, which rules out double-release and leaked permits.
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Process-wide gate bounding how many tasks run their page phase at once.
///
/// Distinct from [`AdmissionLimiter`]: this counts tasks, not connections,
/// and is shared across all sources.
#[derive(Clone)]
pub struct PagePhaseGate {
    slots: Arc<Semaphore>,
}

impl PagePhaseGate {
    /// Create a gate admitting `width` tasks at once (minimum 1).
    pub fn new(width: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(width.max(1))),
        }
    }

    /// Register a task as beginning its page phase.
    ///
    /// If `token` is cancelled while waiting, the registration is abandoned
    /// and `Cancelled` is returned; the caller finalizes as aborted without
    /// attempting any page.
    pub async fn register(&self, token: &CancellationToken) -> Result<PagePhaseSlot> {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!("page-phase registration abandoned by cancellation");
                Err(Error::Cancelled)
            }
            slot = Arc::clone(&self.slots).acquire_owned() => {
                let slot = slot.map_err(|_| Error::Cancelled)?;
                Ok(PagePhaseSlot { _slot: slot })
            }
        }
    }
}

/// RAII registration in the page phase; dropping it releases the slot.
pub struct PagePhaseSlot {
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
    async fn permits_never_exceed_capacity_under_concurrent_load() {
        let limiter = AdmissionLimiter::new(3);
        let token = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            let token = token.clone();
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = limiter.acquire(&token).await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(
            peak.load(Ordering::SeqCst) <= 3,
            "peak concurrency {} exceeded capacity 3",
            peak.load(Ordering::SeqCst)
        );
        assert_eq!(limiter.available(), 3, "all permits returned");
    }

    #[tokio::test]
    async fn permit_released_when_guarded_work_fails() {
        let limiter = AdmissionLimiter::new(1);
        let token = CancellationToken::new();

        let result: Result<()> = async {
            let _permit = limiter.acquire(&token).await?;
            Err(Error::Cancelled)
        }
        .await;
        assert!(result.is_err());

        // The failed operation must not leak its permit
        assert_eq!(limiter.available(), 1);
        let _again = limiter.acquire(&token).await.unwrap();
    }

    #[tokio::test]
    async fn pending_acquire_is_abandoned_on_cancellation() {
        let limiter = AdmissionLimiter::new(1);
        let token = CancellationToken::new();

        let held = limiter.acquire(&token).await.unwrap();

        let waiter = {
            let limiter = limiter.clone();
            let token = token.clone();
            tokio::spawn(async move { limiter.acquire(&token).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        let outcome = waiter.await.unwrap();
        assert!(
            matches!(outcome, Err(Error::Cancelled)),
            "waiter must observe cancellation, got {outcome:?}"
        );
        drop(held);
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped_to_one() {
        let limiter = AdmissionLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        let token = CancellationToken::new();
        let _permit = limiter.acquire(&token).await.unwrap();
    }

    #[tokio::test]
    async fn page_phase_gate_bounds_registrations() {
        let gate = PagePhaseGate::new(1);
        let token = CancellationToken::new();

        let first = gate.register(&token).await.unwrap();

        let second = {
            let gate = gate.clone();
            let token = token.clone();
            tokio::spawn(async move { gate.register(&token).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!second.is_finished(), "second registration must wait");

        drop(first);
        let slot = second.await.unwrap();
        assert!(slot.is_ok());
    }

    #[tokio::test]
    async fn page_phase_registration_observes_cancellation() {
        let gate = PagePhaseGate::new(1);
        let token = CancellationToken::new();
        let _held = gate.register(&token).await.unwrap();

        token.cancel();
        let outcome = gate.register(&token).await;
        assert!(matches!(outcome, Err(Error::Cancelled)));
    }
}
