//! Admission & Queue (spec §4.1, C1): a bounded semaphore gate with a
//! bounded queue wait. Two independent gates exist in the running process —
//! one for analyses, one for browser test runs — each with capacity 1 by
//! default (spec §5 shared-resource policy), chosen because a single
//! headless session can peak at 400+ MiB under software WebGL.
//!
//! This crate owns only the gate primitive. Persisting the `queued` row,
//! moving it to `running` on acquisition, and handing off to the
//! supervisor are the caller's job (the `cli` child-process entrypoint),
//! so this stays a narrow wrapper around `tokio::sync::Semaphore` rather
//! than absorbing unrelated orchestration.

use std::sync::Arc;
use std::time::Duration;

use qa_core::AgentError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Recommended bound on how long a request waits for a slot before the
/// caller gives up and fails the analysis with "queued too long" (spec
/// §4.1).
pub const DEFAULT_QUEUE_WAIT: Duration = Duration::from_secs(5 * 60);

/// A bounded admission gate. Clone is cheap (shares the underlying
/// semaphore), so one instance can be held by the admission loop and
/// handed to every newly accepted request.
#[derive(Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots not currently held. Not authoritative under
    /// contention (another waiter may win the race right after this
    /// returns) — diagnostic only.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits up to `queue_wait` for a slot. On success the caller holds the
    /// permit for the lifetime of the admitted work (drop it to release the
    /// slot). On timeout returns `AgentError::QueueTimeout` (spec §4.1,
    /// §7 `queue_timeout`), which the caller surfaces as the analysis's
    /// "queued too long" failure message.
    pub async fn acquire_within(&self, queue_wait: Duration) -> Result<OwnedSemaphorePermit, AgentError> {
        match tokio::time::timeout(queue_wait, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(AgentError::QueueTimeout),
            Err(_) => Err(AgentError::QueueTimeout),
        }
    }

    /// Convenience for the common case (spec §4.1 recommends 5 minutes).
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AgentError> {
        self.acquire_within(DEFAULT_QUEUE_WAIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn second_acquire_waits_for_the_first_to_drop() {
        let gate = AdmissionGate::new(1);
        let first = gate.acquire_within(Duration::from_secs(1)).await.unwrap();
        assert_eq!(gate.available_permits(), 0);

        let gate2 = gate.clone();
        let waiter = tokio::spawn(async move { gate2.acquire_within(Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first);

        let second = waiter.await.unwrap();
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn queue_wait_timeout_surfaces_queue_timeout_error() {
        let gate = AdmissionGate::new(1);
        let _held = gate.acquire_within(Duration::from_secs(5)).await.unwrap();
        let result = gate.acquire_within(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(AgentError::QueueTimeout)));
    }

    #[tokio::test]
    async fn capacity_one_admits_exactly_one_concurrently() {
        let gate = AdmissionGate::new(1);
        assert_eq!(gate.capacity(), 1);
        let permit = gate.acquire_within(Duration::from_millis(50)).await.unwrap();
        assert_eq!(gate.available_permits(), 0);
        drop(permit);
        assert_eq!(gate.available_permits(), 1);
    }
}
