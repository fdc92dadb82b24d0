//! Concurrency cap for in-flight inference calls.

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Caps how many inference calls run at once.
///
/// Waiters are served in FIFO order, so every waiter proceeds once earlier
/// holders release. A slot is held by a [`CallPermit`] and returned when the
/// permit drops, on success, error and panic alike.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct CallPermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    ///
    /// Fails only if the limiter was closed.
    pub async fn acquire(&self) -> Result<CallPermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        Ok(CallPermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let limiter = ConcurrencyLimiter::new(2);
        assert_eq!(limiter.available(), 2);

        let first = limiter.acquire().await.unwrap();
        let _second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.in_flight(), 2);

        drop(first);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let limiter = ConcurrencyLimiter::new(0);
        assert_eq!(limiter.capacity(), 1);
        assert!(limiter.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_permit_released_when_task_fails() {
        let limiter = ConcurrencyLimiter::new(1);

        let task_limiter = limiter.clone();
        let result = tokio::spawn(async move {
            let _permit = task_limiter.acquire().await.unwrap();
            Err::<(), &str>("call failed")
        })
        .await
        .unwrap();

        assert!(result.is_err());
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_capacity() {
        let limiter = ConcurrencyLimiter::new(3);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..20u64 {
            let limiter = limiter.clone();
            let current = current.clone();
            let peak = peak.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire().await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10 + i % 4)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            });
        }
        while tasks.join_next().await.is_some() {}

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.available(), 3);
    }
}
