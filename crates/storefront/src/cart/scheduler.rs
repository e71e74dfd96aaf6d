//! Trailing-edge debounce for cart writes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::AbortHandle;

/// Owns at most one pending write timer.
///
/// Every [`WriteScheduler::schedule`] restarts the quiet interval; the flush
/// runs only once no new schedule arrives for `delay`. A flush that has
/// started is never aborted by a later `schedule` or `cancel`; those only
/// affect the timer that has not fired yet.
#[derive(Debug)]
pub struct WriteScheduler {
    delay: Duration,
    pending: Arc<Mutex<Option<PendingTimer>>>,
    tokens: AtomicU64,
}

#[derive(Debug)]
struct PendingTimer {
    token: u64,
    handle: AbortHandle,
}

impl WriteScheduler {
    /// A scheduler with the given quiet interval.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
            tokens: AtomicU64::new(0),
        }
    }

    /// The quiet interval.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Restart the timer; `flush` runs when it fires.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, flush: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = self.tokens.fetch_add(1, Ordering::Relaxed);
        let delay = self.delay;
        let pending = Arc::clone(&self.pending);

        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            previous.handle.abort();
        }

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let claimed = {
                let mut slot = pending.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().is_some_and(|timer| timer.token == token) {
                    *slot = None;
                    true
                } else {
                    false
                }
            };
            if claimed {
                flush().await;
            }
        });

        *slot = Some(PendingTimer {
            token,
            handle: task.abort_handle(),
        });
    }

    /// Drop the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        slot.take().is_some_and(|timer| {
            timer.handle.abort();
            true
        })
    }

    /// Whether a timer is waiting to fire.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for WriteScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::future::Ready<()> + Clone) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        let bump = move || {
            handle.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        };
        (count, bump)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_schedules_coalesce() {
        let scheduler = WriteScheduler::new(Duration::from_millis(800));
        let (count, bump) = counter();

        for _ in 0..5 {
            scheduler.schedule(bump.clone());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_pending());

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_restarts_from_last_schedule() {
        let scheduler = WriteScheduler::new(Duration::from_millis(800));
        let (count, bump) = counter();

        scheduler.schedule(bump.clone());
        tokio::time::sleep(Duration::from_millis(700)).await;
        scheduler.schedule(bump);
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_flush() {
        let scheduler = WriteScheduler::new(Duration::from_millis(800));
        let (count, bump) = counter();

        scheduler.schedule(bump);
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
