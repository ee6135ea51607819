//! Cancellable delayed and periodic tasks.
//!
//! Thin wrappers over tokio's timer primitives so callers schedule work
//! through one seam instead of spawning ad-hoc timer tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a scheduled task.
pub struct TaskHandle {
    inner: JoinHandle<()>,
}

impl TaskHandle {
    /// Cancel the task. Safe to call more than once.
    pub fn cancel(&self) {
        self.inner.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Wait for the task to end (normally or by cancellation).
    pub async fn join(self) {
        let _ = self.inner.await;
    }
}

/// Run `future` once after `delay`.
pub fn spawn_after<F>(delay: Duration, future: F) -> TaskHandle
where
    F: Future<Output = ()> + Send + 'static,
{
    TaskHandle {
        inner: tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            future.await;
        }),
    }
}

/// Run `tick` every `period` until cancelled.
///
/// The first tick fires after one full period. Ticks missed under load
/// are skipped, not replayed.
pub fn spawn_periodic<F>(period: Duration, mut tick: F) -> TaskHandle
where
    F: FnMut() + Send + 'static,
{
    TaskHandle {
        inner: tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval's first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tick();
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawn_after_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let handle = spawn_after(Duration::from_millis(10), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        handle.join().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawn_after_cancel_before_fire() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let handle = spawn_after(Duration::from_millis(50), async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        handle.cancel();
        handle.join().await;

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawn_periodic_ticks_until_cancelled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();

        let handle = spawn_periodic(Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(55)).await;
        handle.cancel();
        handle.join().await;
        let ticks = counter.load(Ordering::SeqCst);
        assert!(ticks >= 2, "expected several ticks, got {ticks}");

        let after = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), after, "no ticks after cancel");
    }
}
