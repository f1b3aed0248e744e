//! One-second tick delivery.
//!
//! There is at most one live interval task per `TickSource`: arming
//! always cancels the previous task before spawning the next, so two
//! sources can never drive the same machine. Missed intervals are
//! skipped, not replayed, which keeps the downstream machine's
//! one-decrement-per-tick contract honest when the process stalls.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Spawns and owns the 1 Hz tick task.
pub struct TickSource {
    handle: Option<JoinHandle<()>>,
}

impl TickSource {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Start ticking. `on_tick` runs once per second until it returns
    /// `false` or the source is disarmed. Any previously armed task is
    /// cancelled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&mut self, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        self.disarm();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick resolves immediately; swallow it so the
            // initial second elapses before the first callback.
            interval.tick().await;
            loop {
                interval.tick().await;
                if !on_tick() {
                    break;
                }
            }
        });
        self.handle = Some(handle);
    }

    /// Cancel the tick task if one is running.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Default for TickSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickSource {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    async fn advance_secs(n: u64) {
        for _ in 0..n {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let count = Arc::new(AtomicU64::new(0));
        let count_in_cb = Arc::clone(&count);

        let mut source = TickSource::new();
        source.arm(move || {
            count_in_cb.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::task::yield_now().await;

        advance_secs(5).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);

        source.disarm();
        advance_secs(5).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_the_previous_task() {
        let first = Arc::new(AtomicU64::new(0));
        let second = Arc::new(AtomicU64::new(0));

        let mut source = TickSource::new();
        let first_in_cb = Arc::clone(&first);
        source.arm(move || {
            first_in_cb.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::task::yield_now().await;
        advance_secs(2).await;

        let second_in_cb = Arc::clone(&second);
        source.arm(move || {
            second_in_cb.fetch_add(1, Ordering::SeqCst);
            true
        });
        tokio::task::yield_now().await;
        advance_secs(3).await;

        // Only the replacement keeps ticking
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_returning_false_stops_the_task() {
        let count = Arc::new(AtomicU64::new(0));
        let count_in_cb = Arc::clone(&count);

        let mut source = TickSource::new();
        source.arm(move || {
            let n = count_in_cb.fetch_add(1, Ordering::SeqCst) + 1;
            n < 3
        });
        tokio::task::yield_now().await;

        advance_secs(10).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!source.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn is_armed_tracks_lifecycle() {
        let mut source = TickSource::new();
        assert!(!source.is_armed());

        source.arm(|| true);
        assert!(source.is_armed());

        source.disarm();
        assert!(!source.is_armed());
    }
}
