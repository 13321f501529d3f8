//! Module for tracking the operational state of the crawler.
//!
//! `CrawlerState` owns the outstanding-work counter used to detect crawl
//! completion and the shutdown flag consulted by every submission. The
//! counter is incremented by `begin_work` *before* the task that will
//! decrement it is scheduled, so `wait_idle` can never observe zero while
//! work is still being handed off.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Represents the shared state of the crawler's dispatched units.
#[derive(Debug, Default)]
pub struct CrawlerState {
    /// Submitted units that have not finished yet.
    outstanding: AtomicUsize,
    idle: Notify,
    shutting_down: AtomicBool,
}

impl CrawlerState {
    /// Creates a new, atomically reference-counted `CrawlerState`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one unit of work. The returned guard finishes it on drop,
    /// including when the unit unwinds.
    pub fn begin_work(self: &Arc<Self>) -> WorkGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            state: Arc::clone(self),
        }
    }

    fn finish_work(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_one();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Resolves once the outstanding counter reaches zero.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

/// Decrements the outstanding counter when dropped.
#[derive(Debug)]
pub struct WorkGuard {
    state: Arc<CrawlerState>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        self.state.finish_work();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_idle_returns_after_last_guard_drops() {
        let state = CrawlerState::new();
        let first = state.begin_work();
        let second = state.begin_work();
        assert_eq!(state.outstanding(), 2);

        let waiter = {
            let state = Arc::clone(&state);
            tokio::spawn(async move { state.wait_idle().await })
        };

        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(second);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
        assert!(state.is_idle());
    }

    #[tokio::test]
    async fn wait_idle_is_immediate_without_work() {
        let state = CrawlerState::new();
        tokio::time::timeout(Duration::from_millis(100), state.wait_idle())
            .await
            .expect("no work means idle");
    }

    #[test]
    fn guard_released_on_unwind() {
        let state = CrawlerState::new();
        let cloned = Arc::clone(&state);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.begin_work();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(state.is_idle());
    }
}
