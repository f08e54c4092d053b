//! One-shot broadcast events.

use std::time::Duration;

use tokio::sync::watch;

/// A latch: many waiters, a single idempotent fire.
///
/// Used for the processor's `downloaded` and `done` events. Once fired it
/// stays fired; `wait` returns immediately for late subscribers.
pub struct Latch {
    fired: watch::Sender<bool>,
}

impl Latch {
    pub fn new() -> Self {
        let (fired, _) = watch::channel(false);
        Self { fired }
    }

    /// Fire the latch. Repeated calls are no-ops.
    pub fn fire(&self) {
        self.fired.send_replace(true);
    }

    pub fn is_fired(&self) -> bool {
        *self.fired.borrow()
    }

    /// Wait until the latch fires.
    pub async fn wait(&self) {
        let mut rx = self.fired.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|fired| *fired).await;
    }

    /// Wait up to `timeout`; true iff the latch fired in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn all_waiters_observe_a_single_fire() {
        let latch = Arc::new(Latch::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let latch = latch.clone();
                tokio::spawn(async move { latch.wait().await })
            })
            .collect();
        latch.fire();
        latch.fire(); // idempotent
        for waiter in waiters {
            waiter.await.unwrap();
        }
        assert!(latch.is_fired());
    }

    #[tokio::test]
    async fn late_waiters_return_immediately() {
        let latch = Latch::new();
        latch.fire();
        latch.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_reports_elapse() {
        let latch = Latch::new();
        assert!(!latch.wait_timeout(Duration::from_millis(50)).await);
        latch.fire();
        assert!(latch.wait_timeout(Duration::from_millis(50)).await);
    }
}
