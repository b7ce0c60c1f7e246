use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Stops a running Scenario early.
///
/// Cloning is cheap; every clone controls the same run. Aborting is sticky: once triggered the
/// handle stays aborted.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        // NOTE: notify_one stores a permit so an abort issued between polls is not lost
        self.notify.notify_one();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub(crate) async fn aborted(&self) {
        if self.is_aborted() {
            return;
        }
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    #[ntest::timeout(1_000)]
    async fn abort_wakes_waiter() {
        let handle = AbortHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.aborted().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_aborted());
        handle.abort();

        task.await.unwrap();
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn abort_before_wait_is_remembered() {
        let handle = AbortHandle::new();
        handle.abort();
        handle.aborted().await;
    }
}
