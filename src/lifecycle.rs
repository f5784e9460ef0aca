//! Cooperative shutdown of the background tail task.
//!
//! Every suspension point inside the task (waiting for the file to appear,
//! waiting for a change, backing off after an error, handing a line to a slow
//! consumer) races the tailer's [`CancellationToken`], so a stop request is
//! observed promptly instead of after the current poll interval.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns the background task of one tailer and its cancellation token.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Lifecycle {
    /// Spawns `task`, which must observe `token` at each of its waits.
    pub(crate) fn spawn<F>(token: CancellationToken, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            token,
            task: Some(tokio::spawn(task)),
        }
    }

    /// Asks the task to stop without waiting for it.
    pub(crate) fn request_stop(&self) {
        self.token.cancel();
    }

    pub(crate) fn is_stop_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Asks the task to stop and waits until it has released its resources.
    ///
    /// Calling this again, or after the task ended on its own, is a no-op.
    pub(crate) async fn stop(&mut self) -> Result<()> {
        self.token.cancel();
        match self.task.take() {
            Some(task) => task.await.map_err(Error::from),
            None => Ok(()),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        // The task exits at its next suspension point and drops the file.
        self.token.cancel();
    }
}

/// Sleeps for `duration` unless `token` fires first.
pub(crate) async fn sleep(token: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Runs `fut` unless `token` fires first.
pub(crate) async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_without_cancellation() {
        let token = CancellationToken::new();
        let result = sleep(&token, Duration::from_millis(5)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_sleep_wakes_on_cancellation() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let result = sleep(&token, Duration::from_secs(30)).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();

        let result = cancellable(&token, async { Ok::<_, Error>(1) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_stop_waits_for_task() {
        let token = CancellationToken::new();
        let released = Arc::new(AtomicBool::new(false));

        let task_token = token.clone();
        let task_released = Arc::clone(&released);
        let mut lifecycle = Lifecycle::spawn(token, async move {
            task_token.cancelled().await;
            task_released.store(true, Ordering::SeqCst);
        });

        assert!(!lifecycle.is_stop_requested());
        lifecycle.stop().await.unwrap();

        assert!(released.load(Ordering::SeqCst));
        assert!(lifecycle.is_finished());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let mut lifecycle = Lifecycle::spawn(token, async move {
            task_token.cancelled().await;
        });

        lifecycle.request_stop();
        assert!(lifecycle.is_stop_requested());
        lifecycle.stop().await.unwrap();
        lifecycle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_after_natural_exit() {
        let mut lifecycle = Lifecycle::spawn(CancellationToken::new(), async {});

        tokio::time::sleep(Duration::from_millis(10)).await;
        lifecycle.stop().await.unwrap();
        assert!(lifecycle.is_finished());
    }

    #[tokio::test]
    async fn test_stop_reports_panicked_task() {
        let mut lifecycle = Lifecycle::spawn(CancellationToken::new(), async {
            panic!("boom");
        });

        let result = lifecycle.stop().await;
        assert!(matches!(result, Err(Error::TaskFailed(_))));
    }
}
