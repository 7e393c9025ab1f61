//! Cancellable loads for UI-bound consumers
//!
//! A panel that is torn down while a load is in flight cancels its token;
//! whatever the load produces afterwards is discarded.

use std::future::Future;

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> LoadOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            LoadOutcome::Completed(value) => Some(value),
            LoadOutcome::Cancelled => None,
        }
    }
}

/// Drive `load` until it finishes or `token` is cancelled
pub async fn run_cancellable<F, T>(token: &CancellationToken, load: F) -> LoadOutcome<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => LoadOutcome::Cancelled,
        value = load => {
            // A result that lands after teardown is still discarded
            if token.is_cancelled() {
                LoadOutcome::Cancelled
            } else {
                LoadOutcome::Completed(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_completes_without_cancellation() {
        let token = CancellationToken::new();
        let outcome = run_cancellable(&token, async { 42 }).await;
        assert_eq!(outcome, LoadOutcome::Completed(42));
    }

    #[tokio::test]
    async fn test_cancelled_before_completion() {
        let token = CancellationToken::new();
        let child = token.clone();

        let handle = tokio::spawn(async move {
            run_cancellable(&child, async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                1
            })
            .await
        });

        token.cancel();
        let outcome = handle.await.unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.completed(), None);
    }

    #[tokio::test]
    async fn test_already_cancelled_token() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = run_cancellable(&token, async { "late" }).await;
        assert_eq!(outcome, LoadOutcome::Cancelled);
    }
}
