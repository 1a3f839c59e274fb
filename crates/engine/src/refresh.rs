//! Background refresh tasks.
//!
//! A refresh runs on its own tokio task. Failures are logged from inside
//! the task; the caller may `wait()` for the outcome or drop the handle and
//! move on.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::EngineError;

#[must_use = "drop the handle explicitly to fire and forget"]
pub struct RefreshHandle<T> {
    label: &'static str,
    task: JoinHandle<Result<T, EngineError>>,
}

impl<T: Send + 'static> RefreshHandle<T> {
    pub fn spawn<F>(label: &'static str, fut: F) -> Self
    where
        F: Future<Output = Result<T, EngineError>> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let result = fut.await;
            if let Err(e) = &result {
                tracing::warn!(task = label, error = %e, "background refresh failed");
            }
            result
        });
        RefreshHandle { label, task }
    }

    /// Wait for the refresh to finish.
    pub async fn wait(self) -> Result<T, EngineError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(EngineError::Background(format!("{}: {e}", self.label))),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
