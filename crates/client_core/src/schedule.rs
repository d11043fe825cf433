use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Handle to a delayed follow-up action (redirect or reload).
///
/// The timer fires after its full delay unless [`FollowUp::cancel`] is
/// called first. Dropping the handle does NOT cancel the task; hosts that
/// navigate away and want the pending action gone must cancel explicitly.
#[derive(Debug)]
pub struct FollowUp {
    handle: JoinHandle<()>,
}

impl FollowUp {
    /// Spawn `action` to run once `delay` has elapsed.
    pub fn after<F>(delay: Duration, action: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        Self { handle }
    }

    /// Abort the pending action. Has no effect once it has run.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
#[path = "tests/schedule_tests.rs"]
mod tests;
