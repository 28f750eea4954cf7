//! The cooperative async runner: timeout-bounded test bodies with explicit
//! suspension points.
//!
//! Execution is single-threaded and cooperative. [`TestContext::pause`] and
//! [`TestContext::wait_until`] are the suspension points; between them the
//! body runs uninterrupted, so a timeout is only ever detected at the next
//! await point. A body that never awaits cannot be cancelled.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::{Error, Result, TestContext};

/// Default timeout for [`TestContext::run_async`].
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(1);

/// Default polling interval for [`TestContext::wait_until`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle of the async body driven by [`TestContext::run_async`].
///
/// `Running` is entered on the first poll and re-entered after every
/// suspension; the terminal states are reached exactly once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Clears the context's running-async flag on every exit path, including
/// cancellation.
struct RunningGuard<'a> {
    ctx: &'a TestContext,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.ctx.inner.async_active.set(false);
    }
}

impl TestContext {
    /// Sets the default timeout used by [`run_async`](Self::run_async).
    pub fn set_timeout(&self, timeout: Duration) {
        self.inner.default_timeout.set(timeout);
    }

    /// The current default timeout.
    pub fn default_timeout(&self) -> Duration {
        self.inner.default_timeout.get()
    }

    /// Status of the most recent [`run_async`](Self::run_async) body
    /// (`Pending` before the first run).
    pub fn last_task_status(&self) -> TaskStatus {
        self.inner.task_status.get()
    }

    /// Drives `body` under the context's default timeout.
    pub async fn run_async<T, F>(&self, body: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.run_async_with_timeout(body, self.default_timeout()).await
    }

    /// Drives `body`, failing with [`Error::Timeout`] if it does not finish
    /// within `timeout`. The deadline is only enforced at suspension points
    /// ([`pause`](Self::pause) / [`wait_until`](Self::wait_until)); a body
    /// that never awaits runs to completion regardless.
    ///
    /// One body at a time: nesting `run_async` is a `Usage` error.
    pub async fn run_async_with_timeout<T, F>(&self, body: F, timeout: Duration) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.inner.async_active.get() {
            return Err(Error::usage(
                "run_async is already driving a body; nested run_async is not supported",
            ));
        }
        self.inner.async_active.set(true);
        self.inner.task_status.set(TaskStatus::Running);
        let _guard = RunningGuard { ctx: self };

        match tokio::time::timeout(timeout, body).await {
            Ok(Ok(value)) => {
                self.inner.task_status.set(TaskStatus::Completed);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.inner.task_status.set(TaskStatus::Failed);
                Err(e)
            }
            Err(_) => {
                self.inner.task_status.set(TaskStatus::TimedOut);
                Err(Error::Timeout(timeout))
            }
        }
    }

    /// Suspends for at least `ms` milliseconds of wall-clock time.
    ///
    /// Legal only inside a [`run_async`](Self::run_async) body; anywhere
    /// else it is a `Usage` error.
    pub async fn pause(&self, ms: u64) -> Result {
        if !self.inner.async_active.get() {
            return Err(Error::usage("pause() called outside run_async"));
        }
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    /// Polls `predicate` until it returns true, suspending
    /// [`DEFAULT_POLL_INTERVAL`] between checks; [`Error::Timeout`] after
    /// [`DEFAULT_ASYNC_TIMEOUT`].
    pub async fn wait_until(&self, predicate: impl Fn() -> bool) -> Result {
        self.wait_until_within(predicate, DEFAULT_ASYNC_TIMEOUT, DEFAULT_POLL_INTERVAL)
            .await
    }

    /// [`wait_until`](Self::wait_until) with explicit timeout and polling
    /// interval. The timeout's granularity is bounded by the interval: the
    /// predicate is not re-checked between polls.
    pub async fn wait_until_within(
        &self,
        predicate: impl Fn() -> bool,
        timeout: Duration,
        interval: Duration,
    ) -> Result {
        if !self.inner.async_active.get() {
            return Err(Error::usage("wait_until() called outside run_async"));
        }
        let deadline = Instant::now() + timeout;
        loop {
            if predicate() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout));
            }
            self.pause(interval.as_millis() as u64).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[tokio::test]
    async fn completed_body_returns_its_value() {
        let ctx = TestContext::new();
        let out = ctx
            .run_async_with_timeout(
                async {
                    ctx.pause(50).await?;
                    Ok("done")
                },
                Duration::from_millis(100),
            )
            .await
            .unwrap();
        assert_eq!(out, "done");
        assert_eq!(ctx.last_task_status(), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn overrunning_body_times_out() {
        let ctx = TestContext::new();
        let err = ctx
            .run_async_with_timeout(
                async {
                    ctx.pause(200).await?;
                    Ok(())
                },
                Duration::from_millis(50),
            )
            .await
            .unwrap_err();
        assert_eq!(err, Error::Timeout(Duration::from_millis(50)));
        assert!(err.to_string().contains("timed out"), "got: {err}");
        assert!(err.to_string().contains("50ms"), "got: {err}");
        assert_eq!(ctx.last_task_status(), TaskStatus::TimedOut);
    }

    #[tokio::test]
    async fn failing_body_reports_failed_status() {
        let ctx = TestContext::new();
        let err = ctx
            .run_async(async { Err::<(), _>(Error::assertion("inside")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Assertion(_)));
        assert_eq!(ctx.last_task_status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn pause_outside_run_async_is_a_usage_error() {
        let ctx = TestContext::new();
        let err = ctx.pause(1).await.unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[tokio::test]
    async fn running_flag_clears_after_each_run() {
        let ctx = TestContext::new();
        ctx.run_async(async { Ok(()) }).await.unwrap();
        // A second run is fine; the flag was cleared.
        ctx.run_async(async { Ok(()) }).await.unwrap();
        // Even after a timeout.
        let _ = ctx
            .run_async_with_timeout(
                async {
                    ctx.pause(100).await?;
                    Ok(())
                },
                Duration::from_millis(10),
            )
            .await;
        assert!(ctx.pause(1).await.is_err());
        ctx.run_async(async { Ok(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn wait_until_sees_progress_between_polls() {
        let ctx = TestContext::new();
        let counter = Rc::new(Cell::new(0));
        let observed = counter.clone();
        ctx.run_async(async {
            // Another part of the body advances the counter cooperatively.
            let ticker = async {
                for _ in 0..5 {
                    ctx.pause(5).await?;
                    counter.set(counter.get() + 1);
                }
                Ok(())
            };
            let waiter = ctx.wait_until_within(
                || observed.get() >= 3,
                Duration::from_millis(500),
                Duration::from_millis(5),
            );
            let (a, b) = tokio::join!(ticker, waiter);
            a.and(b)
        })
        .await
        .unwrap();
        assert!(counter.get() >= 3);
    }

    #[tokio::test]
    async fn wait_until_times_out_when_predicate_never_holds() {
        let ctx = TestContext::new();
        let err = ctx
            .run_async(async {
                ctx.wait_until_within(
                    || false,
                    Duration::from_millis(30),
                    Duration::from_millis(5),
                )
                .await
            })
            .await
            .unwrap_err();
        assert_eq!(err, Error::Timeout(Duration::from_millis(30)));
    }

    #[tokio::test]
    async fn set_timeout_changes_the_default() {
        let ctx = TestContext::new();
        assert_eq!(ctx.default_timeout(), DEFAULT_ASYNC_TIMEOUT);
        ctx.set_timeout(Duration::from_millis(20));
        let err = ctx
            .run_async(async {
                ctx.pause(100).await?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, Error::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn status_starts_pending() {
        let ctx = TestContext::new();
        assert_eq!(ctx.last_task_status(), TaskStatus::Pending);
    }
}
