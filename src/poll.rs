//! Waiting for a task to reach a terminal state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::client::TripoClient;
use crate::error::TripoError;
use crate::types::Task;

/// Called with every observed snapshot. Runs inline in the poll loop, so it
/// must return quickly.
pub type ProgressHook = Arc<dyn Fn(&Task) + Send + Sync>;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Tunables for [`TripoClient::wait_for_task_with`].
#[derive(Clone)]
pub struct WaitOptions {
    /// Pause between two status checks.
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Log every status check at `info` level.
    pub verbose: bool,
    /// Consecutive transport failures tolerated before giving up.
    pub max_poll_failures: u32,
    pub on_progress: Option<ProgressHook>,
    pub cancel: Option<CancellationToken>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            verbose: false,
            max_poll_failures: 3,
            on_progress: None,
            cancel: None,
        }
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("verbose", &self.verbose)
            .field("max_poll_failures", &self.max_poll_failures)
            .field("on_progress", &self.on_progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl WaitOptions {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_poll_failures(mut self, failures: u32) -> Self {
        self.max_poll_failures = failures;
        self
    }

    pub fn on_progress(mut self, hook: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(hook));
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Resolves when `cancel` fires, or never when there is no token.
async fn cancelled(cancel: Option<&CancellationToken>) {
    match cancel {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

/// Resolves at `deadline`, or never when the wait is unbounded.
async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl TripoClient {
    /// Waits for a task to finish by polling its status.
    ///
    /// Returns the first snapshot whose status is `Success`, `Failed` or
    /// `Cancelled`. The caller decides what a failed task means.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::time::Duration;
    /// # use tripo3d_client::TripoClient;
    /// # async fn run() -> Result<(), tripo3d_client::TripoError> {
    /// # let client = TripoClient::new(Some("your_api_key".to_string()))?;
    /// let task = client
    ///     .wait_for_task("some_task_id", Duration::from_secs(2), Some(Duration::from_secs(600)), true)
    ///     .await?;
    /// println!("Task finished with status: {}", task.status);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// - `TripoError::TaskTimeout` once `timeout` elapses, even while a status
    ///   check is still in flight.
    /// - `TripoError::TaskPolling` after too many consecutive transport failures.
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        poll_interval: Duration,
        timeout: Option<Duration>,
        verbose: bool,
    ) -> Result<Task, TripoError> {
        let options = WaitOptions {
            poll_interval,
            timeout,
            verbose,
            ..WaitOptions::default()
        };
        self.wait_for_task_with(task_id, &options).await
    }

    /// [`TripoClient::wait_for_task`] with a progress hook, cancellation and
    /// failure tolerance.
    pub async fn wait_for_task_with(
        &self,
        task_id: &str,
        options: &WaitOptions,
    ) -> Result<Task, TripoError> {
        if task_id.trim().is_empty() {
            return Err(TripoError::InvalidArgument("task id must not be empty".into()));
        }

        let started = Instant::now();
        let deadline = options.timeout.map(|timeout| started + timeout);
        let cancel = options.cancel.as_ref();
        let mut last: Option<Task> = None;
        let mut failures = 0u32;

        loop {
            let polled = tokio::select! {
                _ = cancelled(cancel) => return Err(self.wait_cancelled(task_id)),
                _ = deadline_reached(deadline) => {
                    return Err(timed_out(task_id, started, last));
                }
                polled = self.get_task(task_id) => polled,
            };

            match polled {
                Ok(task) => {
                    failures = 0;
                    self.report(&task, options);
                    if task.is_terminal() {
                        return Ok(task);
                    }
                    last = Some(task);
                }
                Err(e) if e.is_transport() => {
                    failures += 1;
                    tracing::warn!(task_id, failures, error = %e, "status check failed");
                    if failures > options.max_poll_failures {
                        return Err(TripoError::TaskPolling {
                            task_id: task_id.to_string(),
                            failures,
                            last: last.map(Box::new),
                            source: Box::new(e),
                        });
                    }
                }
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = cancelled(cancel) => return Err(self.wait_cancelled(task_id)),
                _ = deadline_reached(deadline) => {
                    return Err(timed_out(task_id, started, last));
                }
                _ = sleep(options.poll_interval) => {}
            }
        }
    }

    fn report(&self, task: &Task, options: &WaitOptions) {
        if options.verbose {
            tracing::info!(
                task_id = %task.task_id,
                status = %task.status,
                progress = task.progress,
                "task progress: {}%",
                task.progress,
            );
        } else {
            tracing::debug!(task_id = %task.task_id, status = %task.status, progress = task.progress, "task polled");
        }
        if let Some(hook) = &options.on_progress {
            hook(task);
        }
    }

    fn wait_cancelled(&self, task_id: &str) -> TripoError {
        tracing::info!(task_id, "wait cancelled");
        TripoError::Cancelled {
            task_id: task_id.to_string(),
        }
    }
}

fn timed_out(task_id: &str, started: Instant, last: Option<Task>) -> TripoError {
    let elapsed = started.elapsed();
    tracing::info!(task_id, elapsed_ms = elapsed.as_millis() as u64, "wait timed out");
    TripoError::TaskTimeout {
        task_id: task_id.to_string(),
        elapsed,
        last: last.map(Box::new),
    }
}
