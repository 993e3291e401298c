//! Batch task runner with bounded retry.
//!
//! Drives a sequence of work items through a caller-supplied processing
//! function, absorbing transient failures with a linear backoff up to a
//! configured retry limit, and collects one [`TaskResult`] per item into an
//! ordered [`BatchReport`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;

/// Failure classification for one processing attempt.
///
/// Transient errors are retried up to the policy limit; permanent errors fail
/// the item immediately. Neither escapes the runner - both end up as a
/// `failed` [`TaskResult`].
#[derive(Debug, Error)]
pub enum TaskError {
    /// Retryable: network failure, rate limit, timeout.
    #[error("{0}")]
    Transient(anyhow::Error),

    /// Not retryable: bad input, missing file, invalid configuration.
    #[error("{0}")]
    Permanent(anyhow::Error),
}

impl TaskError {
    pub fn transient(err: impl Into<anyhow::Error>) -> Self {
        Self::Transient(err.into())
    }

    pub fn permanent(err: impl Into<anyhow::Error>) -> Self {
        Self::Permanent(err.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// One unit of batch input. Items are cloned per attempt, so implementors
/// should be cheap references (paths, strings) rather than loaded payloads.
pub trait WorkItem: Clone {
    /// Short human-readable name used in progress output and the report.
    fn label(&self) -> String;
}

impl WorkItem for std::path::PathBuf {
    fn label(&self) -> String {
        self.display().to_string()
    }
}

impl WorkItem for String {
    fn label(&self) -> String {
        self.clone()
    }
}

/// Outcome of processing one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Failed,
    Skipped,
}

/// Recorded outcome for one work item. Created exactly once per item and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult<O> {
    /// Label of the work item this result belongs to.
    pub item: String,

    pub status: TaskStatus,

    /// Output payload produced by the processing function on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<O>,

    /// Description of the last error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Number of processing attempts (1 when no retry occurred, 0 for
    /// skipped items whose function was never invoked).
    pub attempts: u32,

    /// Wall-clock time spent on this item, including backoff sleeps.
    pub elapsed_secs: f64,
}

impl<O> TaskResult<O> {
    fn success(item: String, output: O, attempts: u32, elapsed: Duration) -> Self {
        Self {
            item,
            status: TaskStatus::Success,
            output: Some(output),
            error: None,
            attempts,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    fn failed(item: String, error: anyhow::Error, attempts: u32, elapsed: Duration) -> Self {
        Self {
            item,
            status: TaskStatus::Failed,
            output: None,
            error: Some(format!("{:#}", error)),
            attempts,
            elapsed_secs: elapsed.as_secs_f64(),
        }
    }

    fn skipped(item: String) -> Self {
        Self {
            item,
            status: TaskStatus::Skipped,
            output: None,
            error: None,
            attempts: 0,
            elapsed_secs: 0.0,
        }
    }
}

/// Batch-level status surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// Every item was processed and none failed.
    Completed,

    /// Every item was processed but at least one failed.
    PartialFailure,

    /// Fail-fast or an external abort stopped the batch; remaining items
    /// were marked skipped.
    Aborted,
}

/// Ordered collection of task results, one per submitted work item.
#[derive(Debug, Serialize)]
pub struct BatchReport<O> {
    pub outcome: BatchOutcome,
    pub results: Vec<TaskResult<O>>,
}

impl<O> BatchReport<O> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(TaskStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(TaskStatus::Skipped)
    }

    /// Process exit code for the batch: zero only when every item succeeded.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            BatchOutcome::Completed => 0,
            BatchOutcome::PartialFailure | BatchOutcome::Aborted => 1,
        }
    }
}

/// Retry configuration validated before the batch starts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retries after the first attempt; an item is invoked at most
    /// `max_retries + 1` times.
    pub max_retries: u32,

    /// Base backoff between attempts. The sleep before retry `n` is
    /// `backoff * n` - linear, no jitter.
    pub backoff: Duration,

    /// Stop processing remaining items after the first failed result.
    pub fail_fast: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_secs(5),
            fail_fast: false,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following attempt number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff * (attempt + 1)
    }
}

/// Sequential batch runner.
///
/// Processing is strictly one item at a time; the underlying collaborators
/// (model inference, rate-limited APIs) are not safely reentrant, so ordering
/// of the report falls out of submission order directly.
pub struct BatchRunner {
    policy: RetryPolicy,
    quiet: bool,
    abort: Arc<AtomicBool>,
}

impl BatchRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            quiet: false,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Disable progress output.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Shared flag that aborts the batch between items when set. An item
    /// already dispatched runs to completion to avoid partial artifacts.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
        );
        progress
    }

    /// Run every item through `process`, producing exactly one result per
    /// item in submission order.
    pub async fn run<W, O, F, Fut>(&self, items: &[W], process: F) -> BatchReport<O>
    where
        W: WorkItem,
        F: Fn(W) -> Fut,
        Fut: Future<Output = std::result::Result<O, TaskError>>,
    {
        let progress = self.progress_bar(items.len() as u64);
        let mut results = Vec::with_capacity(items.len());
        let mut halted = false;

        for item in items {
            if !halted && self.abort.load(Ordering::SeqCst) {
                tracing::warn!("abort requested, skipping remaining items");
                halted = true;
            }

            if halted {
                results.push(TaskResult::skipped(item.label()));
                progress.inc(1);
                continue;
            }

            progress.set_message(item.label());
            let result = self.run_one(item, &process, &progress).await;

            if result.status == TaskStatus::Failed && self.policy.fail_fast {
                tracing::warn!("fail-fast: stopping after failure on {}", result.item);
                halted = true;
            }

            results.push(result);
            progress.inc(1);
        }

        progress.finish_and_clear();

        let outcome = if halted {
            BatchOutcome::Aborted
        } else if results.iter().any(|r| r.status == TaskStatus::Failed) {
            BatchOutcome::PartialFailure
        } else {
            BatchOutcome::Completed
        };

        BatchReport { outcome, results }
    }

    async fn run_one<W, O, F, Fut>(
        &self,
        item: &W,
        process: &F,
        progress: &ProgressBar,
    ) -> TaskResult<O>
    where
        W: WorkItem,
        F: Fn(W) -> Fut,
        Fut: Future<Output = std::result::Result<O, TaskError>>,
    {
        let label = item.label();
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            match process(item.clone()).await {
                Ok(output) => {
                    tracing::debug!("{}: succeeded on attempt {}", label, attempt + 1);
                    return TaskResult::success(label, output, attempt + 1, started.elapsed());
                }
                Err(TaskError::Permanent(err)) => {
                    tracing::warn!("{}: permanent failure: {:#}", label, err);
                    return TaskResult::failed(label, err, attempt + 1, started.elapsed());
                }
                Err(TaskError::Transient(err)) => {
                    if attempt < self.policy.max_retries {
                        let delay = self.policy.backoff_for(attempt);
                        attempt += 1;
                        tracing::warn!(
                            "{}: transient failure, retry {}/{} in {:.1}s: {:#}",
                            label,
                            attempt,
                            self.policy.max_retries,
                            delay.as_secs_f64(),
                            err
                        );
                        progress.set_message(format!(
                            "{} (retry {}/{})",
                            label, attempt, self.policy.max_retries
                        ));
                        if !delay.is_zero() {
                            sleep(delay).await;
                        }
                    } else {
                        tracing::warn!(
                            "{}: giving up after {} attempts: {:#}",
                            label,
                            attempt + 1,
                            err
                        );
                        return TaskResult::failed(label, err, attempt + 1, started.elapsed());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicU32;

    fn zero_backoff() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
            fail_fast: false,
        }
    }

    fn runner(policy: RetryPolicy) -> BatchRunner {
        BatchRunner::new(policy).with_quiet(true)
    }

    /// Per-item call counters keyed by item index.
    fn counters(n: usize) -> Arc<Vec<AtomicU32>> {
        Arc::new((0..n).map(|_| AtomicU32::new(0)).collect())
    }

    #[tokio::test]
    async fn report_length_matches_input() {
        let items: Vec<String> = (0..5).map(|i| format!("item-{}", i)).collect();
        let report = runner(zero_backoff())
            .run(&items, |_item| async { Ok::<_, TaskError>(()) })
            .await;

        assert_eq!(report.len(), 5);
        assert_eq!(report.succeeded(), 5);
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = counters(1);
        let items = vec!["bad".to_string()];

        let report = runner(zero_backoff())
            .run(&items, |_item| {
                let calls = calls.clone();
                async move {
                    calls[0].fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TaskError::permanent(anyhow!("missing file")))
                }
            })
            .await;

        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(report.results[0].status, TaskStatus::Failed);
        assert_eq!(report.results[0].attempts, 1);
        assert_eq!(report.outcome, BatchOutcome::PartialFailure);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let calls = counters(1);
        let items = vec!["flaky".to_string()];

        let report = runner(zero_backoff())
            .run(&items, |_item| {
                let calls = calls.clone();
                async move {
                    // Fails twice, succeeds on the third call.
                    if calls[0].fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TaskError::transient(anyhow!("rate limited")))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(calls[0].load(Ordering::SeqCst), 3);
        assert_eq!(report.results[0].status, TaskStatus::Success);
        assert_eq!(report.results[0].attempts, 3);
        assert_eq!(report.outcome, BatchOutcome::Completed);
    }

    #[tokio::test]
    async fn retries_exhausted_demotes_to_failed() {
        let calls = counters(1);
        let items = vec!["down".to_string()];

        let report = runner(zero_backoff())
            .run(&items, |_item| {
                let calls = calls.clone();
                async move {
                    calls[0].fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TaskError::transient(anyhow!("timeout")))
                }
            })
            .await;

        // max_retries = 2 means three calls total.
        assert_eq!(calls[0].load(Ordering::SeqCst), 3);
        assert_eq!(report.results[0].status, TaskStatus::Failed);
        assert_eq!(report.results[0].attempts, 3);
        assert!(report.results[0].error.as_deref().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn fail_fast_skips_remaining_items() {
        let calls = counters(3);
        let items: Vec<String> = (0..3).map(|i| i.to_string()).collect();
        let policy = RetryPolicy {
            fail_fast: true,
            ..zero_backoff()
        };

        let report = runner(policy)
            .run(&items, |item: String| {
                let calls = calls.clone();
                async move {
                    let idx: usize = item.parse().unwrap();
                    calls[idx].fetch_add(1, Ordering::SeqCst);
                    if idx == 0 {
                        Err(TaskError::permanent(anyhow!("bad input")))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        let statuses: Vec<TaskStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Failed, TaskStatus::Skipped, TaskStatus::Skipped]
        );
        assert_eq!(calls[1].load(Ordering::SeqCst), 0);
        assert_eq!(calls[2].load(Ordering::SeqCst), 0);
        assert_eq!(report.outcome, BatchOutcome::Aborted);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn middle_item_recovers_within_retry_budget() {
        let calls = counters(3);
        let items: Vec<String> = (0..3).map(|i| i.to_string()).collect();

        let report = runner(zero_backoff())
            .run(&items, |item: String| {
                let calls = calls.clone();
                async move {
                    let idx: usize = item.parse().unwrap();
                    let seen = calls[idx].fetch_add(1, Ordering::SeqCst);
                    if idx == 1 && seen < 2 {
                        Err(TaskError::transient(anyhow!("connection reset")))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(report.results.iter().all(|r| r.status == TaskStatus::Success));
        assert_eq!(calls[1].load(Ordering::SeqCst), 3);
        assert_eq!(report.outcome, BatchOutcome::Completed);
    }

    #[tokio::test]
    async fn abort_flag_skips_remaining_items() {
        let items: Vec<String> = (0..3).map(|i| i.to_string()).collect();
        let runner = runner(zero_backoff());
        let abort = runner.abort_handle();

        let report = runner
            .run(&items, |item: String| {
                let abort = abort.clone();
                async move {
                    // Simulate a user interrupt arriving while item 0 runs.
                    if item == "0" {
                        abort.store(true, Ordering::SeqCst);
                    }
                    Ok::<_, TaskError>(())
                }
            })
            .await;

        let statuses: Vec<TaskStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TaskStatus::Success, TaskStatus::Skipped, TaskStatus::Skipped]
        );
        assert_eq!(report.outcome, BatchOutcome::Aborted);
    }

    #[tokio::test]
    async fn rerun_yields_identical_report() {
        let items: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        let process = |item: String| async move {
            if item == "2" {
                Err(TaskError::permanent(anyhow!("always broken")))
            } else {
                Ok(item.len())
            }
        };

        let first = runner(zero_backoff()).run(&items, process).await;
        let second = runner(zero_backoff()).run(&items, process).await;

        let shape = |report: &BatchReport<usize>| {
            report
                .results
                .iter()
                .map(|r| (r.item.clone(), r.status, r.output, r.attempts))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));
        assert_eq!(first.outcome, second.outcome);
    }

    #[test]
    fn empty_input_completes_cleanly() {
        let items: Vec<String> = Vec::new();
        let report = tokio_test::block_on(
            runner(zero_backoff()).run(&items, |_item| async { Ok::<_, TaskError>(()) }),
        );

        assert!(report.is_empty());
        assert_eq!(report.outcome, BatchOutcome::Completed);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_secs(5),
            fail_fast: false,
        };

        assert_eq!(policy.backoff_for(0), Duration::from_secs(5));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(10));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(15));
    }
}
