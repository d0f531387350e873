//! Concurrent fan-out over independent downstream calls.
//!
//! Two join policies:
//!
//! - [`Aggregator::fail_fast`]: every sub-task must succeed. The first
//!   failure, or the deadline, cancels the rest and is the only error reported.
//! - [`Aggregator::best_effort`]: failures are logged and replaced by
//!   `T::default()`; the join itself never fails.
//!
//! Results are assembled by sub-task index, never by completion order.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::BoxedError;

/// Tracing target for aggregation.
pub const TRACING_TARGET_AGGREGATE: &str = "bff_server::service::aggregate";

const DEFAULT_DEADLINE: Duration = Duration::from_secs(10);

/// One named unit of work in an aggregation.
pub struct SubTask<T> {
    name: &'static str,
    future: BoxFuture<'static, Result<T, BoxedError>>,
}

impl<T> SubTask<T> {
    /// Wraps `future` under `name`.
    pub fn new<F, E>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxedError>,
    {
        Self {
            name,
            future: future.map(|result| result.map_err(Into::into)).boxed(),
        }
    }

    /// Returns the sub-task name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> std::fmt::Debug for SubTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubTask")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The single error reported by a fail-fast join.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// A sub-task returned an error.
    #[error("sub-task `{task}` failed: {source}")]
    Failed {
        task: &'static str,
        index: usize,
        #[source]
        source: BoxedError,
    },
    /// A sub-task panicked.
    #[error("sub-task `{task}` panicked")]
    Panicked { task: &'static str, index: usize },
    /// Not every sub-task finished before the deadline.
    #[error("aggregation exceeded its deadline of {deadline:?}")]
    DeadlineExceeded { deadline: Duration },
    /// The runtime dropped a sub-task.
    #[error("sub-task was interrupted: {0}")]
    Interrupted(#[from] JoinError),
}

impl AggregateError {
    /// Name of the sub-task that caused the failure, if any.
    pub fn task(&self) -> Option<&'static str> {
        match self {
            Self::Failed { task, .. } | Self::Panicked { task, .. } => Some(task),
            Self::DeadlineExceeded { .. } | Self::Interrupted(_) => None,
        }
    }

    /// Returns `true` if the deadline expired.
    #[inline]
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

enum Outcome<T> {
    Done(Result<T, BoxedError>),
    Panicked,
    Cancelled,
}

/// Runs sub-tasks concurrently, one spawned task each.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    deadline: Duration,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}

impl Aggregator {
    /// Creates an aggregator whose fail-fast joins are bounded by `deadline`.
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Returns the fail-fast deadline.
    #[inline]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs every sub-task; succeeds only if all of them do.
    ///
    /// On the first failure (or at the deadline) the shared cancellation
    /// token fires, in-flight sub-tasks are aborted and partial results are
    /// dropped.
    pub async fn fail_fast<T>(&self, tasks: Vec<SubTask<T>>) -> Result<Vec<T>, AggregateError>
    where
        T: Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (names, mut join_set) = spawn_all(tasks, Some(&cancel));
        let mut slots: Vec<Option<T>> = names.iter().map(|_| None).collect();

        let deadline = tokio::time::sleep(self.deadline);
        tokio::pin!(deadline);

        let failure = loop {
            tokio::select! {
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break None };
                    match joined {
                        Ok((index, Outcome::Done(Ok(value)))) => slots[index] = Some(value),
                        Ok((index, Outcome::Done(Err(source)))) => {
                            break Some(AggregateError::Failed { task: names[index], index, source });
                        }
                        Ok((index, Outcome::Panicked)) => {
                            break Some(AggregateError::Panicked { task: names[index], index });
                        }
                        // Only this join cancels, and it stops polling first.
                        Ok((_, Outcome::Cancelled)) => continue,
                        Err(join_error) => break Some(AggregateError::Interrupted(join_error)),
                    }
                }
                () = &mut deadline => {
                    break Some(AggregateError::DeadlineExceeded { deadline: self.deadline });
                }
            }
        };

        if let Some(error) = failure {
            cancel.cancel();
            join_set.abort_all();

            tracing::warn!(
                target: TRACING_TARGET_AGGREGATE,
                task = error.task(),
                sub_tasks = names.len(),
                error = %error,
                "Fail-fast aggregation aborted"
            );
            return Err(error);
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Runs every sub-task; failures become `T::default()`.
    ///
    /// Siblings are never cancelled and the result always has one entry per
    /// sub-task, in sub-task order.
    pub async fn best_effort<T>(&self, tasks: Vec<SubTask<T>>) -> Vec<T>
    where
        T: Default + Send + 'static,
    {
        let (names, mut join_set) = spawn_all(tasks, None);
        let mut slots: Vec<T> = names.iter().map(|_| T::default()).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, Outcome::Done(Ok(value)))) => slots[index] = value,
                Ok((index, Outcome::Done(Err(error)))) => {
                    tracing::warn!(
                        target: TRACING_TARGET_AGGREGATE,
                        task = names[index],
                        index = index,
                        error = %error,
                        "Best-effort sub-task failed, using default"
                    );
                }
                Ok((index, Outcome::Panicked)) => {
                    tracing::warn!(
                        target: TRACING_TARGET_AGGREGATE,
                        task = names[index],
                        index = index,
                        "Best-effort sub-task panicked, using default"
                    );
                }
                Ok((_, Outcome::Cancelled)) => {}
                Err(join_error) => {
                    tracing::warn!(
                        target: TRACING_TARGET_AGGREGATE,
                        error = %join_error,
                        "Best-effort sub-task interrupted, using default"
                    );
                }
            }
        }

        slots
    }
}

fn spawn_all<T>(
    tasks: Vec<SubTask<T>>,
    cancel: Option<&CancellationToken>,
) -> (Vec<&'static str>, JoinSet<(usize, Outcome<T>)>)
where
    T: Send + 'static,
{
    let mut names = Vec::with_capacity(tasks.len());
    let mut join_set = JoinSet::new();

    for (index, task) in tasks.into_iter().enumerate() {
        names.push(task.name);
        let cancel = cancel.cloned();
        let future = AssertUnwindSafe(task.future).catch_unwind();

        join_set.spawn(async move {
            let outcome = match cancel {
                Some(cancel) => tokio::select! {
                    () = cancel.cancelled() => Outcome::Cancelled,
                    result = future => result.map_or(Outcome::Panicked, Outcome::Done),
                },
                None => future.await.map_or(Outcome::Panicked, Outcome::Done),
            };
            (index, outcome)
        });
    }

    (names, join_set)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn after<T: Send + 'static>(name: &'static str, delay_ms: u64, value: T) -> SubTask<T> {
        SubTask::new(name, async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok::<_, Boom>(value)
        })
    }

    fn failing<T: Send + 'static>(name: &'static str, delay_ms: u64) -> SubTask<T> {
        SubTask::new(name, async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Err::<T, _>(Boom)
        })
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_assembles_by_index() -> anyhow::Result<()> {
        let aggregator = Aggregator::default();
        let tasks = vec![
            after("slowest", 30, 1),
            after("fast", 10, 2),
            after("middle", 20, 3),
        ];

        assert_eq!(aggregator.fail_fast(tasks).await?, vec![1, 2, 3]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_reports_the_failing_task_and_cancels_the_rest() {
        let aggregator = Aggregator::default();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let tasks = vec![
            after("session_stats", 5, 1),
            after("lesson_stats", 5, 2),
            failing("points", 10),
            SubTask::new("streak", async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Boom>(4)
            }),
        ];

        let error = aggregator.fail_fast(tasks).await.unwrap_err();
        assert!(matches!(error, AggregateError::Failed { task: "points", index: 2, .. }));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_honours_the_deadline() {
        let aggregator = Aggregator::new(Duration::from_secs(1));
        let tasks = vec![after("quick", 10, 1), after("stuck", 60_000, 2)];

        let error = aggregator.fail_fast(tasks).await.unwrap_err();
        assert!(error.is_deadline_exceeded());
        assert_eq!(error.task(), None);
    }

    #[tokio::test]
    async fn fail_fast_turns_panics_into_errors() {
        let tasks = vec![
            after("fine", 0, 1),
            SubTask::new("broken", async {
                if true {
                    panic!("broken sub-task");
                }
                Ok::<i32, Boom>(0)
            }),
        ];

        let error = Aggregator::default().fail_fast(tasks).await.unwrap_err();
        assert!(matches!(error, AggregateError::Panicked { task: "broken", index: 1 }));
    }

    #[tokio::test]
    async fn fail_fast_with_no_tasks_is_empty() -> anyhow::Result<()> {
        let result: Vec<u8> = Aggregator::default().fail_fast(Vec::new()).await?;
        assert!(result.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_substitutes_defaults() {
        let aggregator = Aggregator::default();
        let tasks = vec![
            after("points", 20, 40_i64),
            failing("streak", 10),
            after("points", 5, 7),
            failing("streak", 1),
        ];

        assert_eq!(aggregator.best_effort(tasks).await, vec![40, 0, 7, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_survives_total_failure() {
        let tasks: Vec<SubTask<Vec<u8>>> = vec![failing("a", 1), failing("b", 2)];
        assert_eq!(
            Aggregator::default().best_effort(tasks).await,
            vec![Vec::<u8>::new(), Vec::<u8>::new()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn best_effort_does_not_cancel_slow_siblings() {
        let tasks = vec![failing("fast_failure", 1), after("slow", 30_000, 9_u32)];
        assert_eq!(Aggregator::default().best_effort(tasks).await, vec![0, 9]);
    }
}
