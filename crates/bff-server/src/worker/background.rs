//! Supervised fire-and-forget tasks.
//!
//! Handlers hand side effects (cache refills, for example) to
//! [`BackgroundTasks::spawn`], which returns immediately. Failures travel over
//! a channel to a supervisor task that logs them until shutdown.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::BoxedError;

/// Tracing target for background task supervision.
const TRACING_TARGET: &str = "bff_server::worker::background";

/// A background task that finished with an error.
#[derive(Debug)]
pub struct TaskFailure {
    /// Name given at spawn time.
    pub name: &'static str,
    /// The error the task returned.
    pub error: BoxedError,
}

/// Handle for spawning supervised background tasks. Cheap to clone.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    failures: mpsc::UnboundedSender<TaskFailure>,
}

impl BackgroundTasks {
    /// Starts the supervisor and returns a handle for spawning tasks.
    ///
    /// The supervisor runs until `cancel` fires or every handle (and every
    /// task spawned through one) is gone. Its join handle yields the number
    /// of failures it observed.
    pub fn start(cancel: CancellationToken) -> (Self, JoinHandle<usize>) {
        let (failures, receiver) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(supervise(receiver, cancel));
        (Self { failures }, supervisor)
    }

    /// Runs `future` in the background. Never blocks the caller.
    pub fn spawn<F, E>(&self, name: &'static str, future: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxedError>,
    {
        let failures = self.failures.clone();
        tokio::spawn(async move {
            if let Err(error) = future.await {
                let failure = TaskFailure {
                    name,
                    error: error.into(),
                };
                if let Err(unsent) = failures.send(failure) {
                    tracing::warn!(
                        target: TRACING_TARGET,
                        task = unsent.0.name,
                        error = %unsent.0.error,
                        "Background task failed after supervisor shutdown"
                    );
                }
            }
        });
    }
}

async fn supervise(
    mut receiver: mpsc::UnboundedReceiver<TaskFailure>,
    cancel: CancellationToken,
) -> usize {
    tracing::info!(target: TRACING_TARGET, "Starting background task supervisor");

    let mut observed = 0;
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!(
                    target: TRACING_TARGET,
                    "Background task supervisor shutdown requested"
                );
                break;
            }
            failure = receiver.recv() => {
                let Some(failure) = failure else { break };
                observed += 1;
                log_failure(&failure);
            }
        }
    }

    // Report whatever is already queued before exiting.
    receiver.close();
    while let Ok(failure) = receiver.try_recv() {
        observed += 1;
        log_failure(&failure);
    }

    tracing::info!(
        target: TRACING_TARGET,
        failures = observed,
        "Background task supervisor stopped"
    );
    observed
}

fn log_failure(failure: &TaskFailure) {
    tracing::warn!(
        target: TRACING_TARGET,
        task = failure.name,
        error = %failure.error,
        "Background task failed"
    );
}
