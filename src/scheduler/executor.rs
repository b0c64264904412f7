//! Drains the build queue and runs builds.
//!
//! Each build waits out its quiet period, then runs the job's command with
//! the build parameters in its environment. Builds run concurrently; the
//! executor owns them in a `JoinSet` and aborts whatever is still running
//! when it is cancelled.

use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BuildId, QueuedBuild};

/// How a build ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Cancelled during its quiet period.
    Cancelled,
    /// The job has no command; the build only recorded its cause.
    Recorded,
    /// The command ran; `code` is `None` if it was killed by a signal.
    Exited { success: bool, code: Option<i32> },
    /// The command could not be started.
    SpawnFailed(String),
}

/// Totals of finished builds, by outcome.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub recorded: usize,
    pub cancelled: usize,
}

impl BuildCounts {
    fn record(&mut self, outcome: &BuildOutcome) {
        match outcome {
            BuildOutcome::Exited { success: true, .. } => self.succeeded += 1,
            BuildOutcome::Exited { success: false, .. } | BuildOutcome::SpawnFailed(_) => self.failed += 1,
            BuildOutcome::Recorded => self.recorded += 1,
            BuildOutcome::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.recorded + self.cancelled
    }
}

pub struct BuildExecutor {
    rx: mpsc::UnboundedReceiver<QueuedBuild>,
    shutdown: CancellationToken,
}

impl BuildExecutor {
    pub fn new(rx: mpsc::UnboundedReceiver<QueuedBuild>, shutdown: CancellationToken) -> Self {
        BuildExecutor { rx, shutdown }
    }

    /// Runs until cancelled or until every scheduler is dropped, keeping
    /// only per-outcome totals.
    pub async fn run(self) -> BuildCounts {
        let mut counts = BuildCounts::default();
        self.run_with(|_, outcome| counts.record(&outcome)).await;
        counts
    }

    /// Like [`run`](Self::run), handing each finished build to `on_finish`
    /// as soon as it completes.
    pub async fn run_with<F>(mut self, mut on_finish: F)
    where
        F: FnMut(BuildId, BuildOutcome),
    {
        info!("Build executor started");
        let mut running = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(running = running.len(), "Shutdown signal received, stopping executor");
                    break;
                }

                queued = self.rx.recv() => {
                    match queued {
                        Some(build) => {
                            let shutdown = self.shutdown.child_token();
                            running.spawn(async move {
                                let id = build.handle.id;
                                (id, run_build(build, shutdown).await)
                            });
                        }
                        None => {
                            debug!("Build queue closed");
                            break;
                        }
                    }
                }

                Some(joined) = running.join_next(), if !running.is_empty() => {
                    match joined {
                        Ok((id, outcome)) => on_finish(id, outcome),
                        Err(e) => warn!(error = %e, "Build task failed"),
                    }
                }
            }
        }

        if self.shutdown.is_cancelled() {
            running.abort_all();
        }
        while let Some(joined) = running.join_next().await {
            if let Ok((id, outcome)) = joined {
                on_finish(id, outcome);
            }
        }
    }
}

async fn run_build(build: QueuedBuild, shutdown: CancellationToken) -> BuildOutcome {
    let QueuedBuild {
        handle,
        job,
        quiet_period,
        cause,
        parameters,
    } = build;

    if !quiet_period.is_zero() {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!(build = %handle.id, job = %job.id, "Build cancelled during quiet period");
                return BuildOutcome::Cancelled;
            }
            _ = tokio::time::sleep(quiet_period) => {}
        }
    }

    info!(build = %handle.id, job = %job.id, cause = %cause, "Starting build");

    let Some((program, args)) = job.command.split_first() else {
        info!(build = %handle.id, job = %job.id, "Job has no command, build recorded");
        return BuildOutcome::Recorded;
    };

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    parameters.apply_to(&mut command);

    match command.status().await {
        Ok(status) => {
            if status.success() {
                info!(build = %handle.id, job = %job.id, "Build succeeded");
            } else {
                warn!(build = %handle.id, job = %job.id, status = %status, "Build failed");
            }
            BuildOutcome::Exited {
                success: status.success(),
                code: status.code(),
            }
        }
        Err(e) => {
            warn!(build = %handle.id, job = %job.id, error = %e, "Failed to start build");
            BuildOutcome::SpawnFailed(e.to_string())
        }
    }
}
