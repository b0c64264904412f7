//! The build queue: scheduling builds and running them.
//!
//! The dispatcher only sees [`BuildScheduler`]. The production scheduler,
//! [`QueueScheduler`], hands each build to a [`BuildExecutor`] over an
//! unbounded channel so scheduling never waits on a running build.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod cause;
pub mod executor;

pub use cause::{BuildParameters, Cause};
pub use executor::{BuildCounts, BuildExecutor, BuildOutcome};

use crate::jobs::JobRef;
use crate::types::JobId;

#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The executor has shut down; nothing will run the build.
    #[error("build queue is closed")]
    QueueClosed,

    #[error("build rejected: {0}")]
    Rejected(String),
}

/// Sequential id of a scheduled build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BuildId(pub u64);

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build-{}", self.0)
    }
}

/// Receipt for a scheduled build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildHandle {
    pub id: BuildId,
    pub job: JobId,
    pub queued_at: DateTime<Utc>,
}

/// The host build queue.
///
/// `schedule` only enqueues. It must not wait for the build to start.
pub trait BuildScheduler: Send + Sync {
    fn schedule(
        &self,
        job: &JobRef,
        quiet_period: Duration,
        cause: Cause,
        parameters: BuildParameters,
    ) -> Result<BuildHandle, ScheduleError>;
}

/// A build waiting for the executor.
#[derive(Debug, Clone)]
pub struct QueuedBuild {
    pub handle: BuildHandle,
    pub job: JobRef,
    pub quiet_period: Duration,
    pub cause: Cause,
    pub parameters: BuildParameters,
}

/// Schedules builds onto an in-process queue drained by a [`BuildExecutor`].
#[derive(Debug)]
pub struct QueueScheduler {
    tx: mpsc::UnboundedSender<QueuedBuild>,
    next_id: AtomicU64,
}

impl QueueScheduler {
    /// Creates a scheduler and the receiving end its executor drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<QueuedBuild>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = QueueScheduler {
            tx,
            next_id: AtomicU64::new(1),
        };
        (scheduler, rx)
    }
}

impl BuildScheduler for QueueScheduler {
    fn schedule(
        &self,
        job: &JobRef,
        quiet_period: Duration,
        cause: Cause,
        parameters: BuildParameters,
    ) -> Result<BuildHandle, ScheduleError> {
        let handle = BuildHandle {
            id: BuildId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            job: job.id.clone(),
            queued_at: Utc::now(),
        };
        self.tx
            .send(QueuedBuild {
                handle: handle.clone(),
                job: JobRef::clone(job),
                quiet_period,
                cause,
                parameters,
            })
            .map_err(|_| ScheduleError::QueueClosed)?;
        Ok(handle)
    }
}
