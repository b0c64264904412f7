//! Declaring and retracting a job's triggers.
//!
//! A running job definition declares its full trigger list; the lifecycle
//! swaps the job's previous subscriptions for the new ones. Declarations for
//! all jobs are serialized through one lock, so two declarations for the
//! same job never interleave their stop/start sequences.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use super::{PatternError, Registries, Trigger, TriggerFamily, TriggerSpec};
use crate::jobs::{Job, JobRef};
use crate::types::{CorrelationKey, JobId};

#[derive(Debug, Error)]
pub enum DeclarationError {
    /// A trigger's pattern did not compile; nothing was changed.
    #[error("trigger {index} ({family}): {source}")]
    InvalidPattern {
        index: usize,
        family: TriggerFamily,
        #[source]
        source: PatternError,
    },

    /// Two triggers of one family; a job subscribes once per family.
    #[error("trigger {index} repeats family {family}; combine the patterns into one")]
    DuplicateFamily { index: usize, family: TriggerFamily },

    /// The job id in the request path and in the job definition differ.
    #[error("job id mismatch: path says {path}, definition says {definition}")]
    JobIdMismatch { path: JobId, definition: JobId },

    #[error("no triggers declared for job {0}")]
    UnknownJob(JobId),
}

/// What a declaration did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declared {
    pub job: JobId,

    /// The key the job subscribed under, or `None` if it could not subscribe
    /// (no GitHub source, or not a pull request job).
    pub key: Option<CorrelationKey>,

    pub families: Vec<TriggerFamily>,
}

struct Declaration {
    job: JobRef,
    triggers: Vec<Trigger>,
}

/// Tracks which triggers each job has declared and keeps the registries in
/// step with them.
pub struct TriggerLifecycle {
    registries: Arc<Registries>,
    declared: Mutex<HashMap<JobId, Declaration>>,
}

impl TriggerLifecycle {
    pub fn new(registries: Arc<Registries>) -> Self {
        TriggerLifecycle {
            registries,
            declared: Mutex::new(HashMap::new()),
        }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    /// Replaces `job`'s triggers with `specs`.
    ///
    /// All specs are checked and compiled before anything is touched: if any
    /// pattern is invalid, or a family appears twice, the job keeps its
    /// previous subscriptions.
    pub fn declare(&self, job: Job, specs: &[TriggerSpec]) -> Result<Declared, DeclarationError> {
        let mut seen = HashSet::new();
        for (index, spec) in specs.iter().enumerate() {
            if !seen.insert(spec.family()) {
                return Err(DeclarationError::DuplicateFamily {
                    index,
                    family: spec.family(),
                });
            }
        }

        let triggers = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                spec.compile().map_err(|source| DeclarationError::InvalidPattern {
                    index,
                    family: spec.family(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let job = Arc::new(job);
        let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = declared.remove(&job.id) {
            for trigger in &previous.triggers {
                trigger.stop(&previous.job, &self.registries);
            }
        }

        let mut key = None;
        for trigger in &triggers {
            key = trigger.start(&job, &self.registries).or(key);
        }
        let families = triggers.iter().map(Trigger::family).collect();

        info!(
            job = %job.id,
            key = ?key,
            triggers = triggers.len(),
            "Declared triggers"
        );

        let summary = Declared {
            job: job.id.clone(),
            key,
            families,
        };
        declared.insert(job.id.clone(), Declaration { job, triggers });
        Ok(summary)
    }

    /// Stops and forgets every trigger `job` declared.
    pub fn retract(&self, job: &JobId) -> Result<(), DeclarationError> {
        // Held until every trigger is stopped so a concurrent declare cannot
        // start triggers that this loop then stops.
        let mut declared = self.declared.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = declared
            .remove(job)
            .ok_or_else(|| DeclarationError::UnknownJob(job.clone()))?;

        for trigger in &previous.triggers {
            trigger.stop(&previous.job, &self.registries);
        }
        drop(declared);
        info!(job = %job, triggers = previous.triggers.len(), "Retracted triggers");
        Ok(())
    }

    /// Families `job` currently has declared, if it declared anything.
    pub fn declared_families(&self, job: &JobId) -> Option<Vec<TriggerFamily>> {
        self.declared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job)
            .map(|d| d.triggers.iter().map(Trigger::family).collect())
    }
}
