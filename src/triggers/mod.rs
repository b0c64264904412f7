//! Job-scoped triggers: what a job subscribes to and how it subscribes.
//!
//! A trigger is a predicate plus a family. Starting it registers the job in
//! that family's registry under the job's correlation key; stopping it
//! unregisters. One generic [`SubscribableTrigger`] covers all three
//! families.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub mod lifecycle;
pub mod predicate;
pub mod registry;

pub use lifecycle::{DeclarationError, TriggerLifecycle};
pub use predicate::{CommentPattern, LabelPattern, PatternError, ReviewStateSet, TriggerPredicate};
pub use registry::{Registries, Subscription, SubscriptionRegistry};

use crate::jobs::{Job, JobRef};
use crate::types::CorrelationKey;

/// The three kinds of event a job can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerFamily {
    IssueComment,
    LabelAdded,
    PullRequestReview,
}

impl TriggerFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerFamily::IssueComment => "issue_comment",
            TriggerFamily::LabelAdded => "label_added",
            TriggerFamily::PullRequestReview => "pull_request_review",
        }
    }
}

impl fmt::Display for TriggerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trigger of family `P::FAMILY` holding predicate `P`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribableTrigger<P> {
    predicate: P,
}

impl<P: TriggerPredicate> SubscribableTrigger<P> {
    pub fn new(predicate: P) -> Self {
        SubscribableTrigger { predicate }
    }

    pub fn predicate(&self) -> &P {
        &self.predicate
    }

    pub fn family(&self) -> TriggerFamily {
        P::FAMILY
    }

    /// Registers `job`. Only applicable jobs building a pull request
    /// subscribe; for anything else this is a no-op returning `None`.
    pub fn start(&self, job: &JobRef, registries: &Registries) -> Option<CorrelationKey> {
        if !job.is_applicable() {
            debug!(family = %P::FAMILY, job = %job.id, "Job has no GitHub source, not subscribing");
            return None;
        }
        let Some(key) = job.correlation_key() else {
            debug!(family = %P::FAMILY, job = %job.id, "Job does not build a pull request, not subscribing");
            return None;
        };
        P::registry(registries).register(&key, JobRef::clone(job), self.predicate.clone());
        Some(key)
    }

    /// Unregisters `job` under the same key `start` derived.
    pub fn stop(&self, job: &Job, registries: &Registries) -> bool {
        job.correlation_key()
            .is_some_and(|key| P::registry(registries).unregister(&key, &job.id))
    }
}

/// A trigger as a job declares it.
///
/// ```
/// use pr_triggers::triggers::TriggerSpec;
///
/// let spec: TriggerSpec =
///     serde_json::from_str(r#"{ "type": "issue_comment", "comment_pattern": "deploy" }"#).unwrap();
/// assert!(spec.compile().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerSpec {
    IssueComment {
        comment_pattern: String,
    },
    LabelAdded {
        label_pattern: String,
    },
    PullRequestReview {
        /// Acceptable review states; absent means any.
        #[serde(default)]
        review_states: Option<Vec<String>>,
    },
}

impl TriggerSpec {
    pub fn family(&self) -> TriggerFamily {
        match self {
            TriggerSpec::IssueComment { .. } => TriggerFamily::IssueComment,
            TriggerSpec::LabelAdded { .. } => TriggerFamily::LabelAdded,
            TriggerSpec::PullRequestReview { .. } => TriggerFamily::PullRequestReview,
        }
    }

    /// Compiles the declared predicate.
    pub fn compile(&self) -> Result<Trigger, PatternError> {
        Ok(match self {
            TriggerSpec::IssueComment { comment_pattern } => {
                Trigger::IssueComment(SubscribableTrigger::new(CommentPattern::new(comment_pattern)?))
            }
            TriggerSpec::LabelAdded { label_pattern } => {
                Trigger::LabelAdded(SubscribableTrigger::new(LabelPattern::new(label_pattern)?))
            }
            TriggerSpec::PullRequestReview { review_states } => {
                let states = match review_states {
                    Some(states) => ReviewStateSet::of(states),
                    None => ReviewStateSet::any(),
                };
                Trigger::PullRequestReview(SubscribableTrigger::new(states))
            }
        })
    }
}

/// A compiled trigger of any family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    IssueComment(SubscribableTrigger<CommentPattern>),
    LabelAdded(SubscribableTrigger<LabelPattern>),
    PullRequestReview(SubscribableTrigger<ReviewStateSet>),
}

impl Trigger {
    pub fn family(&self) -> TriggerFamily {
        match self {
            Trigger::IssueComment(t) => t.family(),
            Trigger::LabelAdded(t) => t.family(),
            Trigger::PullRequestReview(t) => t.family(),
        }
    }

    pub fn start(&self, job: &JobRef, registries: &Registries) -> Option<CorrelationKey> {
        match self {
            Trigger::IssueComment(t) => t.start(job, registries),
            Trigger::LabelAdded(t) => t.start(job, registries),
            Trigger::PullRequestReview(t) => t.start(job, registries),
        }
    }

    pub fn stop(&self, job: &Job, registries: &Registries) -> bool {
        match self {
            Trigger::IssueComment(t) => t.stop(job, registries),
            Trigger::LabelAdded(t) => t.stop(job, registries),
            Trigger::PullRequestReview(t) => t.stop(job, registries),
        }
    }
}
