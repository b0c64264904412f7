//! Event dispatch: from a raw delivery to scheduled builds.
//!
//! Each inbound event walks one pipeline:
//!
//! ```text
//! received ─► processed delivery? ─► decoded? ─► relevant action?
//!          ─► key ─► subscribers? ─► per subscriber: predicate? ─► authorized? ─► schedule
//! ```
//!
//! Every `?` that fails drops the event (or, per subscriber, that
//! subscriber) silently apart from a log line. Nothing is returned to the
//! transport as an error and nothing is retried. Subscribers are handled
//! one after another from a registry snapshot; one subscriber's failure
//! never stops the others.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::authority::CollaboratorAuthority;
use crate::scheduler::{BuildHandle, BuildScheduler, Cause};
use crate::triggers::{
    CommentPattern, LabelPattern, Registries, ReviewStateSet, TriggerFamily, TriggerPredicate,
};
use crate::types::{CorrelationKey, JobId};
use crate::webhooks::{
    CommentAction, DeliveryType, InboundEvent, PullRequestAction, ReviewAction, WebhookEvent, decode,
};

#[cfg(test)]
mod tests;

/// Default quiet period handed to every schedule call.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5);

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Passed to the scheduler with every build.
    pub quiet_period: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

impl DispatchConfig {
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }
}

/// Why an event was dropped before any subscriber was considered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DropReason {
    /// A removal or other non-creating delivery.
    DeliveryType { delivery: DeliveryType },
    /// An event kind nobody subscribes to.
    UnsubscribedKind { kind: String },
    /// The payload failed to decode.
    Malformed { error: String },
    /// An action the family does not react to (e.g. a deleted comment).
    IrrelevantAction,
    /// Nobody is subscribed under the event's key.
    NoSubscribers { key: CorrelationKey },
}

/// What happened to the subscribers of an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Subscribers whose predicate did not match.
    pub unmatched: Vec<JobId>,
    /// Subscribers whose predicate matched but whose actor was not authorized.
    pub denied: Vec<JobId>,
    /// Builds scheduled.
    pub scheduled: Vec<BuildHandle>,
    /// Subscribers whose schedule call failed.
    pub failed: Vec<JobId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Dropped(DropReason),
    Processed(DispatchReport),
}

impl DispatchOutcome {
    /// Builds scheduled for the event (empty if it was dropped).
    pub fn scheduled(&self) -> &[BuildHandle] {
        match self {
            DispatchOutcome::Processed(report) => &report.scheduled,
            DispatchOutcome::Dropped(_) => &[],
        }
    }
}

/// Routes inbound events to subscribed jobs.
///
/// Holds the registries it reads (shared with the trigger lifecycle that
/// writes them), the authority it consults and the scheduler it feeds.
pub struct EventDispatcher<A, S> {
    registries: Arc<Registries>,
    authority: A,
    scheduler: S,
    config: DispatchConfig,
}

impl<A, S> EventDispatcher<A, S>
where
    A: CollaboratorAuthority,
    S: BuildScheduler,
{
    pub fn new(registries: Arc<Registries>, authority: A, scheduler: S, config: DispatchConfig) -> Self {
        EventDispatcher {
            registries,
            authority,
            scheduler,
            config,
        }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Processes one inbound event to completion.
    #[instrument(skip(self, event), fields(kind = %event.kind, origin = %event.origin))]
    pub async fn dispatch(&self, event: &InboundEvent) -> DispatchOutcome {
        if !event.delivery.is_processed() {
            debug!(delivery = ?event.delivery, "Ignoring delivery type");
            return DispatchOutcome::Dropped(DropReason::DeliveryType {
                delivery: event.delivery,
            });
        }

        let decoded = match decode(&event.kind, &event.payload) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => {
                debug!("No subscribers for event kind");
                return DispatchOutcome::Dropped(DropReason::UnsubscribedKind {
                    kind: event.kind.to_string(),
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to decode webhook payload");
                return DispatchOutcome::Dropped(DropReason::Malformed { error: e.to_string() });
            }
        };

        let key = decoded.correlation_key();

        match &decoded {
            WebhookEvent::IssueComment(comment) => {
                if !matches!(comment.action, CommentAction::Created | CommentAction::Edited) {
                    debug!(key = %key, action = ?comment.action, "Ignoring comment action");
                    return DispatchOutcome::Dropped(DropReason::IrrelevantAction);
                }
                self.fan_out::<CommentPattern, _>(&key, comment.body.as_str(), &comment.author_login, |pattern| {
                    Cause::IssueComment {
                        user_login: comment.author_login.clone(),
                        comment: comment.body.clone(),
                        comment_pattern: pattern.as_str().to_string(),
                    }
                })
                .await
            }

            WebhookEvent::Label(labeled) => {
                let (PullRequestAction::Labeled, Some(label)) = (&labeled.action, labeled.label.as_deref()) else {
                    debug!(key = %key, action = ?labeled.action, "Ignoring pull request action");
                    return DispatchOutcome::Dropped(DropReason::IrrelevantAction);
                };
                self.fan_out::<LabelPattern, _>(&key, label, &labeled.actor_login, |_| Cause::LabelAdded {
                    user_login: labeled.actor_login.clone(),
                    label: label.to_string(),
                })
                .await
            }

            WebhookEvent::Review(review) => {
                if !matches!(review.action, ReviewAction::Submitted | ReviewAction::Edited) {
                    debug!(key = %key, action = ?review.action, "Ignoring review action");
                    return DispatchOutcome::Dropped(DropReason::IrrelevantAction);
                }
                self.fan_out::<ReviewStateSet, _>(&key, &review.state, &review.reviewer_login, |states| {
                    Cause::PullRequestReview {
                        user_login: review.reviewer_login.clone(),
                        state: review.state,
                        comment: review.body.clone(),
                        review_states: states.to_string(),
                    }
                })
                .await
            }
        }
    }

    /// Runs the per-subscriber half of the pipeline for one family.
    async fn fan_out<P, F>(&self, key: &CorrelationKey, subject: &P::Subject, actor: &str, cause_for: F) -> DispatchOutcome
    where
        P: TriggerPredicate,
        F: Fn(&P) -> Cause,
    {
        let family: TriggerFamily = P::FAMILY;
        let subscriptions = self.registries.of::<P>().lookup(key);
        if subscriptions.is_empty() {
            debug!(%family, key = %key, "No subscribers");
            return DispatchOutcome::Dropped(DropReason::NoSubscribers { key: key.clone() });
        }

        let mut report = DispatchReport::default();

        for subscription in subscriptions {
            let job = &subscription.job;

            if !subscription.predicate.matches(subject) {
                debug!(%family, key = %key, job = %job.id, "Predicate did not match");
                report.unmatched.push(job.id.clone());
                continue;
            }

            if !self.authority.is_authorized(job, actor).await {
                warn!(%family, key = %key, job = %job.id, login = %actor, "Actor is not authorized to trigger builds");
                report.denied.push(job.id.clone());
                continue;
            }

            let cause = cause_for(&subscription.predicate);
            let parameters = cause.parameters();
            match self.scheduler.schedule(job, self.config.quiet_period, cause, parameters) {
                Ok(handle) => {
                    info!(%family, key = %key, job = %job.id, build = %handle.id, login = %actor, "Scheduled build");
                    report.scheduled.push(handle);
                }
                Err(e) => {
                    error!(%family, key = %key, job = %job.id, error = %e, "Failed to schedule build");
                    report.failed.push(job.id.clone());
                }
            }
        }

        DispatchOutcome::Processed(report)
    }
}
