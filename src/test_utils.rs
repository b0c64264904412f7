//! Shared test utilities: job fixtures, recording collaborators, payload
//! builders and arbitrary generators for property-based testing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;

use crate::jobs::{GitHubSource, Job, JobRef, ScmHead, ScmSource};
use crate::scheduler::{BuildHandle, BuildId, BuildParameters, BuildScheduler, Cause, ScheduleError};
use crate::types::{JobId, PrNumber};
use crate::webhooks::ReviewState;

// ============================================================================
// Jobs
// ============================================================================

/// A pull request job whose parent project is the GitHub repo `owner/repo`.
pub fn pr_job(id: &str, owner: &str, repo: &str, number: u64) -> JobRef {
    Arc::new(
        Job::new(id, ScmHead::PullRequest {
            number: PrNumber(number),
        })
        .with_parent_source(ScmSource::GitHub(GitHubSource::new(owner, repo))),
    )
}

// ============================================================================
// Schedulers
// ============================================================================

/// One call to [`BuildScheduler::schedule`].
#[derive(Debug, Clone)]
pub struct ScheduledCall {
    pub job: JobId,
    pub quiet_period: Duration,
    pub cause: Cause,
    pub parameters: BuildParameters,
}

/// Records every schedule call. Optionally fails for some jobs.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<ScheduledCall>>,
    failing: HashSet<JobId>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule calls for `job` fail with `ScheduleError::Rejected`.
    pub fn failing_for(mut self, job: &str) -> Self {
        self.failing.insert(JobId::new(job));
        self
    }

    pub fn calls(&self) -> Vec<ScheduledCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl BuildScheduler for RecordingScheduler {
    fn schedule(
        &self,
        job: &JobRef,
        quiet_period: Duration,
        cause: Cause,
        parameters: BuildParameters,
    ) -> Result<BuildHandle, ScheduleError> {
        if self.failing.contains(&job.id) {
            return Err(ScheduleError::Rejected(format!("{} is disabled", job.id)));
        }
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.push(ScheduledCall {
            job: job.id.clone(),
            quiet_period,
            cause,
            parameters,
        });
        Ok(BuildHandle {
            id: BuildId(calls.len() as u64),
            job: job.id.clone(),
            queued_at: Utc::now(),
        })
    }
}

// ============================================================================
// Webhook payloads
// ============================================================================

pub fn comment_payload(owner: &str, repo: &str, number: u64, action: &str, body: &str, author: &str) -> String {
    json!({
        "action": action,
        "comment": { "id": 1, "body": body, "user": { "login": author } },
        "issue": { "number": number, "pull_request": { "url": "https://example.invalid" } },
        "repository": { "owner": { "login": owner }, "name": repo },
        "sender": { "login": author }
    })
    .to_string()
}

pub fn label_payload(owner: &str, repo: &str, number: u64, action: &str, label: &str, sender: &str) -> String {
    json!({
        "action": action,
        "number": number,
        "pull_request": { "number": number },
        "label": { "name": label },
        "repository": { "owner": { "login": owner }, "name": repo },
        "sender": { "login": sender }
    })
    .to_string()
}

pub fn review_payload(
    owner: &str,
    repo: &str,
    number: u64,
    action: &str,
    state: &str,
    body: &str,
    reviewer: &str,
) -> String {
    json!({
        "action": action,
        "review": { "id": 1, "user": { "login": reviewer }, "body": body, "state": state },
        "pull_request": { "number": number },
        "repository": { "owner": { "login": owner }, "name": repo },
        "sender": { "login": reviewer }
    })
    .to_string()
}

// ============================================================================
// Generators
// ============================================================================

pub fn arb_login() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

pub fn arb_review_state() -> impl Strategy<Value = ReviewState> {
    prop::sample::select(ReviewState::ALL.to_vec())
}
