//! Decoder for the webhook payloads triggers subscribe to.
//!
//! # Decoding Strategy
//!
//! 1. The event kind comes from the `X-GitHub-Event` header
//! 2. Kinds nobody subscribes to return `Ok(None)` (skipped, not an error)
//! 3. The payload is deserialized into a raw structure that mirrors GitHub's
//!    JSON; a missing required field or malformed JSON is a [`DecodeError`]
//! 4. The raw structure is validated into a typed [`WebhookEvent`]
//!
//! Unknown actions are not errors: they decode to an `Other` action and the
//! dispatcher filters them out.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{PrNumber, RepoId};

use super::events::{
    EventKind, IssueCommentEvent, LabelEvent, PullRequestAction, ReviewEvent, ReviewState,
    WebhookEvent,
};

/// Error type for payload decoding failures.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or JSON missing a required field.
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A field the action requires was absent.
    #[error("missing field {0}")]
    MissingField(&'static str),

    /// A field had a value outside its domain.
    #[error("invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Decodes a payload of the given kind.
///
/// # Returns
///
/// * `Ok(Some(event))` - one of the three subscribed kinds, well formed
/// * `Ok(None)` - a kind nobody subscribes to
/// * `Err(e)` - malformed payload or missing required fields
///
/// # Examples
///
/// ```
/// use pr_triggers::webhooks::{EventKind, WebhookEvent, decode};
///
/// let payload = r#"{
///     "action": "created",
///     "comment": { "body": "deploy", "user": { "login": "alice" } },
///     "issue": { "number": 7 },
///     "repository": { "owner": { "login": "acme" }, "name": "repo" }
/// }"#;
///
/// let event = decode(&EventKind::IssueComment, payload).unwrap();
/// assert!(matches!(event, Some(WebhookEvent::IssueComment(_))));
/// ```
pub fn decode(kind: &EventKind, payload: &str) -> Result<Option<WebhookEvent>, DecodeError> {
    match kind {
        EventKind::IssueComment => decode_issue_comment(payload).map(|e| Some(WebhookEvent::IssueComment(e))),
        EventKind::PullRequest => decode_pull_request(payload).map(|e| Some(WebhookEvent::Label(e))),
        EventKind::PullRequestReview => decode_review(payload).map(|e| Some(WebhookEvent::Review(e))),
        EventKind::Other(_) => Ok(None),
    }
}

// ============================================================================
// Raw payload structures
//
// These mirror GitHub's webhook JSON. Only fields we read are declared;
// serde ignores the rest. Optional fields are `Option` and validated below.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawUser,
    name: String,
}

impl RawRepository {
    fn into_repo_id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

// ============================================================================
// issue_comment
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    comment: RawComment,
    issue: RawIssue,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    body: Option<String>,
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
}

fn decode_issue_comment(payload: &str) -> Result<IssueCommentEvent, DecodeError> {
    let raw: RawIssueCommentPayload = serde_json::from_str(payload)?;

    Ok(IssueCommentEvent {
        repo: raw.repository.into_repo_id(),
        issue_number: PrNumber(raw.issue.number),
        action: raw.action.as_str().into(),
        body: raw.comment.body.unwrap_or_default(),
        author_login: raw.comment.user.login,
    })
}

// ============================================================================
// pull_request (labels)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequestRef,
    label: Option<RawLabel>,
    sender: RawUser,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestRef {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

fn decode_pull_request(payload: &str) -> Result<LabelEvent, DecodeError> {
    let raw: RawPullRequestPayload = serde_json::from_str(payload)?;

    let action = PullRequestAction::from(raw.action.as_str());
    let label = raw.label.map(|l| l.name);

    // GitHub always names the label on label actions.
    if matches!(action, PullRequestAction::Labeled | PullRequestAction::Unlabeled) && label.is_none() {
        return Err(DecodeError::MissingField("label"));
    }

    Ok(LabelEvent {
        repo: raw.repository.into_repo_id(),
        pr_number: PrNumber(raw.pull_request.number),
        action,
        label,
        actor_login: raw.sender.login,
    })
}

// ============================================================================
// pull_request_review
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawReviewPayload {
    action: String,
    review: RawReview,
    pull_request: RawPullRequestRef,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    user: RawUser,
    state: String,
    body: Option<String>,
}

fn decode_review(payload: &str) -> Result<ReviewEvent, DecodeError> {
    let raw: RawReviewPayload = serde_json::from_str(payload)?;

    // Webhooks send lowercase states, the REST API uppercase.
    let state = ReviewState::parse(&raw.review.state).ok_or_else(|| DecodeError::InvalidField {
        field: "review.state",
        value: raw.review.state.clone(),
    })?;

    Ok(ReviewEvent {
        repo: raw.repository.into_repo_id(),
        pr_number: PrNumber(raw.pull_request.number),
        action: raw.action.as_str().into(),
        body: raw.review.body.unwrap_or_default(),
        state,
        reviewer_login: raw.review.user.login,
    })
}
