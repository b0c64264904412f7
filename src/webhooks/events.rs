//! Inbound webhook envelopes and the typed events decoded from them.
//!
//! An [`InboundEvent`] is what the transport hands over: an event kind tag,
//! a delivery type and the raw payload text. The decoder turns the three
//! kinds we subscribe to into a [`WebhookEvent`]; everything else is skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{CorrelationKey, PrNumber, RepoId};

// ============================================================================
// Inbound envelope
// ============================================================================

/// The `X-GitHub-Event` tag of a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    IssueComment,
    PullRequest,
    PullRequestReview,
    /// Any kind nobody subscribes to (`push`, `status`, ...).
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::IssueComment => "issue_comment",
            EventKind::PullRequest => "pull_request",
            EventKind::PullRequestReview => "pull_request_review",
            EventKind::Other(kind) => kind,
        }
    }

    /// True for the kinds the dispatcher has subscribers for.
    pub fn is_subscribed(&self) -> bool {
        !matches!(self, EventKind::Other(_))
    }
}

impl From<&str> for EventKind {
    fn from(tag: &str) -> Self {
        match tag {
            "issue_comment" => EventKind::IssueComment,
            "pull_request" => EventKind::PullRequest,
            "pull_request_review" => EventKind::PullRequestReview,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the event source classifies a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryType {
    Created,
    Updated,
    Removed,
    Other,
}

impl DeliveryType {
    /// Only created and updated deliveries can trigger builds.
    pub fn is_processed(self) -> bool {
        matches!(self, DeliveryType::Created | DeliveryType::Updated)
    }
}

/// A raw event as received from the transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Where the event came from (the delivery id for HTTP webhooks).
    pub origin: String,

    pub kind: EventKind,

    pub delivery: DeliveryType,

    /// The JSON payload exactly as delivered.
    pub payload: String,
}

impl InboundEvent {
    pub fn new(
        origin: impl Into<String>,
        kind: impl Into<EventKind>,
        delivery: DeliveryType,
        payload: impl Into<String>,
    ) -> Self {
        InboundEvent {
            origin: origin.into(),
            kind: kind.into(),
            delivery,
            payload: payload.into(),
        }
    }

    /// A freshly created delivery, which is how every HTTP webhook arrives.
    pub fn created(origin: impl Into<String>, kind: impl Into<EventKind>, payload: impl Into<String>) -> Self {
        Self::new(origin, kind, DeliveryType::Created, payload)
    }
}

// ============================================================================
// Decoded events
// ============================================================================

/// A decoded webhook event of one of the three subscribed kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WebhookEvent {
    /// A comment on an issue or on a pull request's conversation tab.
    IssueComment(IssueCommentEvent),

    /// A `pull_request` delivery; only the label-related fields are kept.
    Label(LabelEvent),

    /// A pull request review.
    Review(ReviewEvent),
}

impl WebhookEvent {
    pub fn repo(&self) -> &RepoId {
        match self {
            WebhookEvent::IssueComment(e) => &e.repo,
            WebhookEvent::Label(e) => &e.repo,
            WebhookEvent::Review(e) => &e.repo,
        }
    }

    /// The issue or pull request number the event concerns.
    pub fn number(&self) -> PrNumber {
        match self {
            WebhookEvent::IssueComment(e) => e.issue_number,
            WebhookEvent::Label(e) => e.pr_number,
            WebhookEvent::Review(e) => e.pr_number,
        }
    }

    /// The key subscribers to this event registered under.
    pub fn correlation_key(&self) -> CorrelationKey {
        CorrelationKey::for_repo(self.repo(), self.number())
    }
}

/// Action performed on an issue comment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
    Other(String),
}

impl From<&str> for CommentAction {
    fn from(action: &str) -> Self {
        match action {
            "created" => CommentAction::Created,
            "edited" => CommentAction::Edited,
            "deleted" => CommentAction::Deleted,
            other => CommentAction::Other(other.to_string()),
        }
    }
}

/// An `issue_comment` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentEvent {
    /// The repository, as GitHub spelled it.
    pub repo: RepoId,

    /// The issue number; for pull request comments this is the PR number.
    pub issue_number: PrNumber,

    pub action: CommentAction,

    /// The comment text (empty if GitHub sent none).
    pub body: String,

    /// Login of the comment's author.
    pub author_login: String,
}

/// Action on a pull request. Only label additions matter here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Labeled,
    Unlabeled,
    Other(String),
}

impl From<&str> for PullRequestAction {
    fn from(action: &str) -> Self {
        match action {
            "labeled" => PullRequestAction::Labeled,
            "unlabeled" => PullRequestAction::Unlabeled,
            other => PullRequestAction::Other(other.to_string()),
        }
    }
}

/// A `pull_request` event reduced to what label triggers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEvent {
    pub repo: RepoId,

    pub pr_number: PrNumber,

    pub action: PullRequestAction,

    /// The label added or removed. Always present for `labeled` and
    /// `unlabeled`; absent for other actions.
    pub label: Option<String>,

    /// Login of the user who performed the action (the delivery's sender).
    pub actor_login: String,
}

/// Action on a pull request review.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Submitted,
    Edited,
    Dismissed,
    Other(String),
}

impl From<&str> for ReviewAction {
    fn from(action: &str) -> Self {
        match action {
            "submitted" => ReviewAction::Submitted,
            "edited" => ReviewAction::Edited,
            "dismissed" => ReviewAction::Dismissed,
            other => ReviewAction::Other(other.to_string()),
        }
    }
}

/// State of a pull request review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

impl ReviewState {
    pub const ALL: [ReviewState; 5] = [
        ReviewState::Approved,
        ReviewState::ChangesRequested,
        ReviewState::Commented,
        ReviewState::Dismissed,
        ReviewState::Pending,
    ];

    /// Lowercase form; this is what review triggers are configured with.
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes_requested",
            ReviewState::Commented => "commented",
            ReviewState::Dismissed => "dismissed",
            ReviewState::Pending => "pending",
        }
    }

    /// GitHub's REST spelling, e.g. `CHANGES_REQUESTED`.
    pub fn api_name(self) -> &'static str {
        match self {
            ReviewState::Approved => "APPROVED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::Commented => "COMMENTED",
            ReviewState::Dismissed => "DISMISSED",
            ReviewState::Pending => "PENDING",
        }
    }

    /// Parses either spelling, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        ReviewState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `pull_request_review` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub repo: RepoId,

    pub pr_number: PrNumber,

    pub action: ReviewAction,

    /// The review's summary text (empty if none).
    pub body: String,

    pub state: ReviewState,

    /// Login of the review's author (`review.user.login`), not the
    /// delivery's `sender`. The two differ when someone other than the
    /// reviewer edits a review; authorization and `GITHUB_REVIEW_AUTHOR`
    /// follow the reviewer.
    pub reviewer_login: String,
}
