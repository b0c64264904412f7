//! Webhook intake for GitHub events.
//!
//! This module provides:
//! - The inbound event envelope and the typed events decoded from it
//! - The payload decoder for `issue_comment`, `pull_request` and
//!   `pull_request_review`
//! - Signature verification for webhook payloads (HMAC-SHA256)

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{
    CommentAction, DeliveryType, EventKind, InboundEvent, IssueCommentEvent, LabelEvent,
    PullRequestAction, ReviewAction, ReviewEvent, ReviewState, WebhookEvent,
};
pub use parser::{DecodeError, decode};
pub use signature::{WebhookSecret, parse_signature_header};
