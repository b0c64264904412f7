//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, verifies signatures when a secret is
//! configured, and dispatches the event before answering. The answer is
//! 202 Accepted whatever the dispatch outcome: a delivery nobody cares
//! about, or one that failed to decode, is not the sender's problem.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::authority::CollaboratorAuthority;
use crate::dispatch::DispatchOutcome;
use crate::scheduler::BuildScheduler;
use crate::types::DeliveryId;
use crate::webhooks::InboundEvent;

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Origin recorded for deliveries that carry no delivery id.
const UNKNOWN_ORIGIN: &str = "github";

/// Errors that reject a delivery before dispatch.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidUtf8(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-GitHub-Event` (required): event kind, e.g. `issue_comment`
///   - `X-GitHub-Delivery` (optional): delivery id, recorded as the origin
///   - `X-Hub-Signature-256` (required iff a secret is configured)
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 202 Accepted: dispatched; the body reports what happened
/// - 400 Bad Request: missing event header or non-UTF-8 body
/// - 401 Unauthorized: missing or invalid signature
pub async fn webhook_handler<A, S>(
    State(app_state): State<AppState<A, S>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchOutcome>), WebhookError>
where
    A: CollaboratorAuthority + 'static,
    S: BuildScheduler + 'static,
{
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY)
        .map(DeliveryId::new)
        .unwrap_or_else(|_| DeliveryId::new(UNKNOWN_ORIGIN));

    debug!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        "Received webhook"
    );

    // Signature first: nothing about an unsigned body is looked at.
    if let Some(secret) = app_state.webhook_secret() {
        let signature = get_header(&headers, HEADER_SIGNATURE).map_err(|_| {
            warn!(delivery_id = %delivery_id, "Unsigned webhook rejected");
            WebhookError::InvalidSignature
        })?;
        if !secret.verify(&body, &signature) {
            warn!(delivery_id = %delivery_id, "Invalid webhook signature");
            return Err(WebhookError::InvalidSignature);
        }
    }

    let payload = std::str::from_utf8(&body)?;
    let event = InboundEvent::created(delivery_id.as_str(), event_type.as_str(), payload);

    let outcome = app_state.dispatcher().dispatch(&event).await;

    info!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        scheduled = outcome.scheduled().len(),
        "Webhook dispatched"
    );

    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// Extracts a required header value as a string.
fn get_header(headers: &HeaderMap, name: &'static str) -> Result<String, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or(WebhookError::MissingHeader(name))
}
