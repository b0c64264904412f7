//! HTTP server for the trigger service.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 202 Accepted)
//! - `PUT /api/v1/jobs/{job_id}/triggers` - Declares a job's triggers
//! - `DELETE /api/v1/jobs/{job_id}/triggers` - Retracts a job's triggers
//! - `GET /api/v1/subscriptions/{owner}/{repo}/{number}` - Lists subscribers
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod health;
pub mod triggers;
pub mod webhook;

pub use health::health_handler;
pub use triggers::{declare_handler, retract_handler, subscriptions_handler};
pub use webhook::webhook_handler;

use crate::authority::CollaboratorAuthority;
use crate::dispatch::EventDispatcher;
use crate::scheduler::BuildScheduler;
use crate::triggers::{Registries, TriggerLifecycle};
use crate::webhooks::WebhookSecret;

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor. The
/// dispatcher and the lifecycle share one set of registries: the lifecycle
/// writes them, the dispatcher reads them.
pub struct AppState<A, S> {
    inner: Arc<AppStateInner<A, S>>,
}

struct AppStateInner<A, S> {
    dispatcher: EventDispatcher<A, S>,
    lifecycle: TriggerLifecycle,
    webhook_secret: Option<WebhookSecret>,
}

// Manual impl: deriving would require `A: Clone, S: Clone`.
impl<A, S> Clone for AppState<A, S> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, S> AppState<A, S>
where
    A: CollaboratorAuthority,
    S: BuildScheduler,
{
    /// Wires the lifecycle to the dispatcher's registries.
    pub fn new(dispatcher: EventDispatcher<A, S>, webhook_secret: Option<WebhookSecret>) -> Self {
        let lifecycle = TriggerLifecycle::new(Arc::clone(dispatcher.registries()));
        AppState {
            inner: Arc::new(AppStateInner {
                dispatcher,
                lifecycle,
                webhook_secret,
            }),
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher<A, S> {
        &self.inner.dispatcher
    }

    pub fn lifecycle(&self) -> &TriggerLifecycle {
        &self.inner.lifecycle
    }

    pub fn registries(&self) -> &Registries {
        self.inner.dispatcher.registries()
    }

    /// `None` when signature checks are disabled.
    pub fn webhook_secret(&self) -> Option<&WebhookSecret> {
        self.inner.webhook_secret.as_ref()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<A, S>(app_state: AppState<A, S>) -> axum::Router
where
    A: CollaboratorAuthority + 'static,
    S: BuildScheduler + 'static,
{
    use axum::routing::{get, post, put};

    axum::Router::new()
        .route("/webhook", post(webhook_handler::<A, S>))
        .route(
            "/api/v1/jobs/{job_id}/triggers",
            put(declare_handler::<A, S>).delete(retract_handler::<A, S>),
        )
        .route(
            "/api/v1/subscriptions/{owner}/{repo}/{number}",
            get(subscriptions_handler::<A, S>),
        )
        .route("/health", get(health_handler))
        .with_state(app_state)
}
