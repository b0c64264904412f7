//! Trigger declaration and subscription inspection endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::authority::CollaboratorAuthority;
use crate::jobs::Job;
use crate::scheduler::BuildScheduler;
use crate::triggers::lifecycle::Declared;
use crate::triggers::{DeclarationError, TriggerSpec};
use crate::types::{CorrelationKey, JobId};

impl IntoResponse for DeclarationError {
    fn into_response(self) -> Response {
        let status = match &self {
            DeclarationError::InvalidPattern { .. } => StatusCode::BAD_REQUEST,
            DeclarationError::JobIdMismatch { .. } => StatusCode::BAD_REQUEST,
            DeclarationError::DuplicateFamily { .. } => StatusCode::BAD_REQUEST,
            DeclarationError::UnknownJob(_) => StatusCode::NOT_FOUND,
        };
        (status, self.to_string()).into_response()
    }
}

/// Body of `PUT /api/v1/jobs/{job_id}/triggers`.
#[derive(Debug, Deserialize)]
pub struct DeclareRequest {
    pub job: Job,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
}

/// Replaces a job's triggers.
///
/// The job id in the path must equal `job.id` in the body. Ids containing
/// `/` are sent percent-encoded.
pub async fn declare_handler<A, S>(
    State(app_state): State<AppState<A, S>>,
    Path(job_id): Path<String>,
    Json(request): Json<DeclareRequest>,
) -> Result<Json<Declared>, DeclarationError>
where
    A: CollaboratorAuthority + 'static,
    S: BuildScheduler + 'static,
{
    let path = JobId::new(job_id);
    if request.job.id != path {
        return Err(DeclarationError::JobIdMismatch {
            path,
            definition: request.job.id,
        });
    }
    app_state
        .lifecycle()
        .declare(request.job, &request.triggers)
        .map(Json)
}

/// Drops all of a job's triggers. 404 if it never declared any.
pub async fn retract_handler<A, S>(
    State(app_state): State<AppState<A, S>>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, DeclarationError>
where
    A: CollaboratorAuthority + 'static,
    S: BuildScheduler + 'static,
{
    app_state.lifecycle().retract(&JobId::new(job_id))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Subscribers under one key, per family.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionsView {
    pub key: CorrelationKey,
    pub issue_comment: Vec<JobId>,
    pub label_added: Vec<JobId>,
    pub pull_request_review: Vec<JobId>,
}

/// Lists the jobs subscribed to a pull request. Owner and repository are
/// case-insensitive like everywhere else.
pub async fn subscriptions_handler<A, S>(
    State(app_state): State<AppState<A, S>>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
) -> Json<SubscriptionsView>
where
    A: CollaboratorAuthority + 'static,
    S: BuildScheduler + 'static,
{
    let key = CorrelationKey::new(&owner, &repo, number);
    let registries = app_state.registries();
    Json(SubscriptionsView {
        issue_comment: registries.comments.subscribers(&key),
        label_added: registries.labels.subscribers(&key),
        pull_request_review: registries.reviews.subscribers(&key),
        key,
    })
}
