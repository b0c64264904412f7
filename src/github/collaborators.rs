//! Collaborator-based authorization against the GitHub API.

use tracing::debug;

use super::client::{Credentials, OctocrabClient};
use super::error::AuthorityError;
use crate::authority::CollaboratorAuthority;
use crate::jobs::Job;

/// Authorizes a login iff it is a collaborator on the job's repository.
#[derive(Debug, Clone, Default)]
pub struct GitHubCollaboratorAuthority {
    credentials: Credentials,
}

impl GitHubCollaboratorAuthority {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// The lookup with its failure reasons intact.
    pub async fn check(&self, job: &Job, login: &str) -> Result<bool, AuthorityError> {
        let source = job
            .github_source()
            .ok_or_else(|| AuthorityError::NoGitHubSource(job.id.to_string()))?;
        let client = OctocrabClient::for_source(source, self.credentials.token_for(source))?;
        client.is_collaborator(login).await
    }
}

impl CollaboratorAuthority for GitHubCollaboratorAuthority {
    async fn is_authorized(&self, job: &Job, login: &str) -> bool {
        match self.check(job, login).await {
            Ok(is_collaborator) => is_collaborator,
            Err(e) => {
                debug!(job = %job.id, login = %login, error = %e, "Collaborator lookup failed, denying");
                false
            }
        }
    }
}
