//! Octocrab clients built per request from a job's GitHub source.
//!
//! Nothing here is cached: each lookup builds a client for the source's API
//! endpoint with the token its credentials id resolves to. Octocrab clients
//! are cheap to build and this keeps every call a plain request/response.

use std::collections::HashMap;
use std::fmt;

use octocrab::Octocrab;

use super::error::AuthorityError;
use crate::jobs::GitHubSource;
use crate::types::RepoId;

/// Tokens by SCM credential id, plus an optional default.
#[derive(Clone, Default)]
pub struct Credentials {
    tokens: HashMap<String, String>,
    default_token: Option<String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_token(mut self, token: impl Into<String>) -> Self {
        self.default_token = Some(token.into());
        self
    }

    pub fn with_token(mut self, credentials_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(credentials_id.into(), token.into());
        self
    }

    /// The token for `source`: its own credentials id first, then the default.
    pub fn token_for(&self, source: &GitHubSource) -> Option<&str> {
        source
            .credentials_id
            .as_deref()
            .and_then(|id| self.tokens.get(id))
            .or(self.default_token.as_ref())
            .map(String::as_str)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.tokens.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("Credentials")
            .field("ids", &ids)
            .field("has_default", &self.default_token.is_some())
            .finish()
    }
}

/// A GitHub API client scoped to one repository.
#[derive(Clone)]
pub struct OctocrabClient {
    client: Octocrab,
    repo: RepoId,
}

impl OctocrabClient {
    pub fn new(client: Octocrab, repo: RepoId) -> Self {
        Self { client, repo }
    }

    /// Builds a client for `source` against its own API endpoint.
    ///
    /// Without a token the client is anonymous; GitHub then refuses the
    /// collaborator query and the lookup fails closed.
    pub fn for_source(source: &GitHubSource, token: Option<&str>) -> Result<Self, AuthorityError> {
        let client_error = |source_err| AuthorityError::Client {
            api_uri: source.api_uri.clone(),
            source: source_err,
        };

        let builder = Octocrab::builder()
            .base_uri(source.api_uri.as_str())
            .map_err(client_error)?;
        let client = match token {
            Some(token) => builder.personal_token(token.to_string()).build(),
            None => builder.build(),
        }
        .map_err(client_error)?;

        Ok(Self::new(
            client,
            RepoId::new(&source.owner, &source.repository),
        ))
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Asks `GET /repos/{owner}/{repo}/collaborators/{login}`.
    ///
    /// GitHub answers 204 for collaborators and 404 otherwise; octocrab maps
    /// those to `Ok(true)` / `Ok(false)`. Anything else is an error.
    pub async fn is_collaborator(&self, login: &str) -> Result<bool, AuthorityError> {
        self.client
            .repos(&self.repo.owner, &self.repo.repo)
            .is_collaborator(login)
            .await
            .map_err(|e| AuthorityError::lookup(self.repo.clone(), e))
    }
}

impl fmt::Debug for OctocrabClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OctocrabClient")
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}
