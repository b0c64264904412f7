//! The job model: what a CI job declares about where its code comes from.
//!
//! A job is the unit that subscribes to events and gets builds scheduled.
//! Only two things about it matter to triggering: whether it is backed by a
//! GitHub source (applicability) and whether it builds a pull request head
//! (only those subscribe).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{CorrelationKey, JobId, PrNumber};

/// Default GitHub API endpoint for sources that do not name one.
pub const DEFAULT_API_URI: &str = "https://api.github.com";

/// Shared handle to a job definition.
pub type JobRef = Arc<Job>;

/// A source-control source declared by a job or by the project owning it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScmSource {
    /// A GitHub repository.
    GitHub(GitHubSource),
    /// Any non-GitHub source (plain git, another forge, ...).
    Other {
        /// Free-form description of the source kind.
        kind: String,
    },
}

/// Coordinates and credentials of a GitHub-hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubSource {
    /// REST API root, e.g. `https://api.github.com` or a GHES `/api/v3` URL.
    #[serde(default = "default_api_uri")]
    pub api_uri: String,

    /// Repository owner as configured on the job (any case).
    pub owner: String,

    /// Repository name as configured on the job (any case).
    pub repository: String,

    /// Id of the credential used for API calls on behalf of this source.
    #[serde(default)]
    pub credentials_id: Option<String>,
}

fn default_api_uri() -> String {
    DEFAULT_API_URI.to_string()
}

impl GitHubSource {
    pub fn new(owner: impl Into<String>, repository: impl Into<String>) -> Self {
        GitHubSource {
            api_uri: default_api_uri(),
            owner: owner.into(),
            repository: repository.into(),
            credentials_id: None,
        }
    }

    pub fn with_credentials(mut self, credentials_id: impl Into<String>) -> Self {
        self.credentials_id = Some(credentials_id.into());
        self
    }

    pub fn with_api_uri(mut self, api_uri: impl Into<String>) -> Self {
        self.api_uri = api_uri.into();
        self
    }
}

/// The revision a job builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScmHead {
    /// A branch; such jobs never subscribe to pull request events.
    Branch { name: String },
    /// An open pull request.
    PullRequest { number: PrNumber },
}

/// A CI job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Full job name; the identity used by registries.
    pub id: JobId,

    /// Sources the job declares itself.
    #[serde(default)]
    pub sources: Vec<ScmSource>,

    /// Sources declared by the project that owns the job (e.g. the
    /// multi-branch project a pull request job was generated from).
    #[serde(default)]
    pub parent_sources: Vec<ScmSource>,

    /// The head this job builds.
    pub head: ScmHead,

    /// Program and arguments run when a build starts. Empty means the build
    /// only records its cause.
    #[serde(default)]
    pub command: Vec<String>,
}

impl Job {
    /// Creates a job with no sources and no build command.
    pub fn new(id: impl Into<JobId>, head: ScmHead) -> Self {
        Job {
            id: id.into(),
            sources: Vec::new(),
            parent_sources: Vec::new(),
            head,
            command: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: ScmSource) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_parent_source(mut self, source: ScmSource) -> Self {
        self.parent_sources.push(source);
        self
    }

    pub fn with_command<I, S>(mut self, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = command.into_iter().map(Into::into).collect();
        self
    }

    /// True iff the job or its parent declares at least one GitHub source.
    pub fn is_applicable(&self) -> bool {
        self.github_source().is_some()
    }

    /// The GitHub source the job resolves to: its own first, then its parent's.
    pub fn github_source(&self) -> Option<&GitHubSource> {
        self.sources
            .iter()
            .chain(self.parent_sources.iter())
            .find_map(|source| match source {
                ScmSource::GitHub(github) => Some(github),
                ScmSource::Other { .. } => None,
            })
    }

    /// The pull request this job builds, if it builds one.
    pub fn pull_request(&self) -> Option<PrNumber> {
        match &self.head {
            ScmHead::PullRequest { number } => Some(*number),
            ScmHead::Branch { .. } => None,
        }
    }

    /// The key this job subscribes under: `None` unless it is an applicable
    /// pull request job.
    pub fn correlation_key(&self) -> Option<CorrelationKey> {
        let number = self.pull_request()?;
        let source = self.github_source()?;
        Some(CorrelationKey::new(&source.owner, &source.repository, number))
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        JobId(s)
    }
}
