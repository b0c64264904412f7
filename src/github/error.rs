//! Errors from collaborator lookups.
//!
//! None of these reach a caller of the dispatcher: the authority logs them
//! and answers "not authorized". They are typed so the log says which step
//! failed.

use thiserror::Error;

use crate::types::RepoId;

#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The job resolves to no GitHub repository to ask about.
    #[error("job {0} has no GitHub source")]
    NoGitHubSource(String),

    /// The client for the source's API endpoint could not be built.
    #[error("cannot build client for {api_uri}: {source}")]
    Client {
        api_uri: String,
        #[source]
        source: octocrab::Error,
    },

    /// The collaborator query itself failed (network, auth, rate limit, ...).
    #[error("collaborator lookup on {repo} failed{}: {source}", status_suffix(.status_code))]
    Lookup {
        repo: RepoId,
        status_code: Option<u16>,
        #[source]
        source: octocrab::Error,
    },
}

impl AuthorityError {
    pub(crate) fn lookup(repo: RepoId, source: octocrab::Error) -> Self {
        AuthorityError::Lookup {
            repo,
            status_code: status_code(&source),
            source,
        }
    }
}

fn status_suffix(status_code: &Option<u16>) -> String {
    status_code
        .map(|code| format!(" (HTTP {code})"))
        .unwrap_or_default()
}

/// The HTTP status of a failed request, when GitHub answered at all.
fn status_code(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}
