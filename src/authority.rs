//! The authorization gate consulted before any build is scheduled.
//!
//! An authority answers one question: may `login` affect the repository
//! `job` builds? Answers are booleans, not results. A lookup that fails for
//! any reason is a "no", and the implementation logs why.

use std::collections::HashSet;
use std::future::Future;

use crate::jobs::Job;

/// Decides whether a GitHub user may trigger builds of a job.
///
/// # Example (allow-list for testing)
///
/// ```
/// use pr_triggers::authority::{CollaboratorAuthority, StaticAuthority};
///
/// let authority = StaticAuthority::allow(["alice"]);
/// assert!(authority.allows("alice"));
/// assert!(!authority.allows("mallory"));
/// ```
pub trait CollaboratorAuthority: Send + Sync {
    fn is_authorized(&self, job: &Job, login: &str) -> impl Future<Output = bool> + Send;
}

/// A fixed answer: either everyone, or a set of logins.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthority {
    allowed: Option<HashSet<String>>,
}

impl StaticAuthority {
    /// Authorizes every login.
    pub fn allow_all() -> Self {
        StaticAuthority { allowed: None }
    }

    /// Authorizes exactly these logins (case-insensitively, as GitHub does).
    pub fn allow<I, S>(logins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        StaticAuthority {
            allowed: Some(logins.into_iter().map(|l| l.as_ref().to_lowercase()).collect()),
        }
    }

    /// Authorizes nobody.
    pub fn deny_all() -> Self {
        Self::allow(Vec::<String>::new())
    }

    pub fn allows(&self, login: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) => allowed.contains(&login.to_lowercase()),
        }
    }
}

impl CollaboratorAuthority for StaticAuthority {
    async fn is_authorized(&self, _job: &Job, login: &str) -> bool {
        self.allows(login)
    }
}
