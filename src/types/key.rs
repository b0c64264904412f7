//! The correlation key joining webhook traffic to job subscriptions.
//!
//! Both sides of the join derive their key through [`CorrelationKey::new`]:
//! the registration path from a job's GitHub source and pull request head,
//! the dispatch path from the webhook payload. Any second derivation would
//! be free to drift (e.g. forget to case-fold) and silently stop matching,
//! so the fields are private and there is no other constructor.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{PrNumber, RepoId};

/// Normalized `(owner, repository, pull request number)`.
///
/// Owner and repository are case-folded; the number is compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CorrelationKey {
    owner: String,
    repository: String,
    number: PrNumber,
}

impl CorrelationKey {
    /// Derives the key. This is the only place normalization happens.
    pub fn new(owner: &str, repository: &str, number: impl Into<PrNumber>) -> Self {
        CorrelationKey {
            owner: owner.to_lowercase(),
            repository: repository.to_lowercase(),
            number: number.into(),
        }
    }

    /// Derives the key for a pull request in `repo`.
    pub fn for_repo(repo: &RepoId, number: impl Into<PrNumber>) -> Self {
        Self::new(&repo.owner, &repo.repo, number)
    }

    /// The case-folded repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The case-folded repository name.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn number(&self) -> PrNumber {
        self.number
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repository, self.number.0)
    }
}

// Deserialization goes through `new` so a key read from JSON is normalized too.
impl<'de> Deserialize<'de> for CorrelationKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawKey {
            owner: String,
            repository: String,
            number: PrNumber,
        }

        let raw = RawKey::deserialize(deserializer)?;
        Ok(CorrelationKey::new(&raw.owner, &raw.repository, raw.number))
    }
}
