//! Match rules a job attaches to its subscriptions.
//!
//! Each trigger family has one predicate type. The dispatcher re-applies the
//! subscriber's predicate to every event found under its key; registration
//! alone says nothing about content.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use super::TriggerFamily;
use super::registry::{Registries, SubscriptionRegistry};
use crate::webhooks::ReviewState;

/// A pattern failed to compile.
#[derive(Debug, Error)]
#[error("invalid pattern {pattern:?}: {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

/// A per-family match rule.
pub trait TriggerPredicate: Clone + fmt::Debug + Send + Sync + 'static {
    /// The family whose registry holds subscriptions with this predicate.
    const FAMILY: TriggerFamily;

    /// What the predicate is evaluated against.
    type Subject: ?Sized;

    fn matches(&self, subject: &Self::Subject) -> bool;

    /// This family's registry out of the set.
    fn registry(registries: &Registries) -> &SubscriptionRegistry<Self>;
}

/// A regular expression that must match the whole subject.
///
/// `find`/`is_match` search; we anchor the compiled form instead so that
/// `"test.*"` accepts `"test this"` but not `"please test this"`.
#[derive(Clone)]
struct FullMatch {
    source: String,
    anchored: Regex,
}

impl FullMatch {
    fn new(pattern: &str) -> Result<Self, PatternError> {
        let invalid = |source| PatternError {
            pattern: pattern.to_string(),
            source,
        };
        // The bare pattern must parse on its own, or `a)|(b` would escape
        // the anchoring group.
        Regex::new(pattern).map_err(invalid)?;
        let anchored = Regex::new(&format!(r"\A(?:{pattern})\z")).map_err(invalid)?;
        Ok(FullMatch {
            source: pattern.to_string(),
            anchored,
        })
    }

    fn is_full_match(&self, text: &str) -> bool {
        self.anchored.is_match(text)
    }
}

impl fmt::Debug for FullMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.source)
    }
}

impl PartialEq for FullMatch {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for FullMatch {}

/// Matches comment bodies against a full-match regular expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPattern(FullMatch);

impl CommentPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        FullMatch::new(pattern).map(CommentPattern)
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.0.source
    }
}

impl TriggerPredicate for CommentPattern {
    const FAMILY: TriggerFamily = TriggerFamily::IssueComment;
    type Subject = str;

    fn matches(&self, body: &str) -> bool {
        self.0.is_full_match(body)
    }

    fn registry(registries: &Registries) -> &SubscriptionRegistry<Self> {
        &registries.comments
    }
}

/// Matches added label names against a full-match regular expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPattern(FullMatch);

impl LabelPattern {
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        FullMatch::new(pattern).map(LabelPattern)
    }

    pub fn as_str(&self) -> &str {
        &self.0.source
    }
}

impl TriggerPredicate for LabelPattern {
    const FAMILY: TriggerFamily = TriggerFamily::LabelAdded;
    type Subject = str;

    fn matches(&self, label: &str) -> bool {
        self.0.is_full_match(label)
    }

    fn registry(registries: &Registries) -> &SubscriptionRegistry<Self> {
        &registries.labels
    }
}

/// Accepts reviews whose state is in a configured set, or any review when
/// no set is configured.
///
/// States are held lowercase and compared to [`ReviewState::as_str`]. A
/// configured name that is not a GitHub state is kept and simply never
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewStateSet {
    states: Option<BTreeSet<String>>,
}

impl ReviewStateSet {
    /// Matches every review.
    pub fn any() -> Self {
        ReviewStateSet { states: None }
    }

    pub fn of<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ReviewStateSet {
            states: Some(
                states
                    .into_iter()
                    .map(|s| s.as_ref().trim().to_lowercase())
                    .collect(),
            ),
        }
    }

    /// The configured states, or `None` for "any".
    pub fn states(&self) -> Option<&BTreeSet<String>> {
        self.states.as_ref()
    }
}

impl fmt::Display for ReviewStateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.states {
            None => f.write_str("any"),
            Some(states) => {
                let names: Vec<&str> = states.iter().map(String::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

impl TriggerPredicate for ReviewStateSet {
    const FAMILY: TriggerFamily = TriggerFamily::PullRequestReview;
    type Subject = ReviewState;

    fn matches(&self, state: &ReviewState) -> bool {
        match &self.states {
            None => true,
            Some(states) => states.contains(state.as_str()),
        }
    }

    fn registry(registries: &Registries) -> &SubscriptionRegistry<Self> {
        &registries.reviews
    }
}
