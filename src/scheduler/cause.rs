//! Why a build was scheduled, and what it gets in its environment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::webhooks::ReviewState;

/// `GITHUB_COMMENT`: body of the triggering comment.
pub const GITHUB_COMMENT: &str = "GITHUB_COMMENT";
/// `GITHUB_COMMENT_AUTHOR`: login of the comment's author.
pub const GITHUB_COMMENT_AUTHOR: &str = "GITHUB_COMMENT_AUTHOR";
/// `GITHUB_LABEL_ADDED`: name of the added label.
pub const GITHUB_LABEL_ADDED: &str = "GITHUB_LABEL_ADDED";
/// `GITHUB_REVIEW_COMMENT`: summary text of the review.
pub const GITHUB_REVIEW_COMMENT: &str = "GITHUB_REVIEW_COMMENT";
/// `GITHUB_REVIEW_AUTHOR`: login of the reviewer.
pub const GITHUB_REVIEW_AUTHOR: &str = "GITHUB_REVIEW_AUTHOR";
/// `GITHUB_REVIEW_STATE`: review state in GitHub's uppercase spelling.
pub const GITHUB_REVIEW_STATE: &str = "GITHUB_REVIEW_STATE";

/// The event that caused a build, as recorded on the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Cause {
    IssueComment {
        user_login: String,
        comment: String,
        /// The pattern the comment matched.
        comment_pattern: String,
    },
    LabelAdded {
        user_login: String,
        label: String,
    },
    PullRequestReview {
        user_login: String,
        state: ReviewState,
        comment: String,
        /// The configured state set, rendered (`any` when unset).
        review_states: String,
    },
}

impl Cause {
    /// One line for build listings.
    pub fn short_description(&self) -> String {
        match self {
            Cause::IssueComment {
                user_login, comment, ..
            } => format!("{user_login} commented: {comment}"),
            Cause::LabelAdded { user_login, label } => format!("{user_login} added label {label}"),
            Cause::PullRequestReview {
                user_login, state, ..
            } => format!("{user_login} reviewed: {state}"),
        }
    }

    pub fn user_login(&self) -> &str {
        match self {
            Cause::IssueComment { user_login, .. }
            | Cause::LabelAdded { user_login, .. }
            | Cause::PullRequestReview { user_login, .. } => user_login,
        }
    }

    /// The parameters this cause contributes to the build environment.
    pub fn parameters(&self) -> BuildParameters {
        match self {
            Cause::IssueComment {
                user_login, comment, ..
            } => BuildParameters::new()
                .with(GITHUB_COMMENT, comment)
                .with(GITHUB_COMMENT_AUTHOR, user_login),
            Cause::LabelAdded { label, .. } => BuildParameters::new().with(GITHUB_LABEL_ADDED, label),
            Cause::PullRequestReview {
                user_login,
                state,
                comment,
                ..
            } => BuildParameters::new()
                .with(GITHUB_REVIEW_COMMENT, comment)
                .with(GITHUB_REVIEW_AUTHOR, user_login)
                .with(GITHUB_REVIEW_STATE, state.api_name()),
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_description())
    }
}

/// Ordered name/value pairs injected into a build's environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildParameters(Vec<(String, String)>);

impl BuildParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, replacing an earlier one with the same name in place.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts every parameter into `env`, overriding existing entries.
    pub fn contribute(&self, env: &mut HashMap<String, String>) {
        for (name, value) in &self.0 {
            env.insert(name.clone(), value.clone());
        }
    }

    /// Sets every parameter on a process about to be spawned.
    pub fn apply_to(&self, command: &mut tokio::process::Command) {
        command.envs(self.iter());
    }
}
