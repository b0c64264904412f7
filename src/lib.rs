//! PR Triggers - Starts CI builds from GitHub pull request comments, labels and reviews.
//!
//! Jobs declare triggers; each trigger subscribes the job under the pull
//! request it builds. Webhook events are decoded, routed to the subscribers
//! under the event's pull request, filtered by predicate and by the actor's
//! collaborator status, and turned into parameterized builds.

pub mod authority;
pub mod config;
pub mod dispatch;
pub mod github;
pub mod jobs;
pub mod scheduler;
pub mod server;
pub mod triggers;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
