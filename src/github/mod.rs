//! GitHub API access: credentials, clients and the collaborator authority.

mod client;
mod collaborators;
mod error;

pub use client::{Credentials, OctocrabClient};
pub use collaborators::GitHubCollaboratorAuthority;
pub use error::AuthorityError;
