//! Core domain types shared by the registry, decoder and dispatcher.

pub mod ids;
pub mod key;

pub use ids::{DeliveryId, JobId, PrNumber, RepoId};
pub use key::CorrelationKey;
