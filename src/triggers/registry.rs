//! Per-family subscription registries.
//!
//! A registry maps a [`CorrelationKey`] to the jobs subscribed under it,
//! each with the predicate it subscribed with. All three operations take the
//! key by reference; it was normalized when it was built, so there is no
//! separate normalization step to keep in sync.
//!
//! Mutation is atomic per call under a write lock. `lookup` copies the
//! subscriber set out under a read lock, so callers iterate a snapshot and
//! never hold the lock across the authorization or scheduling awaits.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::predicate::{CommentPattern, LabelPattern, ReviewStateSet, TriggerPredicate};
use super::TriggerFamily;
use crate::jobs::JobRef;
use crate::types::{CorrelationKey, JobId};

/// A job subscribed under some key, with the predicate it subscribed with.
#[derive(Debug, Clone)]
pub struct Subscription<P> {
    pub job: JobRef,
    pub predicate: P,
}

/// Concurrent `key -> {job -> predicate}` map for one trigger family.
#[derive(Debug)]
pub struct SubscriptionRegistry<P> {
    entries: RwLock<HashMap<CorrelationKey, HashMap<JobId, Subscription<P>>>>,
}

impl<P> Default for SubscriptionRegistry<P> {
    fn default() -> Self {
        SubscriptionRegistry {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<P: TriggerPredicate> SubscriptionRegistry<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn family(&self) -> TriggerFamily {
        P::FAMILY
    }

    // Every mutation leaves the map consistent, so a panic elsewhere while
    // holding the lock cannot leave a half-applied update behind.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CorrelationKey, HashMap<JobId, Subscription<P>>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CorrelationKey, HashMap<JobId, Subscription<P>>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes `job` under `key`. Returns `false` (and changes nothing)
    /// if the job is already subscribed there.
    pub fn register(&self, key: &CorrelationKey, job: JobRef, predicate: P) -> bool {
        let mut entries = self.write();
        let subscribers = entries.entry(key.clone()).or_default();
        if subscribers.contains_key(&job.id) {
            return false;
        }
        debug!(family = %P::FAMILY, key = %key, job = %job.id, "Registered subscription");
        subscribers.insert(job.id.clone(), Subscription { job, predicate });
        true
    }

    /// Removes `job` from `key`. Returns whether it was subscribed.
    ///
    /// An emptied key stays mapped; lookups treat it like a missing one.
    pub fn unregister(&self, key: &CorrelationKey, job: &JobId) -> bool {
        let mut entries = self.write();
        let removed = entries
            .get_mut(key)
            .and_then(|subscribers| subscribers.remove(job))
            .is_some();
        if removed {
            debug!(family = %P::FAMILY, key = %key, job = %job, "Unregistered subscription");
        }
        removed
    }

    /// A snapshot of the subscribers under `key`, in no particular order.
    pub fn lookup(&self, key: &CorrelationKey) -> Vec<Subscription<P>> {
        self.read()
            .get(key)
            .map(|subscribers| subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of the jobs subscribed under `key`, sorted.
    pub fn subscribers(&self, key: &CorrelationKey) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .read()
            .get(key)
            .map(|subscribers| subscribers.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn is_subscribed(&self, key: &CorrelationKey, job: &JobId) -> bool {
        self.read()
            .get(key)
            .is_some_and(|subscribers| subscribers.contains_key(job))
    }

    /// Total number of subscriptions across all keys.
    pub fn len(&self) -> usize {
        self.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The three family registries. They never share state.
#[derive(Debug, Default)]
pub struct Registries {
    pub comments: SubscriptionRegistry<CommentPattern>,
    pub labels: SubscriptionRegistry<LabelPattern>,
    pub reviews: SubscriptionRegistry<ReviewStateSet>,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry for predicate type `P`.
    pub fn of<P: TriggerPredicate>(&self) -> &SubscriptionRegistry<P> {
        P::registry(self)
    }
}
