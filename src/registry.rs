//! In-memory tracker registry
//!
//! Map of owner -> tracker id -> tracker behind a single `parking_lot::RwLock`.
//! Only state mutation happens under the lock; callers do their I/O (balance
//! lookups, notifications, storage) with the lock released and come back with
//! a check-before-write through [`TrackerRegistry::update`].

use crate::error::{TrackerError, TrackerResult};
use crate::models::{Tracker, TrackerKey};
use crate::roles::Quota;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

type OwnerMap = HashMap<String, Tracker>;

/// Registry of live trackers
#[derive(Default)]
pub struct TrackerRegistry {
    owners: RwLock<HashMap<String, OwnerMap>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new tracker after checking uniqueness and the owner's quota
    ///
    /// Both checks and the insert happen under one write lock, so two racing
    /// starts for the same owner cannot both slip under the quota.
    pub fn insert(&self, tracker: Tracker, quota: Quota) -> TrackerResult<()> {
        let mut owners = self.owners.write();
        let owned = owners.entry(tracker.owner.clone()).or_default();

        if owned.contains_key(&tracker.tracker_id) {
            return Err(TrackerError::DuplicateTracker {
                tracker_id: tracker.tracker_id,
            });
        }

        if !quota.allows(owned.len()) {
            // Don't leave an empty owner entry behind
            let limit = quota.limit().unwrap_or(0);
            if owned.is_empty() {
                owners.remove(&tracker.owner);
            }
            return Err(TrackerError::QuotaExceeded { limit });
        }

        owned.insert(tracker.tracker_id.clone(), tracker);
        Ok(())
    }

    /// Insert a tracker loaded from a snapshot (no quota check)
    ///
    /// Returns false when the key is already present.
    pub fn restore(&self, tracker: Tracker) -> bool {
        let mut owners = self.owners.write();
        let owned = owners.entry(tracker.owner.clone()).or_default();
        if owned.contains_key(&tracker.tracker_id) {
            return false;
        }
        owned.insert(tracker.tracker_id.clone(), tracker);
        true
    }

    /// Remove a tracker; `None` if it was already gone
    pub fn remove(&self, owner: &str, tracker_id: &str) -> Option<Tracker> {
        let mut owners = self.owners.write();
        let owned = owners.get_mut(owner)?;
        let removed = owned.remove(tracker_id);
        if owned.is_empty() {
            owners.remove(owner);
        }
        removed
    }

    /// Remove a tracker only while `keep` says it is still the one expected
    ///
    /// Guards callers that awaited between reading a tracker and removing it
    /// against deleting a tracker re-created under the same key meanwhile.
    pub fn remove_if(
        &self,
        owner: &str,
        tracker_id: &str,
        keep: impl FnOnce(&Tracker) -> bool,
    ) -> Option<Tracker> {
        let mut owners = self.owners.write();
        let owned = owners.get_mut(owner)?;
        if !keep(owned.get(tracker_id)?) {
            return None;
        }
        let removed = owned.remove(tracker_id);
        if owned.is_empty() {
            owners.remove(owner);
        }
        removed
    }

    pub fn get(&self, owner: &str, tracker_id: &str) -> Option<Tracker> {
        self.owners.read().get(owner)?.get(tracker_id).cloned()
    }

    pub fn contains(&self, key: &TrackerKey) -> bool {
        self.owners
            .read()
            .get(&key.owner)
            .map(|owned| owned.contains_key(&key.tracker_id))
            .unwrap_or(false)
    }

    /// Apply `f` to a live tracker; `None` if it no longer exists
    pub fn update<R>(
        &self,
        owner: &str,
        tracker_id: &str,
        f: impl FnOnce(&mut Tracker) -> R,
    ) -> Option<R> {
        let mut owners = self.owners.write();
        let tracker = owners.get_mut(owner)?.get_mut(tracker_id)?;
        Some(f(tracker))
    }

    /// Trackers owned by `owner`, ordered by creation time
    pub fn list(&self, owner: &str) -> Vec<Tracker> {
        let mut trackers: Vec<Tracker> = self
            .owners
            .read()
            .get(owner)
            .map(|owned| owned.values().cloned().collect())
            .unwrap_or_default();
        trackers.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.tracker_id.cmp(&b.tracker_id))
        });
        trackers
    }

    pub fn count_for(&self, owner: &str) -> usize {
        self.owners.read().get(owner).map(|o| o.len()).unwrap_or(0)
    }

    /// Copy of every tracker (snapshot source)
    pub fn all(&self) -> Vec<Tracker> {
        self.owners
            .read()
            .values()
            .flat_map(|owned| owned.values().cloned())
            .collect()
    }

    /// Trackers older than `ttl` at `now`
    pub fn expired(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<Tracker> {
        self.owners
            .read()
            .values()
            .flat_map(|owned| owned.values())
            .filter(|t| t.is_expired(now, ttl))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.owners.read().values().map(|o| o.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
