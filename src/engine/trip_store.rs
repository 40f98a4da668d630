//! Per-user trip storage.
//!
//! Holds the validated trip records for each user ahead of
//! classification. Users are kept in sorted order so batch runs are
//! deterministic.

use std::collections::BTreeMap;

use crate::TripRecord;

/// Storage for users' trip records.
#[derive(Debug, Clone, Default)]
pub struct TripStore {
    users: BTreeMap<String, Vec<TripRecord>>,
}

impl TripStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one trip for a user.
    pub fn add(&mut self, user_id: &str, trip: TripRecord) {
        self.users.entry(user_id.to_string()).or_default().push(trip);
    }

    /// Add multiple trips for a user.
    pub fn add_many(&mut self, user_id: &str, trips: Vec<TripRecord>) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .extend(trips);
    }

    /// Remove a user and all their trips.
    ///
    /// Returns the removed trips if the user existed.
    pub fn remove_user(&mut self, user_id: &str) -> Option<Vec<TripRecord>> {
        self.users.remove(user_id)
    }

    /// Clear all users.
    pub fn clear(&mut self) {
        self.users.clear();
    }

    /// Get a user's trips.
    pub fn get(&self, user_id: &str) -> Option<&[TripRecord]> {
        self.users.get(user_id).map(|trips| trips.as_slice())
    }

    /// Check whether a user exists.
    pub fn contains(&self, user_id: &str) -> bool {
        self.users.contains_key(user_id)
    }

    /// Iterate over user ids in sorted order.
    pub fn user_ids(&self) -> impl Iterator<Item = &String> {
        self.users.keys()
    }

    /// Iterate over (user id, trips) pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<TripRecord>)> {
        self.users.iter()
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Check if the store has no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Total number of trips across all users.
    pub fn trip_count(&self) -> usize {
        self.users.values().map(|trips| trips.len()).sum()
    }
}
