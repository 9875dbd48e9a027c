//! Session-scoped group subscriptions.
//!
//! Tracks which connected users have opted in to a group's real-time events
//! this session. Independent of persisted membership: a persisted member who
//! never sent `joinGroup` is not in here, and everything in here is wiped
//! for a user when their connection goes away.
//!
//! All operations go through one lock so `unsubscribe_all` is atomic with
//! respect to concurrent `subscribe` calls for the same user.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct GroupTracker {
    groups: RwLock<HashMap<String, HashSet<String>>>,
}

impl GroupTracker {
    pub fn new() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Add `user_id` to the group's live-subscriber set. Idempotent.
    /// Returns `true` if the user was not already subscribed.
    pub fn subscribe(&self, group_id: &str, user_id: &str) -> bool {
        self.subscribe_if(group_id, user_id, || true)
    }

    /// Subscribe only if `guard` still holds, evaluated under the tracker
    /// lock. A disconnect that deregisters the user before running
    /// `unsubscribe_all` is thereby serialized against in-flight subscribes:
    /// either the guard observes the user gone, or `unsubscribe_all` runs
    /// after the insert and removes it.
    pub fn subscribe_if(
        &self,
        group_id: &str,
        user_id: &str,
        guard: impl FnOnce() -> bool,
    ) -> bool {
        if group_id.is_empty() || user_id.is_empty() {
            return false;
        }
        let mut groups = self.groups.write();
        if !guard() {
            return false;
        }
        groups
            .entry(group_id.to_string())
            .or_default()
            .insert(user_id.to_string())
    }

    /// Remove `user_id` from every group's subscriber set, returning the
    /// groups it was removed from. Empty sets are dropped.
    pub fn unsubscribe_all(&self, user_id: &str) -> Vec<String> {
        let mut groups = self.groups.write();
        let mut removed_from = Vec::new();
        groups.retain(|group_id, members| {
            if members.remove(user_id) {
                removed_from.push(group_id.clone());
            }
            !members.is_empty()
        });
        removed_from
    }

    /// Snapshot of the group's live subscribers; empty if the group is
    /// unknown.
    pub fn members_of(&self, group_id: &str) -> HashSet<String> {
        self.groups
            .read()
            .get(group_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of groups with at least one live subscriber.
    pub fn live_group_count(&self) -> usize {
        self.groups.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let tracker = GroupTracker::new();
        assert!(tracker.subscribe("g1", "u1"));
        assert!(!tracker.subscribe("g1", "u1"));
        assert_eq!(tracker.members_of("g1").len(), 1);
    }

    #[test]
    fn unsubscribe_all_clears_every_group() {
        let tracker = GroupTracker::new();
        tracker.subscribe("g1", "u1");
        tracker.subscribe("g2", "u1");
        tracker.subscribe("g1", "u2");

        let mut removed = tracker.unsubscribe_all("u1");
        removed.sort();
        assert_eq!(removed, vec!["g1".to_string(), "g2".to_string()]);

        assert!(!tracker.members_of("g1").contains("u1"));
        assert!(!tracker.members_of("g2").contains("u1"));
        assert!(tracker.members_of("g1").contains("u2"));
        // g2 lost its last subscriber and is gone entirely
        assert_eq!(tracker.live_group_count(), 1);
    }

    #[test]
    fn unsubscribe_all_for_unknown_user_is_empty() {
        let tracker = GroupTracker::new();
        tracker.subscribe("g1", "u1");
        assert!(tracker.unsubscribe_all("nobody").is_empty());
        assert_eq!(tracker.members_of("g1").len(), 1);
    }

    #[test]
    fn members_of_unknown_group_is_empty() {
        let tracker = GroupTracker::new();
        assert!(tracker.members_of("missing").is_empty());
    }

    #[test]
    fn guarded_subscribe_respects_the_guard() {
        let tracker = GroupTracker::new();
        assert!(!tracker.subscribe_if("g1", "u1", || false));
        assert!(tracker.members_of("g1").is_empty());

        assert!(tracker.subscribe_if("g1", "u1", || true));
        assert!(tracker.members_of("g1").contains("u1"));
    }

    #[test]
    fn empty_ids_are_rejected() {
        let tracker = GroupTracker::new();
        assert!(!tracker.subscribe("", "u1"));
        assert!(!tracker.subscribe("g1", ""));
        assert_eq!(tracker.live_group_count(), 0);
    }
}
