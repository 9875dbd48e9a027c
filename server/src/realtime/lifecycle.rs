//! Connection lifecycle: handshake, group join, disconnect.
//!
//! Owns the registry, the group tracker, and the router as one injectable
//! state object instead of process-wide globals, so the whole presence
//! subsystem can be constructed per test.

use std::sync::Arc;
use tracing::{debug, info};

use super::groups::GroupTracker;
use super::presence::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use super::router::EventRouter;

pub struct RealtimeState {
    pub registry: Arc<ConnectionRegistry>,
    pub groups: Arc<GroupTracker>,
    pub router: EventRouter,
}

impl RealtimeState {
    pub fn new() -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let groups = Arc::new(GroupTracker::new());
        let router = EventRouter::new(registry.clone(), groups.clone());
        Self {
            registry,
            groups,
            router,
        }
    }

    /// Handshake: register the connection and announce the new roster.
    /// Returns `false` for an empty user id — the connection stays open but
    /// is never addressable (inert).
    pub fn connect(&self, user_id: &str, handle: ConnectionHandle) -> bool {
        if user_id.is_empty() {
            debug!("Connection without user id accepted but not registered");
            return false;
        }
        let connection_id = handle.id();
        self.registry.register(user_id, handle);
        metrics::gauge!("ws_connections_active", self.registry.len() as f64);
        info!(user_id, connection_id, "Connection registered");
        self.router.broadcast_presence();
        true
    }

    /// Subscribe the user to a group's live events. A first-time join is
    /// announced to the group's other subscribers; a repeat join is silent.
    /// The subscription only takes if the user is still registered, so a
    /// join racing a disconnect cannot leave membership behind.
    pub fn join_group(&self, group_id: &str, user_id: &str) {
        let still_connected = || self.registry.lookup(user_id).is_some();
        if self.groups.subscribe_if(group_id, user_id, still_connected) {
            debug!(user_id, group_id, "User joined group session");
            self.router.group_notification(
                group_id,
                &format!("{user_id} joined the conversation"),
                Some(user_id),
            );
        }
    }

    /// Transport-level disconnect. Cleanup only runs when this connection
    /// is still the one of record: a late disconnect from a superseded
    /// connection must not tear down the state the newer connection built.
    pub fn disconnect(&self, user_id: &str, connection_id: ConnectionId) {
        if !self.registry.deregister(user_id, connection_id) {
            debug!(user_id, connection_id, "Stale disconnect ignored");
            return;
        }
        metrics::gauge!("ws_connections_active", self.registry.len() as f64);

        let left_groups = self.groups.unsubscribe_all(user_id);
        for group_id in &left_groups {
            self.router.group_notification(
                group_id,
                &format!("{user_id} left the conversation"),
                None,
            );
        }
        info!(
            user_id,
            connection_id,
            groups_left = left_groups.len(),
            "Connection closed"
        );
        self.router.broadcast_presence();
    }
}

impl Default for RealtimeState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::OutboundEvent;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connect(state: &RealtimeState, user_id: &str) -> (ConnectionId, UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(tx);
        let id = handle.id();
        assert!(state.connect(user_id, handle));
        (id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn connect_broadcasts_presence_to_everyone() {
        let state = RealtimeState::new();
        let (_, mut rx_a) = connect(&state, "a");
        let (_, mut rx_b) = connect(&state, "b");

        // a saw its own roster, then the roster including b
        let events_a = drain(&mut rx_a);
        assert_eq!(events_a.len(), 2);
        // b saw only the second broadcast
        assert_eq!(drain(&mut rx_b).len(), 1);
    }

    #[test]
    fn inert_connection_is_not_registered() {
        let state = RealtimeState::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        assert!(!state.connect("", ConnectionHandle::new(tx)));
        assert!(state.registry.is_empty());
    }

    #[test]
    fn disconnect_cleans_up_groups_and_notifies_remaining_subscribers() {
        let state = RealtimeState::new();
        let (id_a, mut rx_a) = connect(&state, "a");
        let (_, mut rx_b) = connect(&state, "b");
        state.join_group("g1", "a");
        state.join_group("g1", "b");
        state.join_group("g2", "a");
        drain(&mut rx_a);
        drain(&mut rx_b);

        state.disconnect("a", id_a);

        assert!(state.registry.lookup("a").is_none());
        assert!(!state.groups.members_of("g1").contains("a"));
        assert!(state.groups.members_of("g2").is_empty());

        let events_b = drain(&mut rx_b);
        // "a left" for g1 plus the presence broadcast; g2 had no one left
        assert!(events_b.iter().any(|e| matches!(
            e,
            OutboundEvent::GroupNotification { group_id, text }
                if group_id == "g1" && text.contains("left")
        )));
        assert!(events_b.iter().any(|e| matches!(
            e,
            OutboundEvent::OnlineUsers { online_user_ids }
                if online_user_ids == &vec!["b".to_string()]
        )));
    }

    #[test]
    fn superseded_disconnect_leaves_newer_connection_intact() {
        let state = RealtimeState::new();
        let (old_id, _old_rx) = connect(&state, "a");
        let (_, mut new_rx) = connect(&state, "a");
        state.join_group("g1", "a");
        drain(&mut new_rx);

        // The old transport's disconnect arrives after the reconnect
        state.disconnect("a", old_id);

        assert!(state.registry.lookup("a").is_some());
        assert!(state.groups.members_of("g1").contains("a"));
        // No presence broadcast was triggered by the stale disconnect
        assert!(drain(&mut new_rx).is_empty());
    }

    #[test]
    fn join_after_disconnect_does_not_subscribe() {
        let state = RealtimeState::new();
        let (id_a, _rx_a) = connect(&state, "a");
        state.disconnect("a", id_a);

        state.join_group("g1", "a");
        assert!(state.groups.members_of("g1").is_empty());
    }

    #[test]
    fn first_join_is_announced_to_others_only() {
        let state = RealtimeState::new();
        let (_, mut rx_a) = connect(&state, "a");
        let (_, mut rx_b) = connect(&state, "b");
        state.join_group("g1", "a");
        drain(&mut rx_a);
        drain(&mut rx_b);

        state.join_group("g1", "b");

        let events_a = drain(&mut rx_a);
        assert_eq!(events_a.len(), 1);
        assert!(matches!(
            &events_a[0],
            OutboundEvent::GroupNotification { text, .. } if text.contains("joined")
        ));
        assert!(drain(&mut rx_b).is_empty());

        // Repeat join is silent
        state.join_group("g1", "b");
        assert!(drain(&mut rx_a).is_empty());
    }
}
