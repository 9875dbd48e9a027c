//! Connection registry: one live connection per user.
//!
//! A user reconnecting supersedes their previous registry slot (last write
//! wins); the superseded transport is not force-closed, it just stops being
//! addressable. Deregistration only succeeds for the handle of record, so a
//! late disconnect from a superseded connection cannot evict the newer one.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use super::events::OutboundEvent;

/// Process-unique identifier for one transport connection.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Addressable handle to one live socket connection.
///
/// Cloning is cheap; all clones feed the same per-connection outbound queue,
/// which preserves FIFO delivery order for that connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<OutboundEvent>,
    connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn new(tx: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
            connected_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Enqueue an event for this connection. Returns `false` if the
    /// transport side is already torn down; the caller logs and moves on.
    pub fn send(&self, event: OutboundEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Maps a user id to its single connection of record.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register `handle` as the connection of record for `user_id`,
    /// replacing any previous entry. No-op for an empty user id.
    pub fn register(&self, user_id: &str, handle: ConnectionHandle) {
        if user_id.is_empty() {
            debug!("Ignoring registration with empty user id");
            return;
        }
        if let Some(old) = self.connections.insert(user_id.to_string(), handle) {
            debug!(
                user_id,
                superseded = old.id(),
                "Replaced existing connection for user"
            );
        }
    }

    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.connections.get(user_id).map(|entry| entry.clone())
    }

    /// Remove the entry for `user_id` only if the stored handle is
    /// `connection_id`. Returns whether an entry was actually removed,
    /// so a stale disconnect from a superseded connection is a no-op.
    pub fn deregister(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        self.connections
            .remove_if(user_id, |_, handle| handle.id() == connection_id)
            .is_some()
    }

    /// Snapshot of every user id with a live connection.
    pub fn active_user_ids(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Snapshot of every live connection handle, for global broadcast.
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<OutboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    #[test]
    fn at_most_one_connection_per_user() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();

        registry.register("u1", h1.clone());
        registry.register("u1", h2.clone());

        assert_eq!(registry.lookup("u1").unwrap().id(), h2.id());
        assert_eq!(registry.len(), 1);

        // Stale deregistration of the superseded handle is a no-op
        assert!(!registry.deregister("u1", h1.id()));
        assert_eq!(registry.lookup("u1").unwrap().id(), h2.id());

        // Only the handle of record removes the entry
        assert!(registry.deregister("u1", h2.id()));
        assert!(registry.lookup("u1").is_none());
    }

    #[test]
    fn empty_user_id_is_never_registered() {
        let registry = ConnectionRegistry::new();
        let (h, _rx) = handle();
        registry.register("", h);
        assert!(registry.is_empty());
        assert!(registry.active_user_ids().is_empty());
    }

    #[test]
    fn active_user_ids_reflects_registrations() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();

        registry.register("u1", h1);
        registry.register("u2", h2.clone());

        let mut online = registry.active_user_ids();
        online.sort();
        assert_eq!(online, vec!["u1".to_string(), "u2".to_string()]);

        registry.deregister("u2", h2.id());
        assert_eq!(registry.active_user_ids(), vec!["u1".to_string()]);
    }

    #[test]
    fn send_fails_once_receiver_is_dropped() {
        let (h, rx) = handle();
        drop(rx);
        assert!(!h.send(OutboundEvent::OnlineUsers {
            online_user_ids: vec![],
        }));
    }
}
