//! Decides, per recipient, whether real-time delivery can be relied on or
//! a push notification is needed instead.
//!
//! A pure predicate over the connection registry; it performs no I/O. A
//! false positive silently drops a push, a false negative sends a redundant
//! one, so this is the one place outside the realtime module that reads
//! registry state.

use std::sync::Arc;

use crate::realtime::ConnectionRegistry;

#[derive(Clone)]
pub struct FallbackSelector {
    registry: Arc<ConnectionRegistry>,
}

impl FallbackSelector {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Whether the user currently has a live connection.
    pub fn is_reachable(&self, user_id: &str) -> bool {
        self.registry.lookup(user_id).is_some()
    }

    /// Filter a candidate recipient list down to the users who need the
    /// push fallback.
    pub fn offline_recipients<I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates
            .into_iter()
            .filter(|user_id| !self.is_reachable(user_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ConnectionHandle;

    #[test]
    fn reachability_follows_the_registry() {
        let registry = Arc::new(ConnectionRegistry::new());
        let selector = FallbackSelector::new(registry.clone());

        assert!(!selector.is_reachable("u1"));

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(tx);
        let id = handle.id();
        registry.register("u1", handle);
        assert!(selector.is_reachable("u1"));

        registry.deregister("u1", id);
        assert!(!selector.is_reachable("u1"));
    }

    #[test]
    fn offline_recipients_filters_out_connected_users() {
        let registry = Arc::new(ConnectionRegistry::new());
        let selector = FallbackSelector::new(registry.clone());

        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        registry.register("online", ConnectionHandle::new(tx));

        let offline = selector.offline_recipients(vec![
            "online".to_string(),
            "offline-1".to_string(),
            "offline-2".to_string(),
        ]);
        assert_eq!(
            offline,
            vec!["offline-1".to_string(), "offline-2".to_string()]
        );
    }
}
