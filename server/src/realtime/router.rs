//! Event routing: one inbound event in, zero or more addressed deliveries
//! out.
//!
//! The router resolves logical addressees (a user id, a group's live
//! subscribers, or everyone) to connection handles and enqueues outbound
//! events. Delivery is best-effort and at-most-once: an offline addressee is
//! skipped silently, a torn-down transport is logged and skipped without
//! aborting the rest of a fan-out, and nothing here is ever surfaced to
//! other clients as an error.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::events::OutboundEvent;
use super::groups::GroupTracker;
use super::presence::ConnectionRegistry;

/// Who a seen receipt is about.
#[derive(Debug, Clone)]
pub enum SeenTarget {
    /// Direct conversation: receipt goes to the original sender only.
    Direct { sender_id: String },
    /// Group conversation: receipt goes to the group's live subscribers.
    Group { group_id: String },
}

/// Who a deletion/edit propagates to.
#[derive(Debug, Clone)]
pub enum Audience {
    /// Explicit user set, derived by the caller from the affected messages.
    Users(Vec<String>),
    /// A group's live subscribers.
    Group(String),
}

pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    groups: Arc<GroupTracker>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, groups: Arc<GroupTracker>) -> Self {
        Self { registry, groups }
    }

    /// Deliver a direct message to the receiver and echo it back to the
    /// sender's connection, so the sender's other open views stay in sync.
    pub fn deliver_private(&self, sender_id: &str, receiver_id: &str, message: Value) {
        if sender_id.is_empty() || receiver_id.is_empty() {
            debug!("Dropping private message with missing participant id");
            return;
        }
        let event = OutboundEvent::NewMessage { message };
        self.send_to_user(receiver_id, event.clone());
        if sender_id != receiver_id {
            self.send_to_user(sender_id, event);
        }
    }

    /// Deliver a group message to the group's live subscribers.
    pub fn deliver_group(&self, group_id: &str, message: Value) {
        if group_id.is_empty() {
            debug!("Dropping group message with missing group id");
            return;
        }
        self.broadcast_group(
            group_id,
            OutboundEvent::NewGroupMessage {
                group_id: group_id.to_string(),
                message,
            },
        );
    }

    pub fn typing_started(&self, from_user_id: &str, to_user_id: &str) {
        if from_user_id.is_empty() || to_user_id.is_empty() {
            return;
        }
        self.send_to_user(
            to_user_id,
            OutboundEvent::Typing {
                sender_id: from_user_id.to_string(),
            },
        );
    }

    pub fn typing_stopped(&self, from_user_id: &str, to_user_id: &str) {
        if from_user_id.is_empty() || to_user_id.is_empty() {
            return;
        }
        self.send_to_user(
            to_user_id,
            OutboundEvent::StopTyping {
                sender_id: from_user_id.to_string(),
            },
        );
    }

    pub fn group_typing_started(&self, group_id: &str, user_id: &str, user_name: &str) {
        if group_id.is_empty() || user_id.is_empty() {
            return;
        }
        self.broadcast_group(
            group_id,
            OutboundEvent::GroupTyping {
                group_id: group_id.to_string(),
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
            },
        );
    }

    pub fn group_typing_stopped(&self, group_id: &str, user_id: &str, user_name: &str) {
        if group_id.is_empty() || user_id.is_empty() {
            return;
        }
        self.broadcast_group(
            group_id,
            OutboundEvent::GroupStopTyping {
                group_id: group_id.to_string(),
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
            },
        );
    }

    /// Route a seen receipt: to the original sender for a direct
    /// conversation, to the live subscribers for a group.
    pub fn messages_seen(&self, target: SeenTarget, reader_id: &str) {
        if reader_id.is_empty() {
            return;
        }
        match target {
            SeenTarget::Direct { sender_id } => {
                if sender_id.is_empty() {
                    return;
                }
                self.send_to_user(
                    &sender_id,
                    OutboundEvent::MessagesSeen {
                        seen_by: reader_id.to_string(),
                        from_user: Some(sender_id.clone()),
                        group_id: None,
                    },
                );
            }
            SeenTarget::Group { group_id } => {
                self.broadcast_group(
                    &group_id,
                    OutboundEvent::MessagesSeen {
                        seen_by: reader_id.to_string(),
                        from_user: None,
                        group_id: Some(group_id.clone()),
                    },
                );
            }
        }
    }

    pub fn messages_deleted(&self, audience: Audience, message_ids: Vec<String>) {
        if message_ids.is_empty() {
            return;
        }
        match audience {
            Audience::Users(user_ids) => {
                let event = OutboundEvent::MessagesDeleted {
                    message_ids,
                    group_id: None,
                };
                for user_id in dedup(user_ids) {
                    self.send_to_user(&user_id, event.clone());
                }
            }
            Audience::Group(group_id) => {
                self.broadcast_group(
                    &group_id,
                    OutboundEvent::MessagesDeleted {
                        message_ids,
                        group_id: Some(group_id.clone()),
                    },
                );
            }
        }
    }

    pub fn message_edited(&self, audience: Audience, message_id: &str, body: &str) {
        if message_id.is_empty() {
            return;
        }
        match audience {
            Audience::Users(user_ids) => {
                let event = OutboundEvent::MessageEdited {
                    message_id: message_id.to_string(),
                    body: body.to_string(),
                    group_id: None,
                };
                for user_id in dedup(user_ids) {
                    self.send_to_user(&user_id, event.clone());
                }
            }
            Audience::Group(group_id) => {
                self.broadcast_group(
                    &group_id,
                    OutboundEvent::MessageEdited {
                        message_id: message_id.to_string(),
                        body: body.to_string(),
                        group_id: Some(group_id.clone()),
                    },
                );
            }
        }
    }

    /// Best-effort: subscribers see the change live, everyone else picks it
    /// up on their next fetch.
    pub fn group_updated(&self, group_id: &str, group: Value) {
        if group_id.is_empty() {
            return;
        }
        self.broadcast_group(group_id, OutboundEvent::GroupUpdate { group });
    }

    /// Join/leave system text for a group. `exclude` skips the user the
    /// notification is about.
    pub fn group_notification(&self, group_id: &str, text: &str, exclude: Option<&str>) {
        let event = OutboundEvent::GroupNotification {
            group_id: group_id.to_string(),
            text: text.to_string(),
        };
        self.broadcast_group_filtered(group_id, event, exclude);
    }

    /// Push the full online roster to every live connection.
    pub fn broadcast_presence(&self) {
        let event = OutboundEvent::OnlineUsers {
            online_user_ids: self.registry.active_user_ids(),
        };
        for handle in self.registry.handles() {
            if !handle.send(event.clone()) {
                metrics::counter!("realtime_events_dropped_total", 1);
            } else {
                metrics::counter!("realtime_events_delivered_total", 1);
            }
        }
    }

    /// Deliver to a single user's connection, if any. Offline is an
    /// expected, silent outcome.
    fn send_to_user(&self, user_id: &str, event: OutboundEvent) -> bool {
        match self.registry.lookup(user_id) {
            Some(handle) => {
                if handle.send(event) {
                    metrics::counter!("realtime_events_delivered_total", 1);
                    true
                } else {
                    warn!(user_id, "Dropped event for torn-down connection");
                    metrics::counter!("realtime_events_dropped_total", 1);
                    false
                }
            }
            None => {
                debug!(user_id, "Addressee offline, skipping delivery");
                false
            }
        }
    }

    fn broadcast_group(&self, group_id: &str, event: OutboundEvent) {
        self.broadcast_group_filtered(group_id, event, None);
    }

    /// Fan out to a group's live subscribers. One failed send does not
    /// abort delivery to the remaining subscribers.
    fn broadcast_group_filtered(
        &self,
        group_id: &str,
        event: OutboundEvent,
        exclude: Option<&str>,
    ) {
        for user_id in self.groups.members_of(group_id) {
            if exclude == Some(user_id.as_str()) {
                continue;
            }
            self.send_to_user(&user_id, event.clone());
        }
    }
}

fn dedup(mut user_ids: Vec<String>) -> Vec<String> {
    user_ids.sort();
    user_ids.dedup();
    user_ids
}
