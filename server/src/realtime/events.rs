//! Wire-level event types for the chat socket.
//!
//! Events are JSON text frames, one event per frame, internally tagged with
//! a `type` field. Message payloads stay opaque (`serde_json::Value`) so the
//! routing layer never depends on the storage schema — handlers pass their
//! serialized views, the socket relays whatever the client sent with the
//! sender identity injected server-side.

use serde::{Deserialize, Serialize};

/// Events a connected client may send to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Relay a direct message to another user. `senderId` inside the payload
    /// is overwritten with the connection's identity before delivery.
    #[serde(rename_all = "camelCase")]
    PrivateMessage {
        to_user_id: String,
        message: serde_json::Value,
    },
    /// Opt in to a group's real-time events for this session.
    #[serde(rename_all = "camelCase")]
    JoinGroup { group_id: String },
    /// Relay a message to a group's live subscribers.
    #[serde(rename_all = "camelCase")]
    GroupMessage {
        group_id: String,
        message: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Typing { to_user_id: String },
    #[serde(rename_all = "camelCase")]
    StopTyping { to_user_id: String },
    #[serde(rename_all = "camelCase")]
    GroupTyping {
        group_id: String,
        user_name: String,
    },
    #[serde(rename_all = "camelCase")]
    GroupStopTyping {
        group_id: String,
        user_name: String,
    },
}

/// Events the server emits to connected clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundEvent {
    /// Full online roster, broadcast to every connection on presence change.
    #[serde(rename = "getOnlineUser", rename_all = "camelCase")]
    OnlineUsers { online_user_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    NewMessage { message: serde_json::Value },
    #[serde(rename_all = "camelCase")]
    NewGroupMessage {
        group_id: String,
        message: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Typing { sender_id: String },
    #[serde(rename_all = "camelCase")]
    StopTyping { sender_id: String },
    #[serde(rename_all = "camelCase")]
    GroupTyping {
        group_id: String,
        user_id: String,
        user_name: String,
    },
    #[serde(rename_all = "camelCase")]
    GroupStopTyping {
        group_id: String,
        user_id: String,
        user_name: String,
    },
    /// Direct receipts carry `fromUser` (the counterpart whose messages were
    /// read); group receipts carry `groupId`.
    #[serde(rename_all = "camelCase")]
    MessagesSeen {
        seen_by: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_user: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MessagesDeleted {
        message_ids: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MessageEdited {
        message_id: String,
        body: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        group_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GroupUpdate { group: serde_json::Value },
    /// Join/leave system text for a group.
    #[serde(rename_all = "camelCase")]
    GroupNotification { group_id: String, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_event_wire_names() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "privateMessage",
            "toUserId": "u2",
            "message": { "body": "hi" },
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::PrivateMessage { .. }));

        let event: ClientEvent = serde_json::from_value(json!({
            "type": "joinGroup",
            "groupId": "g1",
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::JoinGroup { .. }));

        let event: ClientEvent = serde_json::from_value(json!({
            "type": "groupStopTyping",
            "groupId": "g1",
            "userName": "Ana",
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::GroupStopTyping { .. }));
    }

    #[test]
    fn malformed_client_event_is_rejected() {
        // Missing required toUserId
        let result = serde_json::from_value::<ClientEvent>(json!({
            "type": "typing",
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<ClientEvent>(json!({
            "type": "noSuchEvent",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn presence_event_serializes_as_get_online_user() {
        let event = OutboundEvent::OnlineUsers {
            online_user_ids: vec!["u1".into(), "u2".into()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "getOnlineUser");
        assert_eq!(value["onlineUserIds"], json!(["u1", "u2"]));
    }

    #[test]
    fn seen_event_omits_absent_target_fields() {
        let event = OutboundEvent::MessagesSeen {
            seen_by: "u2".into(),
            from_user: Some("u1".into()),
            group_id: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "messagesSeen");
        assert_eq!(value["fromUser"], "u1");
        assert!(value.get("groupId").is_none());
    }
}
