//! Database models and their API views.
//!
//! `FromRow` structs map table rows one-to-one; the `*View` structs are what
//! handlers serialize out (camelCase) and what gets relayed over the chat
//! socket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database representation of a direct message.
/// Maps to the `messages` table.
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub seen: bool,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn to_view(&self) -> MessageView {
        MessageView {
            id: self.id.clone(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
            body: self.body.clone(),
            seen: self.seen,
            sent_at: self.sent_at,
            edited_at: self.edited_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub seen: bool,
    pub sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

/// Database representation of a seller's group chat.
/// Maps to the `group_chats` table; members live in `group_members`.
#[derive(Debug, Clone, FromRow)]
pub struct GroupChat {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupChat {
    pub fn to_view(&self, member_ids: Vec<String>) -> GroupView {
        GroupView {
            id: self.id.clone(),
            seller_id: self.seller_id.clone(),
            name: self.name.clone(),
            member_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub member_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Database representation of a group message.
/// Maps to the `group_messages` table.
#[derive(Debug, Clone, FromRow)]
pub struct GroupMessage {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl GroupMessage {
    pub fn to_view(&self) -> GroupMessageView {
        GroupMessageView {
            id: self.id.clone(),
            group_id: self.group_id.clone(),
            sender_id: self.sender_id.clone(),
            body: self.body.clone(),
            sent_at: self.sent_at,
            edited_at: self.edited_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessageView {
    pub id: String,
    pub group_id: String,
    pub sender_id: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_view_serializes_camel_case() {
        let view = MessageView {
            id: "m1".into(),
            sender_id: "a".into(),
            receiver_id: "b".into(),
            body: "hi".into(),
            seen: false,
            sent_at: Utc::now(),
            edited_at: None,
        };
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["senderId"], "a");
        assert_eq!(value["receiverId"], "b");
        assert!(value.get("editedAt").is_none());
    }
}
