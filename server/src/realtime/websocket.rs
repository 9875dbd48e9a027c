//! WebSocket endpoint for the chat socket.
//!
//! One connection per client, identified by a `userId` query parameter. A
//! connection without a user id is accepted but never registered: it can
//! hold the socket open, yet receives no events and its inbound frames are
//! dropped. Outbound events flow through a per-connection unbounded queue,
//! preserving enqueue order per connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events::ClientEvent;
use super::lifecycle::RealtimeState;
use super::presence::ConnectionHandle;

/// Server-side heartbeat interval (ping to detect stale connections)
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// GET /ws/chat (WebSocket upgrade)
pub async fn chat_socket(
    ws: WebSocketUpgrade,
    State(realtime): State<Arc<RealtimeState>>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let user_id = query.user_id.unwrap_or_default();
    ws.on_upgrade(move |socket| handle_socket(socket, realtime, user_id))
}

async fn handle_socket(socket: WebSocket, realtime: Arc<RealtimeState>, user_id: String) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = ConnectionHandle::new(tx);
    let connection_id = handle.id();
    let registered = realtime.connect(&user_id, handle);

    // Outbound pump: drain the connection queue in order, interleaved with
    // heartbeat pings. The queue sender living in the registry keeps `rx`
    // alive until deregistration.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            tokio::select! {
                maybe_event = rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize outbound event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("Outbound send failed, connection likely closed");
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        debug!("Heartbeat ping failed, connection likely closed");
                        break;
                    }
                }
            }
        }
    });

    // Inbound pump: parse JSON frames and hand them to the router. A frame
    // that does not parse is dropped without disturbing the connection.
    let realtime_recv = realtime.clone();
    let recv_user_id = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => dispatch_client_event(&realtime_recv, &recv_user_id, event),
                    Err(e) => {
                        warn!(error = %e, "Dropping malformed client event");
                    }
                },
                Message::Close(_) => break,
                // Pong replies are handled by axum; binary frames are not
                // part of the protocol.
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    if registered {
        realtime.disconnect(&user_id, connection_id);
    }
    info!(%user_id, connection_id, "WebSocket connection closed");
}

/// Translate an inbound client event into router calls. The sender identity
/// always comes from the connection, never from the payload.
fn dispatch_client_event(realtime: &RealtimeState, user_id: &str, event: ClientEvent) {
    if user_id.is_empty() {
        debug!("Dropping event from unregistered connection");
        return;
    }
    match event {
        ClientEvent::PrivateMessage {
            to_user_id,
            message,
        } => {
            realtime
                .router
                .deliver_private(user_id, &to_user_id, inject_sender(message, user_id));
        }
        ClientEvent::JoinGroup { group_id } => {
            realtime.join_group(&group_id, user_id);
        }
        ClientEvent::GroupMessage { group_id, message } => {
            realtime
                .router
                .deliver_group(&group_id, inject_sender(message, user_id));
        }
        ClientEvent::Typing { to_user_id } => {
            realtime.router.typing_started(user_id, &to_user_id);
        }
        ClientEvent::StopTyping { to_user_id } => {
            realtime.router.typing_stopped(user_id, &to_user_id);
        }
        ClientEvent::GroupTyping {
            group_id,
            user_name,
        } => {
            realtime
                .router
                .group_typing_started(&group_id, user_id, &user_name);
        }
        ClientEvent::GroupStopTyping {
            group_id,
            user_name,
        } => {
            realtime
                .router
                .group_typing_stopped(&group_id, user_id, &user_name);
        }
    }
}

/// Overwrite `senderId` in a relayed message payload with the connection's
/// identity, discarding whatever the client claimed.
fn inject_sender(mut message: serde_json::Value, user_id: &str) -> serde_json::Value {
    if let Some(object) = message.as_object_mut() {
        object.insert(
            "senderId".to_string(),
            serde_json::Value::String(user_id.to_string()),
        );
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::events::OutboundEvent;
    use serde_json::json;

    #[test]
    fn inject_sender_overrides_client_supplied_value() {
        let message = json!({"body": "hi", "senderId": "forged"});
        let message = inject_sender(message, "real-user");
        assert_eq!(message["senderId"], "real-user");
        assert_eq!(message["body"], "hi");
    }

    #[test]
    fn inject_sender_ignores_non_object_payloads() {
        let message = inject_sender(json!("just text"), "u1");
        assert_eq!(message, json!("just text"));
    }

    #[tokio::test]
    async fn dispatch_relays_private_message_with_server_identity() {
        let state = RealtimeState::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.connect("b", ConnectionHandle::new(tx));
        // drain the presence broadcast
        rx.try_recv().unwrap();

        dispatch_client_event(
            &state,
            "a",
            ClientEvent::PrivateMessage {
                to_user_id: "b".into(),
                message: json!({"body": "hi", "senderId": "spoofed"}),
            },
        );

        match rx.try_recv().unwrap() {
            OutboundEvent::NewMessage { message } => {
                assert_eq!(message["senderId"], "a");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dispatch_from_unregistered_connection_is_dropped() {
        let state = RealtimeState::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.connect("b", ConnectionHandle::new(tx));
        rx.try_recv().unwrap();

        dispatch_client_event(
            &state,
            "",
            ClientEvent::PrivateMessage {
                to_user_id: "b".into(),
                message: json!({"body": "hi"}),
            },
        );

        assert!(rx.try_recv().is_err());
    }
}
