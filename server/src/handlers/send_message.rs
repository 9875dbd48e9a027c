use anyhow::Context;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::MessageView,
    notifications::{FallbackSelector, PushService},
    realtime::RealtimeState,
};

#[derive(Debug, Deserialize)]
pub struct SendMessageInput {
    #[serde(rename = "receiverId")]
    pub receiver_id: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageOutput {
    pub message: MessageView,
}

/// Send a direct message.
/// POST /api/chat/messages
///
/// Persists first, then routes the real-time event; if the receiver has no
/// live connection the push fallback takes over. Real-time delivery is
/// best-effort and never fails the request.
#[tracing::instrument(skip(pool, realtime, push, fallback, auth_user, input))]
pub async fn send_message(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
    State(push): State<Arc<PushService>>,
    State(fallback): State<FallbackSelector>,
    auth_user: AuthUser,
    Json(input): Json<SendMessageInput>,
) -> Result<Json<SendMessageOutput>, ApiError> {
    if input.receiver_id.is_empty() {
        return Err(ApiError::Validation("receiverId is required".into()));
    }
    if input.body.is_empty() {
        return Err(ApiError::Validation("body is required".into()));
    }

    let message = db::insert_message(&pool, &auth_user.user_id, &input.receiver_id, &input.body)
        .await
        .map_err(ApiError::Internal)?;

    info!(
        message_id = %message.id,
        receiver = %input.receiver_id,
        "Direct message stored"
    );
    metrics::counter!("chat_messages_sent_total", 1);

    let view = message.to_view();
    let payload = serde_json::to_value(&view)
        .context("Failed to serialize message view")
        .map_err(ApiError::Internal)?;
    realtime
        .router
        .deliver_private(&auth_user.user_id, &input.receiver_id, payload);

    if !fallback.is_reachable(&input.receiver_id) {
        let pool = pool.clone();
        let receiver_id = input.receiver_id.clone();
        let sender_id = auth_user.user_id.clone();
        let preview = message.body.clone();
        tokio::spawn(async move {
            if let Err(e) = push
                .notify_direct_message(&pool, &receiver_id, &sender_id, &preview)
                .await
            {
                warn!(error = %e, "Push fallback failed");
            }
        });
    }

    Ok(Json(SendMessageOutput { message: view }))
}
