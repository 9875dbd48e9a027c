use anyhow::Context;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::GroupMessageView,
    notifications::{FallbackSelector, PushService},
    realtime::RealtimeState,
};

#[derive(Debug, Deserialize)]
pub struct SendGroupMessageInput {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct SendGroupMessageOutput {
    pub message: GroupMessageView,
}

/// Send a message to a group chat.
/// POST /api/chat/groups/{group_id}/messages
///
/// Real-time fan-out goes to the group's live subscribers; persisted
/// members without a live connection get the push fallback instead.
#[tracing::instrument(skip(pool, realtime, push, fallback, auth_user, input))]
pub async fn send_group_message(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
    State(push): State<Arc<PushService>>,
    State(fallback): State<FallbackSelector>,
    auth_user: AuthUser,
    Path(group_id): Path<String>,
    Json(input): Json<SendGroupMessageInput>,
) -> Result<Json<SendGroupMessageOutput>, ApiError> {
    if input.body.is_empty() {
        return Err(ApiError::Validation("body is required".into()));
    }

    let is_member = db::is_group_member(&pool, &auth_user.user_id, &group_id)
        .await
        .map_err(ApiError::Internal)?;
    if !is_member {
        return Err(ApiError::Forbidden(
            "Not a member of this group".into(),
        ));
    }

    let message = db::insert_group_message(&pool, &group_id, &auth_user.user_id, &input.body)
        .await
        .map_err(ApiError::Internal)?;

    info!(message_id = %message.id, %group_id, "Group message stored");
    metrics::counter!("chat_messages_sent_total", 1);

    let view = message.to_view();
    let payload = serde_json::to_value(&view)
        .context("Failed to serialize group message view")
        .map_err(ApiError::Internal)?;
    realtime.router.deliver_group(&group_id, payload);

    // Push to persisted members who are offline, excluding the sender.
    let members = db::group_member_ids(&pool, &group_id)
        .await
        .map_err(ApiError::Internal)?;
    let offline = fallback.offline_recipients(
        members
            .into_iter()
            .filter(|member_id| member_id != &auth_user.user_id),
    );
    if !offline.is_empty() {
        let pool = pool.clone();
        let sender_id = auth_user.user_id.clone();
        let group_id = group_id.clone();
        let preview = message.body.clone();
        tokio::spawn(async move {
            if let Err(e) = push
                .notify_group_message(&pool, &group_id, &sender_id, &offline, &preview)
                .await
            {
                warn!(error = %e, "Group push fallback failed");
            }
        });
    }

    Ok(Json(SendGroupMessageOutput { message: view }))
}
