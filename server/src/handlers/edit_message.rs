use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    realtime::{Audience, RealtimeState},
};

#[derive(Debug, Deserialize)]
pub struct EditMessageInput {
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub body: String,
    /// Present for group messages; absent for direct ones.
    #[serde(rename = "groupId")]
    pub group_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageOutput {
    pub message_id: String,
    pub body: String,
}

/// Edit a message the caller authored and propagate the new body.
/// POST /api/chat/messages/edit
#[tracing::instrument(skip(pool, realtime, auth_user, input))]
pub async fn edit_message(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
    auth_user: AuthUser,
    Json(input): Json<EditMessageInput>,
) -> Result<Json<EditMessageOutput>, ApiError> {
    if input.message_id.is_empty() {
        return Err(ApiError::Validation("messageId is required".into()));
    }
    if input.body.is_empty() {
        return Err(ApiError::Validation("body is required".into()));
    }

    match &input.group_id {
        Some(group_id) => {
            let message = db::update_group_message_body(
                &pool,
                &input.message_id,
                &auth_user.user_id,
                &input.body,
            )
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("No such editable message".into()))?;

            realtime.router.message_edited(
                Audience::Group(group_id.clone()),
                &message.id,
                &message.body,
            );
        }
        None => {
            let message = db::update_message_body(
                &pool,
                &input.message_id,
                &auth_user.user_id,
                &input.body,
            )
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("No such editable message".into()))?;

            realtime.router.message_edited(
                Audience::Users(vec![message.sender_id.clone(), message.receiver_id.clone()]),
                &message.id,
                &message.body,
            );
        }
    }

    info!(message_id = %input.message_id, "Message edited");
    Ok(Json(EditMessageOutput {
        message_id: input.message_id,
        body: input.body,
    }))
}
