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
pub struct DeleteMessagesInput {
    #[serde(rename = "messageIds")]
    pub message_ids: Vec<String>,
    /// Present for group messages; absent for direct ones.
    #[serde(rename = "groupId")]
    pub group_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteMessagesOutput {
    pub deleted: Vec<String>,
}

/// Delete messages the caller authored and propagate the deletion.
/// POST /api/chat/messages/delete
///
/// The affected audience is derived here, not in the router: for direct
/// messages it is the sender/receiver pairs of the deleted rows, for group
/// messages it is the group's live subscribers.
#[tracing::instrument(skip(pool, realtime, auth_user))]
pub async fn delete_messages(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
    auth_user: AuthUser,
    Json(input): Json<DeleteMessagesInput>,
) -> Result<Json<DeleteMessagesOutput>, ApiError> {
    if input.message_ids.is_empty() {
        return Err(ApiError::Validation("messageIds is required".into()));
    }

    let deleted = match &input.group_id {
        Some(group_id) => {
            let deleted = db::delete_group_messages(
                &pool,
                group_id,
                &input.message_ids,
                &auth_user.user_id,
            )
            .await
            .map_err(ApiError::Internal)?;

            if !deleted.is_empty() {
                realtime
                    .router
                    .messages_deleted(Audience::Group(group_id.clone()), deleted.clone());
            }
            deleted
        }
        None => {
            let messages =
                db::get_messages_for_user(&pool, &input.message_ids, &auth_user.user_id)
                    .await
                    .map_err(ApiError::Internal)?;

            // Only the author may delete their own messages.
            let own: Vec<_> = messages
                .into_iter()
                .filter(|m| m.sender_id == auth_user.user_id)
                .collect();
            if own.is_empty() {
                return Ok(Json(DeleteMessagesOutput { deleted: vec![] }));
            }

            let ids: Vec<String> = own.iter().map(|m| m.id.clone()).collect();
            db::delete_messages(&pool, &ids)
                .await
                .map_err(ApiError::Internal)?;

            let mut affected: Vec<String> = Vec::new();
            for message in &own {
                affected.push(message.sender_id.clone());
                affected.push(message.receiver_id.clone());
            }
            realtime
                .router
                .messages_deleted(Audience::Users(affected), ids.clone());
            ids
        }
    };

    info!(count = deleted.len(), "Messages deleted");
    Ok(Json(DeleteMessagesOutput { deleted }))
}
