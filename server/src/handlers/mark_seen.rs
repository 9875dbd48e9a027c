use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    realtime::{RealtimeState, SeenTarget},
};

#[derive(Debug, Deserialize)]
pub struct MarkSeenInput {
    /// Either a direct-message counterpart's user id or a group id.
    #[serde(rename = "targetId")]
    pub target_id: String,
}

#[derive(Debug, Serialize)]
pub struct MarkSeenOutput {
    pub updated: u64,
}

/// Mark a conversation as seen.
/// POST /api/chat/messages/seen
///
/// `targetId` is resolved against the group store first; anything that is
/// not a known group is treated as a direct counterpart. The receipt is
/// routed to the original sender (direct) or the group's live subscribers.
#[tracing::instrument(skip(pool, realtime, auth_user))]
pub async fn mark_seen(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
    auth_user: AuthUser,
    Json(input): Json<MarkSeenInput>,
) -> Result<Json<MarkSeenOutput>, ApiError> {
    if input.target_id.is_empty() {
        return Err(ApiError::Validation("targetId is required".into()));
    }

    let group = db::get_group(&pool, &input.target_id)
        .await
        .map_err(ApiError::Internal)?;

    let updated = match group {
        Some(group) => {
            let is_member = db::is_group_member(&pool, &auth_user.user_id, &group.id)
                .await
                .map_err(ApiError::Internal)?;
            if !is_member {
                return Err(ApiError::Forbidden("Not a member of this group".into()));
            }
            let updated = db::mark_group_read(&pool, &group.id, &auth_user.user_id)
                .await
                .map_err(ApiError::Internal)?;
            realtime.router.messages_seen(
                SeenTarget::Group { group_id: group.id },
                &auth_user.user_id,
            );
            updated
        }
        None => {
            let updated = db::mark_messages_seen(&pool, &auth_user.user_id, &input.target_id)
                .await
                .map_err(ApiError::Internal)?;
            realtime.router.messages_seen(
                SeenTarget::Direct {
                    sender_id: input.target_id.clone(),
                },
                &auth_user.user_id,
            );
            updated
        }
    };

    info!(target = %input.target_id, updated, "Conversation marked seen");
    Ok(Json(MarkSeenOutput { updated }))
}
