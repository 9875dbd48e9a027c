use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::GroupMessageView,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct GetGroupMessagesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GetGroupMessagesOutput {
    pub messages: Vec<GroupMessageView>,
}

/// Group message history, oldest first.
/// GET /api/chat/groups/{group_id}/messages
#[tracing::instrument(skip(pool, auth_user))]
pub async fn get_group_messages(
    State(pool): State<DbPool>,
    auth_user: AuthUser,
    Path(group_id): Path<String>,
    Query(query): Query<GetGroupMessagesQuery>,
) -> Result<Json<GetGroupMessagesOutput>, ApiError> {
    let is_member = db::is_group_member(&pool, &auth_user.user_id, &group_id)
        .await
        .map_err(ApiError::Internal)?;
    if !is_member {
        return Err(ApiError::Forbidden("Not a member of this group".into()));
    }

    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mut messages = db::list_group_messages(&pool, &group_id, limit)
        .await
        .map_err(ApiError::Internal)?;
    messages.reverse();

    Ok(Json(GetGroupMessagesOutput {
        messages: messages.iter().map(|m| m.to_view()).collect(),
    }))
}
