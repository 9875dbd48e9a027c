use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::MessageView,
};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct GetMessagesQuery {
    #[serde(rename = "withUserId")]
    pub with_user_id: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GetMessagesOutput {
    pub messages: Vec<MessageView>,
}

/// Direct-message history with one counterpart, oldest first.
/// GET /api/chat/messages
#[tracing::instrument(skip(pool, auth_user))]
pub async fn get_messages(
    State(pool): State<DbPool>,
    auth_user: AuthUser,
    Query(query): Query<GetMessagesQuery>,
) -> Result<Json<GetMessagesOutput>, ApiError> {
    if query.with_user_id.is_empty() {
        return Err(ApiError::Validation("withUserId is required".into()));
    }
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut messages =
        db::list_messages_between(&pool, &auth_user.user_id, &query.with_user_id, limit)
            .await
            .map_err(ApiError::Internal)?;
    messages.reverse();

    Ok(Json(GetMessagesOutput {
        messages: messages.iter().map(|m| m.to_view()).collect(),
    }))
}
