use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::GroupView,
};

#[derive(Debug, Deserialize)]
pub struct CreateGroupInput {
    pub name: String,
    #[serde(rename = "memberIds", default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateGroupOutput {
    pub group: GroupView,
}

/// Create a group chat owned by the calling seller.
/// POST /api/chat/groups
#[tracing::instrument(skip(pool, auth_user, input))]
pub async fn create_group(
    State(pool): State<DbPool>,
    auth_user: AuthUser,
    Json(input): Json<CreateGroupInput>,
) -> Result<Json<CreateGroupOutput>, ApiError> {
    if input.name.is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }

    let group = db::create_group(&pool, &auth_user.user_id, &input.name, &input.member_ids)
        .await
        .map_err(ApiError::Internal)?;
    let member_ids = db::group_member_ids(&pool, &group.id)
        .await
        .map_err(ApiError::Internal)?;

    info!(group_id = %group.id, members = member_ids.len(), "Group created");
    Ok(Json(CreateGroupOutput {
        group: group.to_view(member_ids),
    }))
}
