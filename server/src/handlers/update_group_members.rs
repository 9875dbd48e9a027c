use anyhow::Context;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::GroupView,
    realtime::RealtimeState,
};

#[derive(Debug, Deserialize)]
pub struct UpdateGroupMembersInput {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateGroupMembersOutput {
    pub group: GroupView,
}

/// Change a group's persisted membership and notify live subscribers.
/// POST /api/chat/groups/{group_id}/members
///
/// Only the owning seller may change membership. The `groupUpdate` event is
/// best-effort: members without a live subscription see the change on their
/// next fetch.
#[tracing::instrument(skip(pool, realtime, auth_user, input))]
pub async fn update_group_members(
    State(pool): State<DbPool>,
    State(realtime): State<Arc<RealtimeState>>,
    auth_user: AuthUser,
    Path(group_id): Path<String>,
    Json(input): Json<UpdateGroupMembersInput>,
) -> Result<Json<UpdateGroupMembersOutput>, ApiError> {
    if input.add.is_empty() && input.remove.is_empty() {
        return Err(ApiError::Validation("nothing to change".into()));
    }

    let group = db::get_group(&pool, &group_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("No such group".into()))?;
    if group.seller_id != auth_user.user_id {
        return Err(ApiError::Forbidden(
            "Only the owning seller may change membership".into(),
        ));
    }

    db::update_group_members(&pool, &group_id, &input.add, &input.remove)
        .await
        .map_err(ApiError::Internal)?;

    let group = db::get_group(&pool, &group_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("No such group".into()))?;
    let member_ids = db::group_member_ids(&pool, &group_id)
        .await
        .map_err(ApiError::Internal)?;
    let view = group.to_view(member_ids);

    let payload = serde_json::to_value(&view)
        .context("Failed to serialize group view")
        .map_err(ApiError::Internal)?;
    realtime.router.group_updated(&group_id, payload);

    info!(
        %group_id,
        added = input.add.len(),
        removed = input.remove.len(),
        "Group membership updated"
    );
    Ok(Json(UpdateGroupMembersOutput { group: view }))
}
