use axum::{extract::State, Json};
use serde::Serialize;

use crate::{
    auth::AuthUser,
    db::{self, DbPool},
    error::ApiError,
    models::GroupView,
};

#[derive(Debug, Serialize)]
pub struct GetGroupsOutput {
    pub groups: Vec<GroupView>,
}

/// Groups the caller belongs to or owns.
/// GET /api/chat/groups
#[tracing::instrument(skip(pool, auth_user))]
pub async fn get_groups(
    State(pool): State<DbPool>,
    auth_user: AuthUser,
) -> Result<Json<GetGroupsOutput>, ApiError> {
    let groups = db::list_groups_for(&pool, &auth_user.user_id)
        .await
        .map_err(ApiError::Internal)?;

    let mut views = Vec::with_capacity(groups.len());
    for group in groups {
        let member_ids = db::group_member_ids(&pool, &group.id)
            .await
            .map_err(ApiError::Internal)?;
        views.push(group.to_view(member_ids));
    }

    Ok(Json(GetGroupsOutput { groups: views }))
}
