//! Group routes: create, list, read, update and delete gift exchange groups.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{CreateGroupRequest, Group, GroupDetail, GroupSummary, UpdateGroupRequest};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Serialize)]
pub struct ListGroupsResponse {
    pub data: Vec<GroupSummary>,
    pub count: usize,
}

/// Create a new group.
///
/// POST /api/v1/groups
///
/// The caller becomes the owner and first member.
pub async fn create_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupDetail>), ApiError> {
    request.validate()?;
    let detail = state.groups.create_group(user_auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// List groups the caller belongs to.
///
/// GET /api/v1/groups
pub async fn list_groups(
    State(state): State<AppState>,
    user_auth: UserAuth,
) -> Result<Json<ListGroupsResponse>, ApiError> {
    let data = state.groups.list_groups(user_auth.user_id).await?;
    let count = data.len();
    Ok(Json(ListGroupsResponse { data, count }))
}

/// Group details with members. Never includes assignments.
///
/// GET /api/v1/groups/:group_id
pub async fn get_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupDetail>, ApiError> {
    let detail = state.groups.get_group(group_id, user_auth.user_id).await?;
    Ok(Json(detail))
}

/// Update group settings (owner only).
///
/// PUT /api/v1/groups/:group_id
pub async fn update_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    request.validate()?;
    let group = state
        .groups
        .update_group(group_id, user_auth.user_id, request)
        .await?;
    Ok(Json(group))
}

/// Delete a group and everything in it (owner only).
///
/// DELETE /api/v1/groups/:group_id
pub async fn delete_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .members
        .delete_group(group_id, user_auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
