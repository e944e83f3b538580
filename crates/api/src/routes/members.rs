//! Membership routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{AddMemberRequest, Group, Membership, TransferOwnershipRequest};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

#[derive(Debug, Serialize)]
pub struct ListMembersResponse {
    pub data: Vec<Membership>,
    pub count: usize,
}

/// GET /api/v1/groups/:group_id/members
pub async fn list_members(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<ListMembersResponse>, ApiError> {
    let data = state
        .members
        .list_members(group_id, user_auth.user_id)
        .await?;
    let count = data.len();
    Ok(Json(ListMembersResponse { data, count }))
}

/// Add a registered user (by id or handle) or a guest (owner only).
///
/// POST /api/v1/groups/:group_id/members
pub async fn add_member(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<Membership>), ApiError> {
    request.validate()?;
    let member = request.into_member_ref()?;
    let membership = state
        .members
        .add_member(group_id, user_auth.user_id, member)
        .await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

/// DELETE /api/v1/groups/:group_id/members/:membership_id
pub async fn remove_member(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path((group_id, membership_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    state
        .members
        .remove_member(group_id, user_auth.user_id, membership_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/groups/:group_id/leave
pub async fn leave_group(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .members
        .leave_group(group_id, user_auth.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/groups/:group_id/transfer
pub async fn transfer_ownership(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<TransferOwnershipRequest>,
) -> Result<Json<Group>, ApiError> {
    let group = state
        .members
        .transfer_ownership(group_id, user_auth.user_id, request.new_owner_id)
        .await?;
    Ok(Json(group))
}
