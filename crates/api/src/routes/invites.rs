//! Invite code routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use domain::models::{AcceptedInvite, DirectInviteRequest, Invite, InviteInfo};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Shareable invite returned to members.
#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub code: String,
    pub group_id: Uuid,
    /// Link into the web app that pre-fills the code.
    pub invite_url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub use_count: i32,
}

impl InviteResponse {
    fn new(invite: Invite, app_base_url: &str) -> Self {
        Self {
            invite_url: format!("{}/join/{}", app_base_url.trim_end_matches('/'), invite.code),
            code: invite.code,
            group_id: invite.group_id,
            expires_at: invite.expires_at,
            use_count: invite.use_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RevokeInvitesResponse {
    pub revoked: u64,
}

/// Get (or mint) the group's invite code. Any member may share it.
///
/// POST /api/v1/groups/:group_id/invites
pub async fn create_invite(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<InviteResponse>, ApiError> {
    let invite = state
        .invites
        .create_invite(group_id, user_auth.user_id)
        .await?;
    Ok(Json(InviteResponse::new(
        invite,
        &state.config.server.app_base_url,
    )))
}

/// Revoke the active code (owner only).
///
/// DELETE /api/v1/groups/:group_id/invites
pub async fn revoke_invites(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<RevokeInvitesResponse>, ApiError> {
    let revoked = state
        .invites
        .revoke_invite(group_id, user_auth.user_id)
        .await?;
    Ok(Json(RevokeInvitesResponse { revoked }))
}

/// Invite a registered user by handle and notify them.
///
/// POST /api/v1/groups/:group_id/invites/direct
pub async fn invite_user(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
    Json(request): Json<DirectInviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), ApiError> {
    request.validate()?;
    let invite = state
        .invites
        .invite_user(group_id, user_auth.user_id, &request.handle)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(InviteResponse::new(
            invite,
            &state.config.server.app_base_url,
        )),
    ))
}

/// Public preview of the group behind a code.
///
/// GET /api/v1/invites/:code
pub async fn preview_invite(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<InviteInfo>, ApiError> {
    let info = state.invites.resolve_invite(&code).await?;
    Ok(Json(info))
}

/// Join the group behind a code. Joining twice is a no-op.
///
/// POST /api/v1/invites/:code/accept
pub async fn accept_invite(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<AcceptedInvite>), ApiError> {
    let accepted = state
        .invites
        .accept_invite(&code, user_auth.user_id)
        .await?;
    let status = if accepted.already_member {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(accepted)))
}
