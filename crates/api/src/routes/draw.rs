//! Draw routes.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::{DrawSummary, MatchWishlist, MyAssignment};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;

/// Run (or re-run) the draw. Owner only.
///
/// POST /api/v1/groups/:group_id/draw
pub async fn perform_draw(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<DrawSummary>, ApiError> {
    let summary = state
        .draw
        .perform_draw(group_id, user_auth.user_id)
        .await?;
    Ok(Json(summary))
}

/// The caller's own receiver. Only ever the caller's.
///
/// GET /api/v1/groups/:group_id/draw/me
pub async fn my_assignment(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MyAssignment>, ApiError> {
    let assignment = state
        .draw
        .get_my_assignment(group_id, user_auth.user_id)
        .await?;
    Ok(Json(assignment))
}

/// GET /api/v1/groups/:group_id/draw/me/wishlist
pub async fn my_match_wishlist(
    State(state): State<AppState>,
    user_auth: UserAuth,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MatchWishlist>, ApiError> {
    let wishlist = state
        .draw
        .my_match_wishlist(group_id, user_auth.user_id)
        .await?;
    Ok(Json(wishlist))
}
