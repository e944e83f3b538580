//! User JWT authentication extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::user_auth::UserAuth as UserAuthData;

/// Authenticated caller.
///
/// Reuses what the auth middleware stored in the request extensions and
/// falls back to validating the header itself.
#[derive(Debug, Clone, Copy)]
pub struct UserAuth {
    pub user_id: Uuid,
}

impl From<&UserAuthData> for UserAuth {
    fn from(data: &UserAuthData) -> Self {
        Self {
            user_id: data.user_id,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuthData>() {
            return Ok(auth.into());
        }

        UserAuthData::from_headers(&state.jwt, &parts.headers).map(|auth| (&auth).into())
    }
}

/// Optional user JWT authentication.
///
/// Invalid or missing credentials yield `None` instead of a rejection.
#[derive(Debug, Clone, Copy)]
pub struct OptionalUserAuth(pub Option<UserAuth>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(auth) = parts.extensions.get::<UserAuthData>() {
            return Ok(OptionalUserAuth(Some(auth.into())));
        }

        Ok(OptionalUserAuth(
            UserAuthData::from_headers(&state.jwt, &parts.headers)
                .ok()
                .map(|auth| (&auth).into()),
        ))
    }
}
