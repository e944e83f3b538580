use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use domain::errors::GroupError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Vec<ValidationDetail>,
    },

    #[error("Rate limit of {limit} requests/minute exceeded")]
    RateLimited { limit: u32, retry_after: u64 },

    /// Failure reported by a group operation.
    #[error(transparent)]
    Group(#[from] GroupError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<ValidationDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl ErrorBody {
    fn new(error: &'static str, message: String) -> Self {
        Self {
            error,
            message,
            details: Vec::new(),
            retry_after: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

/// HTTP status for each group failure kind.
fn group_error_status(err: &GroupError) -> StatusCode {
    match err {
        GroupError::Unauthorized(_) => StatusCode::FORBIDDEN,
        GroupError::NotFound(_) | GroupError::InviteNotFound => StatusCode::NOT_FOUND,
        GroupError::AlreadyMember => StatusCode::CONFLICT,
        GroupError::InsufficientParticipants { .. }
        | GroupError::CannotRemoveOwner
        | GroupError::OwnerCannotLeave => StatusCode::UNPROCESSABLE_ENTITY,
        GroupError::InviteExpired => StatusCode::GONE,
        GroupError::Validation(_) => StatusCode::BAD_REQUEST,
        GroupError::TransientStorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorBody::new("unauthorized", msg))
            }
            ApiError::Validation { message, details } => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    details,
                    ..ErrorBody::new("validation_error", message)
                },
            ),
            ApiError::RateLimited { retry_after, .. } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorBody {
                        retry_after: Some(retry_after),
                        ..ErrorBody::new("rate_limited", message)
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                return response;
            }
            ApiError::Group(GroupError::TransientStorageFailure(detail)) => {
                tracing::warn!(detail = %detail, "Storage failure surfaced to client");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody::new(
                        "service_unavailable",
                        "Storage is temporarily unavailable. Please retry.".into(),
                    ),
                )
            }
            ApiError::Group(err) => (group_error_status(&err), ErrorBody::new(err.code(), message)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        let message = if details.len() == 1 {
            details[0].message.clone()
        } else {
            format!("{} validation errors", details.len())
        };

        ApiError::Validation { message, details }
    }
}
