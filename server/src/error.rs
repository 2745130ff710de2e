use axum::{
    Json,
    extract::{
        Request, State,
        multipart::MultipartError,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

use crate::{db::repo::RepoError, domain::wizard::WizardError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid id")]
    InvalidId,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("too many requests, try again later")]
    TooManyRequests,

    /// `message` goes to the client, `detail` to the log.
    #[error("{message}")]
    Internal { message: String, detail: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn unauthorized() -> Self {
        AppError::Unauthorized("authentication required".into())
    }

    /// A 500 whose client-facing text names what failed, e.g. "error fetching countries".
    pub fn internal(message: impl Into<String>, detail: impl ToString) -> Self {
        AppError::Internal {
            message: message.into(),
            detail: detail.to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidId => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(what) => AppError::NotFound(what.to_string()),
            RepoError::Conflict(message) => AppError::Conflict(message),
            other => AppError::internal("Internal server error", other),
        }
    }
}

impl From<WizardError> for AppError {
    fn from(e: WizardError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "is invalid".into());
                format!("{field}: {reason}")
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            AppError::Validation(e.body_text())
        }
    }
}

/// Attached to 500 responses so [`error_details`] can surface the cause.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    message: String,
    detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::Internal { message, detail } => {
                error!(%detail, "{message}");
                let mut response =
                    (status, Json(json!({ "error": message.clone() }))).into_response();
                response
                    .extensions_mut()
                    .insert(ErrorDetail { message, detail });
                response
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

/// Rewrites 500 bodies to include `details` when the deployment opts in.
pub async fn error_details(State(expose): State<bool>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !expose {
        return response;
    }
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail { message, detail }) => (
            response.status(),
            Json(json!({ "error": message, "details": detail })),
        )
            .into_response(),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn repo_errors_map_to_statuses() {
        let not_found: AppError = RepoError::NotFound("profile").into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let conflict: AppError = RepoError::Conflict("taken".into()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let response =
            AppError::from(RepoError::Database(sqlx::Error::PoolTimedOut)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorDetail>().is_some());
        let json = body(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let json = body(AppError::InvalidId.into_response()).await;
        assert_eq!(json, json!({ "error": "invalid id" }));
    }
}
