use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use vowbook_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    Core(CoreError),
    RateLimited,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Core(CoreError::Validation(_)) => StatusCode::BAD_REQUEST,
            AppError::Core(CoreError::Auth(_)) => StatusCode::UNAUTHORIZED,
            AppError::Core(CoreError::Forbidden(_)) => StatusCode::FORBIDDEN,
            AppError::Core(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Core(CoreError::Conflict(_)) => StatusCode::CONFLICT,
            AppError::Core(CoreError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
            AppError::Core(CoreError::Internal(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Core(CoreError::Internal(detail)) => {
                tracing::error!("Internal Server Error: {}", detail);
                json!({"error": {"class": "InternalError", "message": "Internal Server Error"}})
            }
            AppError::Core(CoreError::Conflict(reasons)) => json!({
                "error": {
                    "class": "ConflictError",
                    "message": CoreError::Conflict(reasons.clone()).to_string(),
                    "conflicts": reasons,
                }
            }),
            AppError::Core(err) => json!({"error": {"class": err.class(), "message": err.to_string()}}),
            AppError::RateLimited => {
                json!({"error": {"class": "RateLimitError", "message": "Rate limit exceeded"}})
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        AppError::Core(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Core(CoreError::Validation(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_conflict_lists_reasons() {
        let (status, body) = body_of(CoreError::conflict("Time slot is fully booked").into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["class"], "ConflictError");
        assert_eq!(body["error"]["conflicts"][0], "Time slot is fully booked");
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let (status, body) = body_of(CoreError::Internal("password=hunter2".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "Internal Server Error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_invalid_transition_class() {
        let (status, body) = body_of(CoreError::invalid_transition("completed", "approve").into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["class"], "InvalidStateTransition");
        assert_eq!(body["error"]["message"], "Cannot approve while completed");
    }
}
