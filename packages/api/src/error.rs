use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared::services::errors::match_service_errors::{ErrorCode, MatchServiceError};
use tracing::{debug, error};

#[derive(Debug)]
pub enum ApiError {
    MatchService(MatchServiceError),
    InvalidBody(String),
}

impl From<MatchServiceError> for ApiError {
    fn from(error: MatchServiceError) -> Self {
        ApiError::MatchService(error)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl ApiError {
    fn code(&self) -> ErrorCode {
        match self {
            ApiError::MatchService(e) => e.code(),
            ApiError::InvalidBody(_) => ErrorCode::BadRequest,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::MatchService(e) => e.client_message(),
            ApiError::InvalidBody(detail) => format!("Invalid request body: {}", detail),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();

        match &self {
            ApiError::MatchService(e) if e.is_server_error() => {
                error!("Request failed: {}", e)
            }
            other => debug!("Request rejected: {:?}", other),
        }

        let status = StatusCode::from_u16(code.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "ok": false,
            "error": self.message(),
            "code": code.as_str(),
        });

        (status, Json(body)).into_response()
    }
}
