// Maps the engine's error taxonomy onto HTTP status codes (spec §7). Kept
// local to this crate rather than as an `IntoResponse` impl on
// `EngineError` itself, since that type lives in `workflow-engine-core` and
// `axum::IntoResponse` is a foreign trait (orphan rule).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use workflow_engine_core::error::{EngineError, StoreError};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::Config(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Port(_) => StatusCode::BAD_GATEWAY,
            EngineError::TransientStore(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::TenantMismatch => StatusCode::FORBIDDEN,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %err, "request failed");
        ApiError(status, err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        EngineError::from(err).into()
    }
}
