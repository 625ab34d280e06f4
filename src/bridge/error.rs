use crate::error::VeoError;
use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Renders as `{ok: false, error, status?, operationName?}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Veo(#[from] VeoError),

    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, operation) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            ApiError::Veo(err) => match err {
                VeoError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
                VeoError::Submission { body, .. } => (StatusCode::BAD_GATEWAY, body.clone(), None),
                VeoError::Poll {
                    operation, body, ..
                } => (StatusCode::BAD_GATEWAY, body.clone(), Some(operation.clone())),
                VeoError::Transport(_) | VeoError::UnexpectedResponse(_) => {
                    tracing::warn!(error = %err, "upstream call failed");
                    (StatusCode::BAD_GATEWAY, err.to_string(), None)
                }
                VeoError::NoCredential(_) => {
                    tracing::error!(error = %err, "no credential for upstream call");
                    (StatusCode::SERVICE_UNAVAILABLE, err.to_string(), None)
                }
                VeoError::Decode(_) | VeoError::Write { .. } => {
                    tracing::error!(error = %err, "internal error");
                    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string(), None)
                }
            },
        };

        let mut body = json!({
            "ok": false,
            "error": message,
        });
        if let ApiError::Veo(err) = &self {
            if let Some(upstream) = err.remote_status() {
                body["status"] = json!(upstream);
            }
        }
        if let Some(operation) = operation {
            body["operationName"] = json!(operation);
        }

        (status, Json(body)).into_response()
    }
}
