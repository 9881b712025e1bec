//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::RedemptionError;
use ticket_store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Issuance or redemption was rejected.
    Redemption(RedemptionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Redemption(err) => {
                (redemption_status(&err), err.kind(), err.to_string())
            }
        };

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn redemption_status(err: &RedemptionError) -> StatusCode {
    match err {
        RedemptionError::NotFound(_) => StatusCode::NOT_FOUND,
        RedemptionError::AlreadyRedeemed(_)
        | RedemptionError::NotActive { .. }
        | RedemptionError::InvalidTransition { .. }
        | RedemptionError::DuplicateId(_) => StatusCode::CONFLICT,
        RedemptionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        RedemptionError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
        RedemptionError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

impl From<RedemptionError> for ApiError {
    fn from(err: RedemptionError) -> Self {
        ApiError::Redemption(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Redemption(RedemptionError::from(err))
    }
}
