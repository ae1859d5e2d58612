//! Error responses for the admin API.
//!
//! # Responsibilities
//! - Render failures as `{error, kind}` JSON
//! - Map probe failures to their HTTP status codes
//!
//! # Design Decisions
//! - `kind` is a stable machine-readable identifier, `error` is for humans
//! - Unknown status codes degrade to 500

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::probe::ProbeError;

/// JSON body of every admin API error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// Build an error response.
pub fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
        kind: kind.to_string(),
    };
    (status, Json(body)).into_response()
}

impl IntoResponse for ProbeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, self.kind(), self.to_string())
    }
}
