//! Client-facing responses for requests that are not forwarded.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::director::Denial;

impl Denial {
    /// Status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Denial::MissingHost => StatusCode::BAD_REQUEST,
            Denial::AccessDenied { .. } => StatusCode::FORBIDDEN,
            Denial::Unresolvable { .. } | Denial::InvalidTarget { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Response for a backend that could not be reached.
pub fn upstream_failure() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}
