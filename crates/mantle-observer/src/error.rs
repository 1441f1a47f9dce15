//! Error types for the listener's HTTP surface.
//!
//! [`ObserverError`] converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mantle_core::hub::HubError;

/// Errors that can occur in the listener's HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The hub has stopped and cannot answer queries.
    #[error("hub unavailable: {0}")]
    HubUnavailable(#[from] HubError),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::HubUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
