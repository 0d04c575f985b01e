use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::api::CommandResponse;
use crate::executor::ExecutionError;

/// Failure of an HTTP request, rendered as a `CommandResponse` body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body is not valid JSON for the endpoint.
    #[error("Invalid request: {0}")]
    InvalidBody(String),

    /// A field failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// A listed path does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Server-side failure before the agent was launched.
    #[error("{0}")]
    Internal(String),

    /// The execution itself failed.
    #[error("{action}: {source}")]
    Execution {
        action: &'static str,
        #[source]
        source: ExecutionError,
    },
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Execution { source, .. } if source.is_rejection() => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Execution { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "Request failed");
        }
        let partial = match &self {
            Self::Execution { source, .. } => source.partial_output(),
            _ => None,
        };
        let body = CommandResponse::failure(self.to_string(), partial);
        (status, Json(body)).into_response()
    }
}
