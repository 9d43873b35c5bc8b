use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const MISSING_QUESTION: &str = "Missing question";
pub const NOT_READY: &str = "Index is still being built";
pub const UPSTREAM_GENERIC: &str = "Upstream service error";

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Validation(String),

    #[error("Index is still being built")]
    NotReady,

    #[error("{message}")]
    Upstream { message: String },
}

impl QueryError {
    pub fn missing_question() -> Self {
        Self::Validation(MISSING_QUESTION.to_string())
    }

    pub fn invalid_body(reason: impl std::fmt::Display) -> Self {
        Self::Validation(format!("Invalid request body: {reason}"))
    }

    /// Log `err` in full and keep either its message or a generic one for the client.
    pub fn upstream(err: docqa_core::Error, expose_details: bool) -> Self {
        error!(error = %err, "query failed");
        let message = if expose_details { err.to_string() } else { UPSTREAM_GENERIC.to_string() };
        Self::Upstream { message }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            warn!(status = status.as_u16(), error = %self, "rejected query");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
