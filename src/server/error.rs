//! Error responses for the server

use crate::error::AdaptError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Adapt(#[from] AdaptError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Adapt(e) if e.is_client_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Adapt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServerError::Adapt(e) => e.kind(),
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Unauthorized(_) => "unauthorized",
            ServerError::Forbidden(_) => "forbidden",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({
            "error": true,
            "kind": self.kind(),
            "message": self.to_string(),
        });

        match &self {
            ServerError::Adapt(AdaptError::SchemaMismatch { missing, unexpected }) => {
                body["missing"] = json!(missing);
                body["unexpected"] = json!(unexpected);
            }
            ServerError::Adapt(AdaptError::UnknownCategory { column, value })
            | ServerError::Adapt(AdaptError::UndeclaredCategory { column, value }) => {
                body["column"] = json!(column);
                body["value"] = json!(value);
            }
            ServerError::Adapt(AdaptError::InvalidFeatureValue { column, .. }) => {
                body["column"] = json!(column);
            }
            _ => {}
        }

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), detail = %self, "Request failed");
        } else {
            tracing::debug!(kind = self.kind(), detail = %self, "Rejected request");
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
