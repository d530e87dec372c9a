use crate::error::RegistryError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{error, warn};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    MalformedPayload(#[from] JsonRejection),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::Registry(err) => match err {
                RegistryError::Invalid(_) | RegistryError::InvalidOption { .. } => {
                    StatusCode::BAD_REQUEST
                }
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::AlreadyExists(_) | RegistryError::Conflict { .. } => {
                    StatusCode::CONFLICT
                }
                RegistryError::CorruptCount { .. }
                | RegistryError::Database(_)
                | RegistryError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "internal server error".to_string()
        } else {
            warn!("Rejected request ({}): {}", status, self);
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
