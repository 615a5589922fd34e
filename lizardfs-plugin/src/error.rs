use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use libvolume::VolumeError;
use thiserror::Error;

use crate::types::{ErrorResponse, PLUGIN_CONTENT_TYPE};

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Volume(#[from] VolumeError),

    #[error("invalid request body: {0}")]
    BadRequest(String),

    #[error("unknown plugin method {0}")]
    UnknownMethod(String),
}

impl PluginError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PluginError::Volume(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PluginError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PluginError::UnknownMethod(_) => StatusCode::NOT_FOUND,
        }
    }
}

/// Failures travel in the `Err` field, which is what the engine reads.
impl IntoResponse for PluginError {
    fn into_response(self) -> Response {
        tracing::error!("plugin request failed: {self}");
        let status = self.status_code();
        let body = ErrorResponse {
            err: self.to_string(),
        };
        match serde_json::to_vec(&body) {
            Ok(body) => (status, [(CONTENT_TYPE, PLUGIN_CONTENT_TYPE)], body).into_response(),
            Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        }
    }
}
