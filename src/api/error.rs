//! API error types and conversions
//!
//! Every error is answered with `{"error": "<message>"}`. Storage failures
//! are logged here and reported to the caller without the backend detail.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use crate::DeviceId;
use crate::storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// The backend failed while serving the request
    Storage(StorageError),

    /// Malformed or out-of-range input
    InvalidRequest(String),

    /// The request names a device missing from the inventory
    UnknownDevice(DeviceId),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownDevice(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Storage(err) => {
                error!("request failed in storage: {}", err);
                "storage unavailable".to_string()
            }
            ApiError::InvalidRequest(msg) => msg,
            ApiError::UnknownDevice(id) => format!("device {id} not found"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Storage(err)
    }
}
