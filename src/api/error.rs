use crate::services::ingestion_service::IngestError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Uniform failure body for every endpoint.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{error}: {detail}")]
    BadRequest { error: String, detail: String },

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl AppError {
    pub fn bad_request(error: impl Into<String>, detail: impl ToString) -> Self {
        AppError::BadRequest {
            error: error.into(),
            detail: detail.to_string(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(e: IngestError) -> Self {
        match &e {
            IngestError::Storage(_) => AppError::bad_request("Upload failed.", &e),
            IngestError::MetadataRegistration { .. } => {
                AppError::bad_request("Metadata record creation failed.", &e)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, detail) = match self {
            AppError::BadRequest { error, detail } => (StatusCode::BAD_REQUEST, error, detail),
            AppError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload too large.".to_string(),
                detail,
            ),
        };

        (status, Json(ErrorResponse { error, detail })).into_response()
    }
}
