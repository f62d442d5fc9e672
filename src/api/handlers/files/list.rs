use crate::api::error::{AppError, ErrorResponse};
use crate::api::middleware::request_id::RequestId;
use crate::services::metadata::MetadataError;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::{error, info, warn};

use super::types::*;

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "All file metadata", body = FileListResponse),
        (status = 400, description = "Metadata store read failure", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn list_files(
    State(state): State<crate::AppState>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
) -> Result<Json<FileListResponse>, AppError> {
    let data = state.status.list_files().await.map_err(|e| {
        error!(trace_id = %trace_id, endpoint = "GET /files", error = %e, "Failed to retrieve file metadata.");
        AppError::bad_request("Failed to retrieve file metadata.", e)
    })?;

    info!(
        trace_id = %trace_id,
        endpoint = "GET /files",
        count = data.len(),
        "All file metadata retrieved successfully"
    );

    Ok(Json(FileListResponse {
        data,
        message: "All file metadata retrieved successfully.".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(
        ("id" = String, Path, description = "File id")
    ),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 400, description = "Unknown id or metadata store read failure", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn get_file(
    State(state): State<crate::AppState>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let data = state.status.get_file(&id).await.map_err(|e| {
        log_lookup_failure(&trace_id, "GET /files/:id", &e);
        AppError::bad_request(format!("Failed to retrieve file metadata {}.", id), e)
    })?;

    info!(trace_id = %trace_id, endpoint = "GET /files/:id", file_id = %id, "File metadata retrieved successfully");

    Ok(Json(FileResponse {
        data,
        message: format!("File metadata {} retrieved successfully.", id),
    }))
}

/// Unknown ids are the client's problem; anything else is ours.
pub(super) fn log_lookup_failure(trace_id: &str, endpoint: &str, e: &MetadataError) {
    if e.is_not_found() {
        warn!(trace_id = %trace_id, endpoint = %endpoint, error = %e, "File metadata not found.");
    } else {
        error!(trace_id = %trace_id, endpoint = %endpoint, error = %e, "Failed to retrieve file metadata.");
    }
}
