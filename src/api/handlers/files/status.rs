use crate::api::error::{AppError, ErrorResponse};
use crate::api::middleware::request_id::RequestId;
use crate::services::status_service::describe;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::info;

use super::list::log_lookup_failure;
use super::types::*;

#[utoipa::path(
    get,
    path = "/files/{id}/status",
    params(
        ("id" = String, Path, description = "File id")
    ),
    responses(
        (status = 200, description = "Current processing state", body = StatusResponse),
        (status = 400, description = "Unknown id or metadata store read failure", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn get_file_status(
    State(state): State<crate::AppState>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let status = state.status.get_status(&id).await.map_err(|e| {
        log_lookup_failure(&trace_id, "GET /files/:id/status", &e);
        AppError::bad_request(format!("Failed to retrieve file status {}.", id), e)
    })?;

    let result = describe(status);
    info!(
        trace_id = %trace_id,
        endpoint = "GET /files/:id/status",
        file_id = %id,
        status = %status,
        "{}",
        result
    );

    Ok(Json(StatusResponse {
        status,
        result: result.to_string(),
    }))
}
