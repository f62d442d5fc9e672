use crate::api::error::{AppError, ErrorResponse};
use crate::api::middleware::request_id::RequestId;
use axum::{
    Extension, Json,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;
use tracing::{error, info, warn};

use super::types::*;

const ENDPOINT: &str = "POST /files";

#[utoipa::path(
    post,
    path = "/files",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "Missing file, storage failure or metadata failure", body = ErrorResponse),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<crate::AppState>,
    Extension(RequestId(trace_id)): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let result: Result<Json<UploadResponse>, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() != Some("file") {
                continue;
            }

            // A plain form value named "file" is not a file
            let Some(filename) = field.file_name().map(str::to_string) else {
                return Err(AppError::bad_request(
                    "Missing file parameter.",
                    "multipart field 'file' has no filename",
                ));
            };
            let body_with_io_error = field.map_err(std::io::Error::other);
            let reader = StreamReader::new(body_with_io_error);

            let outcome = state
                .ingestion
                .ingest(Box::new(reader), &filename, &trace_id)
                .await?;

            info!(
                trace_id = %trace_id,
                endpoint = ENDPOINT,
                file_id = %outcome.id,
                "Upload successful."
            );

            return Ok(Json(UploadResponse {
                key: outcome.key,
                id: outcome.id,
                message: "Upload successful.".to_string(),
            }));
        }

        Err(AppError::bad_request(
            "Missing file parameter.",
            "multipart field 'file' is required",
        ))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            error!(trace_id = %trace_id, endpoint = ENDPOINT, error = %e, "Upload failed.");
            // Drain what is left of the body so the client sees our response
            // instead of a connection reset
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.body_text();
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Upload rejected: {}", err_msg);
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::bad_request("Missing file parameter.", err_msg)
    }
}
