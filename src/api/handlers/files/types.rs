use crate::models::{FileMetadata, ProcessingState};
use serde::Serialize;
use utoipa::ToSchema;

/// Multipart body of `POST /files`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    /// Raw object key, `raw/<id>-<filename>`
    pub key: String,
    pub id: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct FileListResponse {
    pub data: Vec<FileMetadata>,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct FileResponse {
    pub data: FileMetadata,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: ProcessingState,
    /// Human-readable, not meant to be parsed
    pub result: String,
}
