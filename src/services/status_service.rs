use crate::models::{FileMetadata, ProcessingState};
use crate::services::metadata::{MetadataError, MetadataStore};
use std::sync::Arc;

pub const PROCESSING_COMPLETE: &str = "File processing completed.";
pub const PROCESSING_PENDING: &str = "processing not completed yet";

/// Read side of the pipeline. Every call goes to the metadata store; there is
/// no caching, so callers always see the processor's latest write.
pub struct StatusService {
    metadata: Arc<dyn MetadataStore>,
}

impl StatusService {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// The record's state, verbatim.
    pub async fn get_status(&self, id: &str) -> Result<ProcessingState, MetadataError> {
        Ok(self.metadata.get_by_id(id).await?.processing_state)
    }

    pub async fn get_file(&self, id: &str) -> Result<FileMetadata, MetadataError> {
        self.metadata.get_by_id(id).await
    }

    pub async fn list_files(&self) -> Result<Vec<FileMetadata>, MetadataError> {
        self.metadata.list_all().await
    }
}

/// Human-readable summary for status polling. Not meant to be parsed.
pub fn describe(state: ProcessingState) -> &'static str {
    if state.is_terminal() {
        PROCESSING_COMPLETE
    } else {
        PROCESSING_PENDING
    }
}
