use crate::models::FileMetadata;
use crate::services::metadata::{MetadataError, MetadataStore};
use crate::services::storage::{ObjectReader, ObjectStoreGateway};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum IngestError {
    /// Nothing was persisted.
    #[error("Upload to object store failed: {0:#}")]
    Storage(anyhow::Error),

    /// The object exists under `key` but has no metadata record.
    #[error("Object {key} stored but metadata registration failed: {source}")]
    MetadataRegistration {
        key: String,
        id: String,
        #[source]
        source: MetadataError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub key: String,
    pub id: String,
    pub size: i64,
}

/// Object write followed by metadata write.
///
/// The two writes are not transactional. When the second fails the object
/// stays behind as an orphan: it is logged with its key and id for
/// reconciliation and reported to the caller, but not deleted.
pub struct IngestionService {
    objects: ObjectStoreGateway,
    metadata: Arc<dyn MetadataStore>,
}

impl IngestionService {
    pub fn new(objects: ObjectStoreGateway, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { objects, metadata }
    }

    pub async fn ingest<'a>(
        &self,
        reader: ObjectReader<'a>,
        filename: &str,
        trace_id: &str,
    ) -> Result<IngestOutcome, IngestError> {
        // 1. Raw object
        let stored = self
            .objects
            .put(reader, filename, trace_id)
            .await
            .map_err(IngestError::Storage)?;

        // 2. Record, sized from what was actually written
        let record = FileMetadata::uploaded(stored.id.clone(), filename, stored.size);

        // 3. Metadata
        if let Err(e) = self.metadata.create(&record).await {
            error!(
                trace_id = %trace_id,
                file_id = %stored.id,
                key = %stored.key,
                error = %e,
                "Orphaned object: metadata registration failed after upload"
            );
            return Err(IngestError::MetadataRegistration {
                key: stored.key,
                id: stored.id,
                source: e,
            });
        }

        info!(
            trace_id = %trace_id,
            file_id = %stored.id,
            key = %stored.key,
            size = stored.size,
            "File ingested"
        );

        Ok(IngestOutcome {
            key: stored.key,
            id: stored.id,
            size: stored.size,
        })
    }
}
