use crate::entities::{file_metadata, prelude::*};
use crate::models::{FileMetadata, ProcessingState, ProcessingUpdate};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("File metadata {0} not found")]
    NotFound(String),

    #[error("Malformed file metadata {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("Invalid processing transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ProcessingState,
        to: ProcessingState,
    },

    #[error("Metadata store unavailable: {0}")]
    Unavailable(#[from] DbErr),
}

impl MetadataError {
    /// Not-found is a client problem; everything else may be worth a retry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::NotFound(_))
    }
}

/// Key-value table of file metadata, keyed by id.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Once this returns `Ok`, `get_by_id` sees the record from any caller.
    async fn create(&self, record: &FileMetadata) -> Result<(), MetadataError>;
    async fn get_by_id(&self, id: &str) -> Result<FileMetadata, MetadataError>;
    /// Full unordered scan. No pagination, so only suitable for small tables.
    async fn list_all(&self) -> Result<Vec<FileMetadata>, MetadataError>;
    /// Lookup through the sha256 index, used by the processor for deduplication.
    async fn find_by_sha256(&self, sha256: &str) -> Result<Vec<FileMetadata>, MetadataError>;
    async fn ping(&self) -> bool;
}

/// Write path of the external processor.
///
/// The request path never calls this: records advance only when the worker
/// reports progress. Implementations must refuse backward transitions and
/// treat a repeated write of the current state as a no-op.
#[async_trait]
pub trait ProcessingCompletion: Send + Sync {
    async fn advance(
        &self,
        id: &str,
        update: ProcessingUpdate,
    ) -> Result<FileMetadata, MetadataError>;
}

impl TryFrom<file_metadata::Model> for FileMetadata {
    type Error = MetadataError;

    fn try_from(model: file_metadata::Model) -> Result<Self, Self::Error> {
        let processing_state =
            model
                .processing_state
                .parse()
                .map_err(|e: crate::models::UnknownProcessingState| MetadataError::Malformed {
                    id: model.id.clone(),
                    reason: e.to_string(),
                })?;

        Ok(FileMetadata {
            id: model.id,
            filename: model.filename,
            size: model.size,
            processing_state,
            created_at: model.created_at,
            sha256: model.sha256,
            processed_key: model.processed_key,
        })
    }
}

pub struct SeaOrmMetadataStore {
    db: DatabaseConnection,
}

impl SeaOrmMetadataStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MetadataStore for SeaOrmMetadataStore {
    async fn create(&self, record: &FileMetadata) -> Result<(), MetadataError> {
        if record.id.is_empty() {
            return Err(MetadataError::Malformed {
                id: record.id.clone(),
                reason: "empty id".to_string(),
            });
        }

        let model = file_metadata::ActiveModel {
            id: Set(record.id.clone()),
            filename: Set(record.filename.clone()),
            size: Set(record.size),
            processing_state: Set(record.processing_state.to_string()),
            created_at: Set(record.created_at),
            sha256: Set(record.sha256.clone()),
            processed_key: Set(record.processed_key.clone()),
        };

        model.insert(&self.db).await?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<FileMetadata, MetadataError> {
        FileMetadataRecords::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))?
            .try_into()
    }

    async fn list_all(&self) -> Result<Vec<FileMetadata>, MetadataError> {
        FileMetadataRecords::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(FileMetadata::try_from)
            .collect()
    }

    async fn find_by_sha256(&self, sha256: &str) -> Result<Vec<FileMetadata>, MetadataError> {
        FileMetadataRecords::find()
            .filter(file_metadata::Column::Sha256.eq(sha256))
            .all(&self.db)
            .await?
            .into_iter()
            .map(FileMetadata::try_from)
            .collect()
    }

    async fn ping(&self) -> bool {
        self.db.ping().await.is_ok()
    }
}

#[async_trait]
impl ProcessingCompletion for SeaOrmMetadataStore {
    async fn advance(
        &self,
        id: &str,
        update: ProcessingUpdate,
    ) -> Result<FileMetadata, MetadataError> {
        let next = update.state;
        let allowed_from: Vec<String> = [
            ProcessingState::Uploaded,
            ProcessingState::Processing,
            ProcessingState::Done,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(next))
        .map(|from| from.to_string())
        .collect();

        // Conditional write: the state guard lives in the WHERE clause so two
        // workers racing on the same record cannot move it backwards.
        let mut query = FileMetadataRecords::update_many()
            .col_expr(
                file_metadata::Column::ProcessingState,
                Expr::value(next.to_string()),
            )
            .filter(file_metadata::Column::Id.eq(id))
            .filter(file_metadata::Column::ProcessingState.is_in(allowed_from));

        // Derived fields only accompany the terminal state.
        if next.is_terminal() {
            if let Some(sha256) = update.sha256 {
                query = query.col_expr(file_metadata::Column::Sha256, Expr::value(sha256));
            }
            if let Some(processed_key) = update.processed_key {
                query = query.col_expr(
                    file_metadata::Column::ProcessedKey,
                    Expr::value(processed_key),
                );
            }
        }

        let result = query.exec(&self.db).await?;
        let current = self.get_by_id(id).await?;

        if result.rows_affected == 0 {
            return Err(MetadataError::InvalidTransition {
                id: id.to_string(),
                from: current.processing_state,
                to: next,
            });
        }

        tracing::info!(
            file_id = %id,
            processing_state = %current.processing_state,
            "File processing state advanced"
        );

        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database;
    use sea_orm::Database;

    async fn setup_store() -> SeaOrmMetadataStore {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        database::run_migrations(&db).await.unwrap();
        SeaOrmMetadataStore::new(db)
    }

    #[tokio::test]
    async fn test_create_then_get_by_id() {
        let store = setup_store().await;
        let record = FileMetadata::uploaded("id-1", "a.txt", 10);

        store.create(&record).await.unwrap();
        let fetched = store.get_by_id("id-1").await.unwrap();

        assert_eq!(fetched.id, "id-1");
        assert_eq!(fetched.filename, "a.txt");
        assert_eq!(fetched.size, 10);
        assert_eq!(fetched.processing_state, ProcessingState::Uploaded);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let store = setup_store().await;

        let err = store.get_by_id("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = setup_store().await;
        let record = FileMetadata::uploaded("dup", "a.txt", 1);

        store.create(&record).await.unwrap();
        let err = store.create(&record).await.unwrap_err();
        assert!(matches!(err, MetadataError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_list_all_returns_every_record() {
        let store = setup_store().await;
        for i in 0..3 {
            let record = FileMetadata::uploaded(format!("id-{i}"), "f.bin", i);
            store.create(&record).await.unwrap();
        }

        let mut ids: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["id-0", "id-1", "id-2"]);
    }

    #[tokio::test]
    async fn test_advance_is_monotonic_and_idempotent() {
        let store = setup_store().await;
        store
            .create(&FileMetadata::uploaded("id-1", "a.txt", 10))
            .await
            .unwrap();

        let record = store
            .advance("id-1", ProcessingUpdate::processing())
            .await
            .unwrap();
        assert_eq!(record.processing_state, ProcessingState::Processing);
        assert!(record.sha256.is_empty());

        let record = store
            .advance("id-1", ProcessingUpdate::done("deadbeef", "processed/id-1.json"))
            .await
            .unwrap();
        assert_eq!(record.processing_state, ProcessingState::Done);
        assert_eq!(record.sha256, "deadbeef");
        assert_eq!(record.processed_key, "processed/id-1.json");

        // Same terminal write again is a no-op, not an error
        let again = store
            .advance("id-1", ProcessingUpdate::done("deadbeef", "processed/id-1.json"))
            .await
            .unwrap();
        assert_eq!(again, record);

        let err = store
            .advance("id-1", ProcessingUpdate::processing())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MetadataError::InvalidTransition {
                from: ProcessingState::Done,
                to: ProcessingState::Processing,
                ..
            }
        ));
        assert_eq!(
            store.get_by_id("id-1").await.unwrap().processing_state,
            ProcessingState::Done
        );
    }

    #[tokio::test]
    async fn test_advance_unknown_id_is_not_found() {
        let store = setup_store().await;

        let err = store
            .advance("missing", ProcessingUpdate::processing())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_find_by_sha256_uses_derived_hash() {
        let store = setup_store().await;
        store
            .create(&FileMetadata::uploaded("a", "a.txt", 1))
            .await
            .unwrap();
        store
            .create(&FileMetadata::uploaded("b", "b.txt", 1))
            .await
            .unwrap();
        store
            .advance("a", ProcessingUpdate::done("cafe", "processed/a.json"))
            .await
            .unwrap();

        let matches = store.find_by_sha256("cafe").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
        assert!(store.find_by_sha256("beef").await.unwrap().is_empty());
    }
}
