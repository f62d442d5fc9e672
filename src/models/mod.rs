use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Lifecycle stage of a file's derived-artifact computation.
///
/// Ingestion always creates records as `Uploaded`; only the external
/// processor advances them. The order is strictly
/// `Uploaded -> Processing -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Uploaded,
    Processing,
    Done,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Uploaded => "uploaded",
            ProcessingState::Processing => "processing",
            ProcessingState::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingState::Done)
    }

    /// Whether a record in `self` may be moved to `next`.
    ///
    /// Rewriting the current state is allowed (idempotent terminal writes);
    /// moving backwards, including back to `Uploaded`, is not.
    pub fn can_transition_to(&self, next: ProcessingState) -> bool {
        next >= *self
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown processing state: {0}")]
pub struct UnknownProcessingState(pub String);

impl FromStr for ProcessingState {
    type Err = UnknownProcessingState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(ProcessingState::Uploaded),
            "processing" => Ok(ProcessingState::Processing),
            "done" => Ok(ProcessingState::Done),
            other => Err(UnknownProcessingState(other.to_string())),
        }
    }
}

/// Metadata record for one ingested file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub id: String,
    pub filename: String,
    pub size: i64,
    pub processing_state: ProcessingState,
    pub created_at: DateTime<Utc>,
    /// Empty until the processor has hashed the content.
    #[serde(default)]
    pub sha256: String,
    /// Empty until the processor has written the derived artifact.
    #[serde(default)]
    pub processed_key: String,
}

impl FileMetadata {
    /// A freshly ingested record: `uploaded`, created now, no derived fields.
    pub fn uploaded(id: impl Into<String>, filename: impl Into<String>, size: i64) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            size,
            processing_state: ProcessingState::Uploaded,
            created_at: Utc::now(),
            sha256: String::new(),
            processed_key: String::new(),
        }
    }

    /// True once both derived fields are visible. A `done` record may briefly
    /// lack them when the processor's writes land separately.
    pub fn has_derived_fields(&self) -> bool {
        !self.sha256.is_empty() && !self.processed_key.is_empty()
    }
}

/// Fields the external processor writes when it advances a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingUpdate {
    pub state: ProcessingState,
    pub sha256: Option<String>,
    pub processed_key: Option<String>,
}

impl ProcessingUpdate {
    pub fn processing() -> Self {
        Self {
            state: ProcessingState::Processing,
            sha256: None,
            processed_key: None,
        }
    }

    pub fn done(sha256: impl Into<String>, processed_key: impl Into<String>) -> Self {
        Self {
            state: ProcessingState::Done,
            sha256: Some(sha256.into()),
            processed_key: Some(processed_key.into()),
        }
    }
}
