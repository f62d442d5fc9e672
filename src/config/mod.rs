use std::env;

/// S3 rejects multipart parts smaller than this, except the last one.
pub const MIN_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Runtime configuration for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Object store bucket (required: BUCKET_NAME)
    pub bucket: String,

    /// Metadata table connection string (default: local SQLite file)
    pub database_url: String,

    /// Custom S3 endpoint, e.g. MinIO. Enables path-style addressing.
    pub s3_endpoint: Option<String>,

    /// Region (default: "us-east-1")
    pub region: String,

    /// Namespace for raw uploads; the processing trigger filters on it (default: "raw/")
    pub raw_prefix: String,

    /// Namespace attached to every published metric (default: "FilePipeline/API")
    pub metrics_namespace: String,

    /// Collector URL; when unset metrics are written to the log
    pub metrics_endpoint: Option<String>,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Multipart part size in bytes (default: 8 MB, never below 5 MB)
    pub chunk_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            database_url: "sqlite://file_pipeline.db?mode=rwc".to_string(),
            s3_endpoint: None,
            region: "us-east-1".to_string(),
            raw_prefix: "raw/".to_string(),
            metrics_namespace: "FilePipeline/API".to_string(),
            metrics_endpoint: None,
            max_file_size: 256 * 1024 * 1024, // 256 MB
            chunk_size: 8 * 1024 * 1024,      // 8 MB
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Fails only when BUCKET_NAME is missing; every other setting has a default.
    pub fn from_env() -> anyhow::Result<Self> {
        let default = Self::default();

        let bucket = env::var("BUCKET_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("BUCKET_NAME must be set"))?;

        Ok(Self {
            bucket,

            database_url: env::var("DATABASE_URL").unwrap_or(default.database_url),

            s3_endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),

            region: env::var("AWS_REGION").unwrap_or(default.region),

            raw_prefix: env::var("RAW_PREFIX")
                .ok()
                .map(|v| normalize_prefix(&v))
                .unwrap_or(default.raw_prefix),

            metrics_namespace: env::var("METRICS_NAMESPACE").unwrap_or(default.metrics_namespace),

            metrics_endpoint: env::var("METRICS_ENDPOINT").ok().filter(|v| !v.is_empty()),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            chunk_size: env::var("CHUNK_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(|v: usize| v.max(MIN_CHUNK_SIZE))
                .unwrap_or(default.chunk_size),
        })
    }

    /// Local development against MinIO with an in-memory metadata table
    pub fn development() -> Self {
        Self {
            bucket: "file-pipeline-dev".to_string(),
            database_url: "sqlite::memory:".to_string(),
            s3_endpoint: Some("http://127.0.0.1:9000".to_string()),
            ..Self::default()
        }
    }
}

/// Prefixes are matched literally by the event rule, so keep exactly one trailing slash.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "raw/".to_string()
    } else {
        format!("{}/", trimmed)
    }
}
