use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use file_pipeline::config::PipelineConfig;
use file_pipeline::infrastructure::database;
use file_pipeline::models::FileMetadata;
use file_pipeline::services::ingestion_service::{IngestError, IngestionService};
use file_pipeline::services::metadata::{MetadataError, MetadataStore, SeaOrmMetadataStore};
use file_pipeline::services::storage::{ObjectReader, ObjectStore, ObjectStoreGateway};
use file_pipeline::services::telemetry::{MetricDatum, MetricsPublisher, TelemetryEmitter};
use file_pipeline::{AppState, create_app};
use http_body_util::BodyExt;
use sea_orm::{Database, DbErr};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

struct MockObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockObjectStore {
    fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_stream<'a>(
        &self,
        key: &str,
        mut reader: ObjectReader<'a>,
        _metadata: HashMap<String, String>,
    ) -> anyhow::Result<i64> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let size = data.len() as i64;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(size)
    }

    async fn object_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}

struct UnreachableObjectStore;

#[async_trait]
impl ObjectStore for UnreachableObjectStore {
    async fn put_stream<'a>(
        &self,
        _key: &str,
        _reader: ObjectReader<'a>,
        _metadata: HashMap<String, String>,
    ) -> anyhow::Result<i64> {
        Err(anyhow!("connection refused"))
    }

    async fn object_exists(&self, _key: &str) -> anyhow::Result<bool> {
        Err(anyhow!("connection refused"))
    }
}

/// Accepts reads, rejects every insert.
struct RejectingMetadataStore;

#[async_trait]
impl MetadataStore for RejectingMetadataStore {
    async fn create(&self, _record: &FileMetadata) -> Result<(), MetadataError> {
        Err(MetadataError::Unavailable(DbErr::Custom(
            "write capacity exceeded".to_string(),
        )))
    }

    async fn get_by_id(&self, id: &str) -> Result<FileMetadata, MetadataError> {
        Err(MetadataError::NotFound(id.to_string()))
    }

    async fn list_all(&self) -> Result<Vec<FileMetadata>, MetadataError> {
        Ok(Vec::new())
    }

    async fn find_by_sha256(&self, _sha256: &str) -> Result<Vec<FileMetadata>, MetadataError> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> bool {
        true
    }
}

struct PanickingPublisher {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MetricsPublisher for PanickingPublisher {
    async fn publish(&self, _namespace: &str, _batch: &[MetricDatum]) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("metrics backend exploded");
    }
}

struct FailingPublisher {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl MetricsPublisher for FailingPublisher {
    async fn publish(&self, _namespace: &str, _batch: &[MetricDatum]) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("throttled"))
    }
}

struct EndpointRecorder {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl MetricsPublisher for EndpointRecorder {
    async fn publish(&self, _namespace: &str, batch: &[MetricDatum]) -> anyhow::Result<()> {
        for datum in batch {
            let _ = self.tx.send(datum.endpoint.clone());
        }
        Ok(())
    }
}

async fn sqlite_store() -> Arc<SeaOrmMetadataStore> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    Arc::new(SeaOrmMetadataStore::new(db))
}

const BOUNDARY: &str = "---------------------------123456789012345678901234567";

fn upload_request(filename: &str, content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
        Content-Type: application/octet-stream\r\n\r\n\
        {content}\r\n\
        --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri("/files")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn wait_for_calls(calls: &AtomicUsize, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while calls.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("telemetry tasks never ran");
}

#[tokio::test]
async fn test_metadata_failure_leaves_retrievable_orphan() {
    let objects = Arc::new(MockObjectStore::new());
    let gateway = ObjectStoreGateway::new(objects.clone(), "raw/".to_string());
    let service = IngestionService::new(gateway.clone(), Arc::new(RejectingMetadataStore));

    let reader: ObjectReader<'_> = Box::new(&b"orphan bytes"[..]);
    let err = service
        .ingest(reader, "orphan.bin", "trace-orphan")
        .await
        .unwrap_err();

    let (key, id) = match err {
        IngestError::MetadataRegistration { key, id, .. } => (key, id),
        other => panic!("expected a metadata registration failure, got {other:?}"),
    };
    assert_eq!(key, format!("raw/{id}-orphan.bin"));
    assert!(gateway.object_exists(&key).await.unwrap());
    assert_eq!(objects.objects.lock().unwrap()[&key], b"orphan bytes");
}

#[tokio::test]
async fn test_metadata_failure_is_reported_over_http() {
    let objects = Arc::new(MockObjectStore::new());
    let state = AppState::new(
        objects.clone(),
        Arc::new(RejectingMetadataStore),
        TelemetryEmitter::noop(),
        PipelineConfig::development(),
    );
    let app = create_app(state);

    let (status, json) = send(&app, upload_request("a.txt", "0123456789")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Metadata record creation failed.");

    // Exactly one object landed, and the error names it
    let keys = objects.keys();
    assert_eq!(keys.len(), 1);
    assert!(json["detail"].as_str().unwrap().contains(&keys[0]));
}

#[tokio::test]
async fn test_storage_failure_creates_no_record() {
    let metadata = sqlite_store().await;
    let state = AppState::new(
        Arc::new(UnreachableObjectStore),
        metadata.clone(),
        TelemetryEmitter::noop(),
        PipelineConfig::development(),
    );
    let app = create_app(state);

    let (status, json) = send(&app, upload_request("a.txt", "0123456789")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Upload failed.");
    assert!(json["detail"].as_str().unwrap().contains("connection refused"));

    assert!(metadata.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_panicking_telemetry_does_not_affect_responses() {
    let calls = Arc::new(AtomicUsize::new(0));
    let telemetry = TelemetryEmitter::new(
        Arc::new(PanickingPublisher {
            calls: calls.clone(),
        }),
        "Test/API",
    );
    let state = AppState::new(
        Arc::new(MockObjectStore::new()),
        sqlite_store().await,
        telemetry,
        PipelineConfig::development(),
    );
    let app = create_app(state);

    let (status, json) = send(&app, upload_request("a.txt", "0123456789")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Upload successful.");
    let id = json["id"].as_str().unwrap().to_string();

    // A failed request emits too
    let (status, _) = send(&app, get_request("/files/does-not-exist")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    wait_for_calls(&calls, 2).await;

    // The panics above must not have taken anything down
    let (status, json) = send(&app, get_request(&format!("/files/{id}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "uploaded");
    assert_eq!(json["result"], "processing not completed yet");

    wait_for_calls(&calls, 3).await;
}

#[tokio::test]
async fn test_failing_telemetry_matches_silent_telemetry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let failing = TelemetryEmitter::new(
        Arc::new(FailingPublisher {
            calls: calls.clone(),
        }),
        "Test/API",
    );

    let noisy_app = create_app(AppState::new(
        Arc::new(MockObjectStore::new()),
        sqlite_store().await,
        failing,
        PipelineConfig::development(),
    ));
    let quiet_app = create_app(AppState::new(
        Arc::new(MockObjectStore::new()),
        sqlite_store().await,
        TelemetryEmitter::noop(),
        PipelineConfig::development(),
    ));

    for app in [&noisy_app, &quiet_app] {
        let (status, json) = send(app, upload_request("same.txt", "payload")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Upload successful.");
        assert!(json["key"].as_str().unwrap().ends_with("-same.txt"));
    }

    let (noisy_status, noisy_json) = send(&noisy_app, get_request("/files/missing")).await;
    let (quiet_status, quiet_json) = send(&quiet_app, get_request("/files/missing")).await;
    assert_eq!(noisy_status, quiet_status);
    assert_eq!(noisy_json, quiet_json);

    wait_for_calls(&calls, 2).await;
}

#[tokio::test]
async fn test_metric_endpoints_use_route_templates() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let app = create_app(AppState::new(
        Arc::new(MockObjectStore::new()),
        sqlite_store().await,
        TelemetryEmitter::new(Arc::new(EndpointRecorder { tx }), "Test/API"),
        PipelineConfig::development(),
    ));

    let (status, _) = send(&app, get_request("/no/such/route/8f3a")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get_request("/files/some-id/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The routed request always emits; collect until it shows up
    let mut endpoints = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(endpoint) = rx.recv().await {
            let done = endpoint == "GET /files/:id/status";
            endpoints.push(endpoint);
            if done {
                break;
            }
        }
    })
    .await
    .expect("no metrics for the routed request");
    tokio::time::sleep(Duration::from_millis(20)).await;
    while let Ok(endpoint) = rx.try_recv() {
        endpoints.push(endpoint);
    }

    // Raw request paths never become metric dimensions
    for endpoint in &endpoints {
        assert!(
            !endpoint.contains("8f3a") && !endpoint.contains("some-id"),
            "raw path leaked into endpoint label {endpoint}"
        );
    }
}

#[tokio::test]
async fn test_health_reports_degraded_when_bucket_unreachable() {
    let app = create_app(AppState::new(
        Arc::new(UnreachableObjectStore),
        sqlite_store().await,
        TelemetryEmitter::noop(),
        PipelineConfig::development(),
    ));

    let (status, json) = send(&app, get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["database"], "connected");
    assert_eq!(json["storage"], "disconnected");
}
