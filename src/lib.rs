pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::PipelineConfig;
use crate::services::ingestion_service::IngestionService;
use crate::services::metadata::MetadataStore;
use crate::services::status_service::StatusService;
use crate::services::storage::{ObjectStore, ObjectStoreGateway};
use crate::services::telemetry::TelemetryEmitter;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::files::upload::upload_file,
        api::handlers::files::list::list_files,
        api::handlers::files::list::get_file,
        api::handlers::files::status::get_file_status,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::error::ErrorResponse,
            api::handlers::files::UploadForm,
            api::handlers::files::UploadResponse,
            api::handlers::files::FileListResponse,
            api::handlers::files::FileResponse,
            api::handlers::files::StatusResponse,
            api::handlers::health::HealthResponse,
            models::FileMetadata,
            models::ProcessingState,
        )
    ),
    tags(
        (name = "files", description = "File ingestion and processing status"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub ingestion: Arc<IngestionService>,
    pub status: Arc<StatusService>,
    pub objects: ObjectStoreGateway,
    pub metadata: Arc<dyn MetadataStore>,
    pub telemetry: TelemetryEmitter,
    pub config: PipelineConfig,
}

impl AppState {
    /// Wires the services over the given stores. The same stores back both
    /// the write path and the read path.
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        telemetry: TelemetryEmitter,
        config: PipelineConfig,
    ) -> Self {
        let objects = ObjectStoreGateway::new(object_store, config.raw_prefix.clone());
        Self {
            ingestion: Arc::new(IngestionService::new(objects.clone(), metadata.clone())),
            status: Arc::new(StatusService::new(metadata.clone())),
            objects,
            metadata,
            telemetry,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/files",
            post(api::handlers::files::upload_file).get(api::handlers::files::list_files),
        )
        .route("/files/:id", get(api::handlers::files::get_file))
        .route(
            "/files/:id/status",
            get(api::handlers::files::get_file_status),
        )
        .layer(from_fn_with_state(
            state.telemetry.clone(),
            api::middleware::telemetry::telemetry_middleware,
        ))
        // Inside the request id layer so every span carries the final id
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&api::middleware::request_id::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_file_size + 1024 * 1024, // Add 1MB for multipart overhead
        ))
        .with_state(state)
}
