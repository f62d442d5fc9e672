use crate::AppState;
use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

/// Reachability of the two stores a request depends on.
///
/// `status` is `degraded` as soon as either store fails its probe; the
/// endpoint still answers 200.
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub storage: String,
    pub version: String,
}

fn reachability(ok: bool) -> String {
    let label = if ok { "connected" } else { "disconnected" };
    label.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Metadata table and bucket reachability", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let metadata_ok = state.metadata.ping().await;
    // Any answer, including "no such key", means the bucket is reachable
    let objects_ok = state.objects.object_exists("health-check").await.is_ok();

    Json(HealthResponse {
        status: (if metadata_ok && objects_ok { "ok" } else { "degraded" }).to_string(),
        database: reachability(metadata_ok),
        storage: reachability(objects_ok),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
