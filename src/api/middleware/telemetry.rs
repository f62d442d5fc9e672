use crate::services::telemetry::TelemetryEmitter;
use axum::{
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Times each routed request and hands the outcome to the telemetry emitter.
///
/// The emission is spawned and never awaited, so the response goes out
/// unchanged whatever happens to the metrics.
pub async fn telemetry_middleware(
    State(telemetry): State<TelemetryEmitter>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let operation = operation_label(req.method(), req.extensions().get::<MatchedPath>());

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status();

    info!(
        target: "metrics",
        operation = %operation,
        status = %status.as_u16(),
        latency_ms = %latency.as_millis(),
        "request_completed"
    );

    if status.is_success() {
        telemetry.emit_success(&operation, latency);
    } else {
        telemetry.emit_failure(&operation);
    }

    response
}

/// `Endpoint` dimension value. Uses the route template, never the raw path,
/// so the set of series stays bounded.
pub fn operation_label(method: &Method, matched: Option<&MatchedPath>) -> String {
    match matched {
        Some(path) => format!("{} {}", method, path.as_str()),
        None => format!("{} unmatched", method),
    }
}
