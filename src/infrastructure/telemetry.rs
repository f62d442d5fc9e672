use crate::config::PipelineConfig;
use crate::services::telemetry::{
    HttpMetricsPublisher, LogMetricsPublisher, MetricsPublisher, TelemetryEmitter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the process-wide telemetry handle. A broken collector config falls
/// back to log publishing rather than stopping startup.
pub fn setup_telemetry(config: &PipelineConfig) -> TelemetryEmitter {
    let publisher: Arc<dyn MetricsPublisher> = match &config.metrics_endpoint {
        Some(endpoint) => match HttpMetricsPublisher::new(endpoint.clone(), PUBLISH_TIMEOUT) {
            Ok(publisher) => {
                info!("📈 Metrics: {} (Namespace: {})", endpoint, config.metrics_namespace);
                Arc::new(publisher)
            }
            Err(e) => {
                warn!("⚠️  Metrics collector unusable ({}), logging metrics instead", e);
                Arc::new(LogMetricsPublisher)
            }
        },
        None => {
            info!("📈 Metrics: log (Namespace: {})", config.metrics_namespace);
            Arc::new(LogMetricsPublisher)
        }
    };

    TelemetryEmitter::new(publisher, &config.metrics_namespace)
}
