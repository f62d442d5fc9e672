use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const REQUESTS_COUNT: &str = "RequestsCount";
pub const REQUEST_LATENCY_MS: &str = "RequestLatencyMs";
pub const REQUEST_FAILURES: &str = "RequestFailures";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricUnit {
    Count,
    Milliseconds,
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDatum {
    pub metric_name: &'static str,
    pub unit: MetricUnit,
    pub value: f64,
    /// Value of the `Endpoint` dimension, e.g. `POST /files`.
    pub endpoint: String,
}

impl MetricDatum {
    /// Request count plus latency for a completed operation.
    pub fn success_batch(operation: &str, latency: Duration) -> Vec<MetricDatum> {
        vec![
            MetricDatum {
                metric_name: REQUESTS_COUNT,
                unit: MetricUnit::Count,
                value: 1.0,
                endpoint: operation.to_string(),
            },
            MetricDatum {
                metric_name: REQUEST_LATENCY_MS,
                unit: MetricUnit::Milliseconds,
                value: latency.as_millis() as f64,
                endpoint: operation.to_string(),
            },
        ]
    }

    pub fn failure_batch(operation: &str) -> Vec<MetricDatum> {
        vec![MetricDatum {
            metric_name: REQUEST_FAILURES,
            unit: MetricUnit::Count,
            value: 1.0,
            endpoint: operation.to_string(),
        }]
    }
}

/// Sink for metric batches. Implementations may fail or even panic; the
/// emitter contains both.
#[async_trait]
pub trait MetricsPublisher: Send + Sync {
    async fn publish(&self, namespace: &str, batch: &[MetricDatum]) -> Result<()>;
}

/// Publishes metrics as structured `metrics`-target tracing events.
pub struct LogMetricsPublisher;

#[async_trait]
impl MetricsPublisher for LogMetricsPublisher {
    async fn publish(&self, namespace: &str, batch: &[MetricDatum]) -> Result<()> {
        for datum in batch {
            info!(
                target: "metrics",
                namespace = %namespace,
                metric = %datum.metric_name,
                unit = %datum.unit,
                value = datum.value,
                endpoint = %datum.endpoint,
                "metric_published"
            );
        }
        Ok(())
    }
}

/// Posts each batch as JSON to a metrics collector.
pub struct HttpMetricsPublisher {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct MetricsPayload<'a> {
    namespace: &'a str,
    metrics: &'a [MetricDatum],
}

impl HttpMetricsPublisher {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl MetricsPublisher for HttpMetricsPublisher {
    async fn publish(&self, namespace: &str, batch: &[MetricDatum]) -> Result<()> {
        self.client
            .post(&self.endpoint)
            .json(&MetricsPayload {
                namespace,
                metrics: batch,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub struct NoopMetricsPublisher;

#[async_trait]
impl MetricsPublisher for NoopMetricsPublisher {
    async fn publish(&self, _namespace: &str, _batch: &[MetricDatum]) -> Result<()> {
        Ok(())
    }
}

/// Fire-and-forget metrics handle.
///
/// Built once at startup and shared by cloning. Every emission runs on its
/// own detached task: the caller never waits for it, a client disconnect
/// never cancels it, and any error or panic inside it ends up as a log line.
#[derive(Clone)]
pub struct TelemetryEmitter {
    publisher: Arc<dyn MetricsPublisher>,
    namespace: Arc<str>,
}

impl TelemetryEmitter {
    pub fn new(publisher: Arc<dyn MetricsPublisher>, namespace: &str) -> Self {
        Self {
            publisher,
            namespace: Arc::from(namespace),
        }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopMetricsPublisher), "noop")
    }

    pub fn emit_success(&self, operation: &str, latency: Duration) {
        self.dispatch(operation, MetricDatum::success_batch(operation, latency));
    }

    pub fn emit_failure(&self, operation: &str) {
        self.dispatch(operation, MetricDatum::failure_batch(operation));
    }

    fn dispatch(&self, operation: &str, batch: Vec<MetricDatum>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(operation = %operation, "No async runtime, dropping metrics");
            return;
        };

        let publisher = self.publisher.clone();
        let namespace = self.namespace.clone();
        let operation = operation.to_string();

        runtime.spawn(async move {
            let outcome = AssertUnwindSafe(async {
                publisher.publish(&namespace, &batch).await
            })
            .catch_unwind()
            .await;

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(operation = %operation, error = %e, "Failed to publish metrics");
                }
                Err(panic) => {
                    error!(
                        operation = %operation,
                        panic = %panic_message(panic.as_ref()),
                        "Panic in metrics task"
                    );
                }
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
