use crate::config::PipelineConfig;
use crate::services::storage::S3ObjectStore;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn setup_storage(config: &PipelineConfig) -> Arc<S3ObjectStore> {
    info!(
        "☁️  Object store: {} (Bucket: {}, Prefix: {})",
        config.s3_endpoint.as_deref().unwrap_or("aws"),
        config.bucket,
        config.raw_prefix
    );

    // Timeouts surface as errors from the store calls, never as a silent success
    let timeouts = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(10))
        .operation_attempt_timeout(Duration::from_secs(120))
        .build();

    let mut loader = aws_config::from_env()
        .region(Region::new(config.region.clone()))
        .timeout_config(timeouts);
    if let Some(endpoint_url) = &config.s3_endpoint {
        loader = loader.endpoint_url(endpoint_url);
    }
    let aws_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.s3_endpoint.is_some())
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    // Ensure bucket exists
    match s3_client.head_bucket().bucket(&config.bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", config.bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", config.bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&config.bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", config.bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", config.bucket);
            }
        }
    }

    Arc::new(S3ObjectStore::new(
        s3_client,
        config.bucket.clone(),
        config.chunk_size,
    ))
}
