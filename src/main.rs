use clap::Parser;
use dotenvy::dotenv;
use file_pipeline::config::PipelineConfig;
use file_pipeline::infrastructure::{database, storage, telemetry};
use file_pipeline::services::metadata::SeaOrmMetadataStore;
use file_pipeline::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the API server to
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    /// Port for the API server
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment & Logging
    dotenv().ok();
    let args = Args::parse();
    init_tracing();

    info!("🚀 Starting File Pipeline API...");

    // 2. Configuration (missing bucket is the only fatal case)
    let config = PipelineConfig::from_env()?;
    info!(
        "🛡️  Config: Max Size={}MB, Chunk={}MB, Prefix={}",
        config.max_file_size / 1024 / 1024,
        config.chunk_size / 1024 / 1024,
        config.raw_prefix
    );

    // 3. Stores & telemetry
    let db = database::setup_database(&config.database_url).await?;
    let object_store = storage::setup_storage(&config).await;
    let telemetry = telemetry::setup_telemetry(&config);

    let state = AppState::new(
        object_store,
        Arc::new(SeaOrmMetadataStore::new(db)),
        telemetry,
        config,
    );

    // 4. HTTP server
    let app = create_app(state);
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://{}", addr);
    info!("📖 Swagger UI documentation: http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 File Pipeline exited cleanly.");
    Ok(())
}

/// `LOG_FORMAT=json` for one JSON object per line, human-readable otherwise.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "file_pipeline=info,metrics=info,tower_http=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
