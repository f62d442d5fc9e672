use crate::entities::file_metadata;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Statement};
use std::time::Duration;
use tracing::info;

pub async fn setup_database(db_url: &str) -> anyhow::Result<DatabaseConnection> {
    info!("📂 Metadata store: {}", db_url);

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Metadata store connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

/// Creates the `file_metadata` table and its `sha256` lookup index.
pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("🔄 Running SeaORM auto-migrations...");
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let table = schema
        .create_table_from_entity(file_metadata::Entity)
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&table)).await?;

    db.execute(Statement::from_string(
        builder,
        "CREATE INDEX IF NOT EXISTS idx_file_metadata_sha256 ON file_metadata(sha256);"
            .to_string(),
    ))
    .await?;

    Ok(())
}
