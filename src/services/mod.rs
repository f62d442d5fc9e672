pub mod ingestion_service;
pub mod metadata;
pub mod status_service;
pub mod storage;
pub mod telemetry;
