use crate::utils::validation::sanitize_key_component;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

pub type ObjectReader<'a> = Box<dyn AsyncRead + Unpin + Send + 'a>;

/// Raw object written by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Also the primary key of the file's metadata record.
    pub id: String,
    pub key: String,
    pub size: i64,
}

/// Byte-level object storage backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streams `reader` to `key`, returning the number of bytes written.
    /// A failed write leaves nothing visible under `key`.
    async fn put_stream<'a>(
        &self,
        key: &str,
        reader: ObjectReader<'a>,
        metadata: HashMap<String, String>,
    ) -> Result<i64>;

    async fn object_exists(&self, key: &str) -> Result<bool>;
}

/// Builds raw-namespace keys and writes uploads through an [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
    raw_prefix: String,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>, raw_prefix: impl Into<String>) -> Self {
        Self {
            store,
            raw_prefix: raw_prefix.into(),
        }
    }

    /// `<raw prefix><id>-<filename>`. The processor recovers the id from the
    /// text between the prefix and the first `-` after the uuid.
    pub fn raw_key(&self, id: &str, filename: &str) -> String {
        format!(
            "{}{}-{}",
            self.raw_prefix,
            id,
            sanitize_key_component(filename)
        )
    }

    /// Generates a fresh id, derives the key from it and streams the content.
    pub async fn put<'a>(
        &self,
        reader: ObjectReader<'a>,
        name_hint: &str,
        trace_id: &str,
    ) -> Result<StoredObject> {
        let id = Uuid::new_v4().to_string();
        let key = self.raw_key(&id, name_hint);

        let metadata = HashMap::from([("trace_id".to_string(), trace_id.to_string())]);
        let size = self.store.put_stream(&key, reader, metadata).await?;

        tracing::debug!(file_id = %id, key = %key, size, "Raw object stored");

        Ok(StoredObject { id, key, size })
    }

    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        self.store.object_exists(key).await
    }
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    chunk_size: usize,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, chunk_size: usize) -> Self {
        Self {
            client,
            bucket,
            chunk_size,
        }
    }

    async fn put_single(
        &self,
        key: &str,
        data: Vec<u8>,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .set_metadata(Some(metadata))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| anyhow!("S3 PutObject failed for {}: {}", key, DisplayErrorContext(&e)))?;
        Ok(())
    }

    async fn put_multipart<'a>(
        &self,
        key: &str,
        upload_id: &str,
        first_chunk: Vec<u8>,
        mut reader: ObjectReader<'a>,
    ) -> Result<i64> {
        let mut completed_parts = Vec::new();
        let mut part_number = 1;
        let mut total_size = 0i64;
        let mut chunk = first_chunk;

        while !chunk.is_empty() {
            total_size += chunk.len() as i64;
            let part = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| {
                    anyhow!(
                        "S3 UploadPart {} failed for {}: {}",
                        part_number,
                        key,
                        DisplayErrorContext(&e)
                    )
                })?;

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(part.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            part_number += 1;
            chunk = read_chunk(&mut reader, self.chunk_size).await?;
        }

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "S3 CompleteMultipartUpload failed for {}: {}",
                    key,
                    DisplayErrorContext(&e)
                )
            })?;

        Ok(total_size)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_stream<'a>(
        &self,
        key: &str,
        mut reader: ObjectReader<'a>,
        metadata: HashMap<String, String>,
    ) -> Result<i64> {
        let first_chunk = read_chunk(&mut reader, self.chunk_size).await?;

        // Anything that fits in one part goes out as a plain PutObject
        if first_chunk.len() < self.chunk_size {
            let size = first_chunk.len() as i64;
            self.put_single(key, first_chunk, metadata).await?;
            return Ok(size);
        }

        let upload = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "S3 CreateMultipartUpload failed for {}: {}",
                    key,
                    DisplayErrorContext(&e)
                )
            })?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| anyhow!("No upload ID returned for {}", key))?
            .to_string();

        match self.put_multipart(key, &upload_id, first_chunk, reader).await {
            Ok(size) => Ok(size),
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::error!(
                        key = %key,
                        upload_id = %upload_id,
                        "Failed to abort multipart upload: {}",
                        DisplayErrorContext(&abort_err)
                    );
                }
                Err(e)
            }
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(
                        "S3 HeadObject failed for {}: {}",
                        key,
                        DisplayErrorContext(&service_error)
                    ))
                }
            }
        }
    }
}

/// Reads until `chunk_size` bytes are buffered or the stream ends.
async fn read_chunk<'a>(reader: &mut ObjectReader<'a>, chunk_size: usize) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; chunk_size];
    let mut n = 0;
    while n < chunk_size {
        let read = reader
            .read(&mut buffer[n..])
            .await
            .context("Failed to read upload stream")?;
        if read == 0 {
            break;
        }
        n += read;
    }
    buffer.truncate(n);
    Ok(buffer)
}
