//! Storage module for attachment blobs
//!
//! `BlobStore` is the seam the incident engine writes through. Two backends:
//! MinIO/S3 via rust-s3, and a local directory served at `/uploads`.

mod local_disk;
mod minio_client;

use async_trait::async_trait;

use crate::core::error::Result;

pub use local_disk::LocalDiskStore;
pub use minio_client::MinIOClient;

/// Content store that returns a retrievable URL per uploaded blob
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` and return the URL clients fetch it from
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String>;

    /// Remove a blob previously returned by [`BlobStore::put`]
    async fn remove(&self, url: &str) -> Result<()>;
}
