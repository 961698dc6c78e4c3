//! MinIO/S3-compatible storage client
//!
//! Uses rust-s3 with path-style addressing. Every key lives under the configured
//! prefix; URLs are built against the public endpoint.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use super::BlobStore;
use crate::core::config::MinIOConfig;
use crate::core::error::{AppError, Result};

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    public_endpoint: String,
    prefix: String,
}

impl MinIOClient {
    pub fn new(config: MinIOConfig) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // http://endpoint/bucket instead of http://bucket.endpoint
        bucket.set_path_style();

        info!(
            "MinIO client initialized for endpoint: {}, bucket: {}, prefix: {}",
            config.endpoint,
            bucket.name(),
            config.prefix
        );

        Ok(Self {
            bucket,
            region,
            credentials,
            public_endpoint: config.public_endpoint.trim_end_matches('/').to_string(),
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    pub fn bucket_name(&self) -> String {
        self.bucket.name()
    }

    /// Ensure the bucket exists, create if not
    pub async fn ensure_bucket_exists(&self) -> Result<()> {
        let created = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match created {
            Ok(_) => {
                info!("Bucket '{}' created successfully", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
                Ok(())
            }
        }
    }

    pub fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    pub fn object_url(&self, object_key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_endpoint,
            self.bucket.name(),
            object_key
        )
    }

    /// Inverse of [`MinIOClient::object_url`]
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let base = format!("{}/{}/", self.public_endpoint, self.bucket.name());
        url.strip_prefix(&base).map(String::from)
    }
}

#[async_trait]
impl BlobStore for MinIOClient {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        let object_key = self.object_key(key);
        let response = self
            .bucket
            .put_object_with_content_type(&object_key, &data, content_type)
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!(
                    "Failed to upload file '{}': {}",
                    object_key, e
                ))
            })?;
        ensure_success(response.status_code(), "upload", &object_key)?;

        debug!(
            "Uploaded file '{}' to bucket '{}'",
            object_key,
            self.bucket.name()
        );
        Ok(self.object_url(&object_key))
    }

    async fn remove(&self, url: &str) -> Result<()> {
        let object_key = self
            .key_from_url(url)
            .ok_or_else(|| AppError::Internal(format!("URL '{}' is not in this bucket", url)))?;

        let response = self.bucket.delete_object(&object_key).await.map_err(|e| {
            AppError::ExternalServiceError(format!(
                "Failed to delete file '{}': {}",
                object_key, e
            ))
        })?;
        ensure_success(response.status_code(), "delete", &object_key)?;

        debug!(
            "Deleted file '{}' from bucket '{}'",
            object_key,
            self.bucket.name()
        );
        Ok(())
    }
}

/// rust-s3 hands back non-2xx answers as data, not errors
fn ensure_success(status: u16, action: &str, object_key: &str) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        warn!("Storage refused to {} '{}': HTTP {}", action, object_key, status);
        Err(AppError::ExternalServiceError(format!(
            "Failed to {} file '{}': storage responded with HTTP {}",
            action, object_key, status
        )))
    }
}
