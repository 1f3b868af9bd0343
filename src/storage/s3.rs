use crate::storage::object::ObjectStore;
use crate::utils::config::RemoteSettings;
use crate::utils::errors::{CertSyncError, Result};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;

/// Amazon S3 (or S3-compatible) bucket
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from the default AWS credential chain
    pub async fn connect(settings: &RemoteSettings) -> Result<Self> {
        let bucket = settings.bucket.clone().ok_or_else(|| {
            CertSyncError::Config("No bucket configured for remote storage".to_string())
        })?;

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(settings.timeout_secs))
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).timeout_config(timeouts);
        if let Some(region) = &settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!("Using S3 bucket '{}'", bucket);
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) if e.raw_response().is_some_and(|r| r.status().as_u16() == 404) => Ok(false),
            Err(e) => Err(CertSyncError::Remote(format!(
                "HEAD s3://{}/{key} failed: {}",
                self.bucket,
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => {
                return Err(CertSyncError::Remote(format!(
                    "GET s3://{}/{key} failed: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                )))
            }
        };

        let body = response.body.collect().await.map_err(|e| {
            CertSyncError::Remote(format!(
                "Transfer of s3://{}/{key} interrupted: {e}",
                self.bucket
            ))
        })?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                CertSyncError::Remote(format!(
                    "PUT s3://{}/{key} failed: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut paginator = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| {
                CertSyncError::Remote(format!(
                    "LIST s3://{}/{prefix} failed: {}",
                    self.bucket,
                    DisplayErrorContext(&e)
                ))
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );
        }

        Ok(keys)
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
