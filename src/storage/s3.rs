//! S3-compatible object store backed by presigned requests
//!
//! Uses `rusty_s3` to sign GET and ListObjectsV2 URLs and `reqwest` to
//! execute them. Longhorn backup targets are commonly MinIO or similarly
//! self-hosted, so addressing is always path-style with an explicit endpoint.

use std::time::Duration;

use reqwest::StatusCode;
use rusty_s3::actions::{ListObjectsV2, S3Action};
use rusty_s3::{Bucket, Credentials, UrlStyle};
use tracing::debug;

use crate::config::S3Config;
use crate::error::{Error, Result};
use crate::storage::ObjectStore;

/// Validity window for presigned request URLs
const PRESIGN_DURATION: Duration = Duration::from_secs(600);

/// Object store client for one bucket
pub struct S3Store {
    bucket: Bucket,
    credentials: Credentials,
    http: reqwest::Client,
}

impl S3Store {
    /// Build a client from resolved S3 settings.
    pub fn new(config: &S3Config) -> Result<Self> {
        let base_url = config.endpoint.parse().map_err(|e| {
            Error::config(format!("invalid S3 endpoint URL '{}': {}", config.endpoint, e))
        })?;

        let bucket = Bucket::new(
            base_url,
            UrlStyle::Path,
            config.bucket.clone(),
            config.region.clone(),
        )
        .map_err(|e| Error::config(format!("failed to create S3 bucket handle: {}", e)))?;

        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
        );

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::storage("client setup", e.to_string()))?;

        Ok(Self {
            bucket,
            credentials,
            http,
        })
    }

    async fn fetch_body(&self, op: &str, url: reqwest::Url) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::storage(op, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::storage(op, format!("unexpected status {}", status)));
        }
        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::storage(op, e.to_string()))?;
        Ok(body.to_vec())
    }
}

impl ObjectStore for S3Store {
    async fn list_common_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let op = format!("LIST {}", prefix);
        let mut prefixes = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut action = self.bucket.list_objects_v2(Some(&self.credentials));
            action.query_mut().insert("prefix", prefix);
            action.query_mut().insert("delimiter", "/");
            if let Some(ref token) = continuation_token {
                action.query_mut().insert("continuation-token", token);
            }
            let url = action.sign(PRESIGN_DURATION);

            let body = self.fetch_body(&op, url).await?;
            let body = std::str::from_utf8(&body)
                .map_err(|e| Error::storage(&op, format!("invalid utf-8 in response: {}", e)))?;
            let parsed = ListObjectsV2::parse_response(body)
                .map_err(|e| Error::storage(&op, format!("failed to parse response: {}", e)))?;

            for common in &parsed.common_prefixes {
                prefixes.push(common.prefix.clone());
            }

            match parsed.next_continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        debug!(prefix = %prefix, count = prefixes.len(), "Listed common prefixes");
        Ok(prefixes)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let op = format!("GET {}", key);
        let url = self
            .bucket
            .get_object(Some(&self.credentials), key)
            .sign(PRESIGN_DURATION);

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::storage(&op, e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| Error::storage(&op, e.to_string()))?;
                Ok(Some(body.to_vec()))
            }
            status => Err(Error::storage(&op, format!("unexpected status {}", status))),
        }
    }
}
