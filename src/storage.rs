// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Cloud storage collaborator (Supabase Storage REST API).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage request failed: {0}")]
    Network(String),
    #[error("storage API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected storage response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Time-limited public link for an uploaded object.
    async fn signed_url(&self, object_path: &str) -> Result<String, StorageError>;
}

pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    key: String,
    bucket: String,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseStore {
    pub fn new(client: reqwest::Client, config: &StorageConfig) -> Self {
        Self {
            client,
            base_url: config.url.clone(),
            key: config.key.clone(),
            bucket: config.bucket.clone(),
            ttl: config.signed_url_ttl,
        }
    }

    fn object_url(&self, action: &str, object_path: &str) -> String {
        format!(
            "{}/storage/v1/{action}/{}/{}",
            self.base_url,
            self.bucket,
            object_path.trim_start_matches('/')
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Api { status: status.as_u16(), body })
    }
}

#[async_trait]
impl ArtifactStore for SupabaseStore {
    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.object_url("object", object_path))
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|err| StorageError::Network(err.to_string()))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn signed_url(&self, object_path: &str) -> Result<String, StorageError> {
        let response = self
            .client
            .post(self.object_url("object/sign", object_path))
            .bearer_auth(&self.key)
            .header("apikey", &self.key)
            .json(&serde_json::json!({ "expiresIn": self.ttl.as_secs() }))
            .send()
            .await
            .map_err(|err| StorageError::Network(err.to_string()))?;
        let signed: SignResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| StorageError::Parse(err.to_string()))?;
        Ok(absolute_signed_url(&self.base_url, &signed.signed_url))
    }
}

/// Supabase answers with a path relative to `/storage/v1`.
fn absolute_signed_url(base_url: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_owned();
    }
    format!("{base_url}/storage/v1/{}", signed.trim_start_matches('/'))
}
