// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! CSV source loading.
//!
//! A source reference is either a local path or an `http(s)://` URL. Both end up in the same
//! single-pass `csv` reader; the loader's job ends at "valid parse, possibly zero rows" and the
//! caller decides what an empty row set means.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("invalid source reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },
    #[error("timed out after {timeout_secs}s fetching {url}")]
    FetchTimeout { url: String, timeout_secs: u64 },
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },
    #[error("fetching {url} was rejected with HTTP status {status}")]
    FetchRejected { url: String, status: u16 },
    #[error(
        "{url} returned content type {content_type:?} instead of CSV data; point at the raw file, not a web page"
    )]
    UnexpectedContentType { url: String, content_type: String },
    #[error("{reference} is not usable CSV: {reason}")]
    MalformedSource { reference: String, reason: String },
    #[error("cannot read {path}: {reason}")]
    LocalReadFailed { path: String, reason: String },
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidReference { .. } => "InvalidReference",
            Self::FetchTimeout { .. } => "FetchTimeout",
            Self::FetchFailed { .. } => "FetchFailed",
            Self::FetchRejected { .. } => "FetchRejected",
            Self::UnexpectedContentType { .. } => "UnexpectedContentType",
            Self::MalformedSource { .. } => "MalformedSource",
            Self::LocalReadFailed { .. } => "LocalReadFailed",
        }
    }
}

/// Classified source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Local(PathBuf),
    Remote(Url),
}

impl SourceRef {
    /// Classifies by prefix; URLs are parsed here so bad ones never reach the network.
    pub fn parse(reference: &str) -> Result<Self, LoadError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(LoadError::InvalidReference {
                reference: reference.to_owned(),
                reason: "reference is empty".to_owned(),
            });
        }

        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed).map_err(|err| LoadError::InvalidReference {
                reference: reference.to_owned(),
                reason: err.to_string(),
            })?;
            return Ok(Self::Remote(url));
        }

        Ok(Self::Local(PathBuf::from(trimmed)))
    }
}

/// Header-ordered columns plus records. Every record has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    columns: Vec<String>,
    records: Vec<Vec<String>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let records = records
            .into_iter()
            .map(|mut record| {
                record.resize(width, String::new());
                record
            })
            .collect();
        Self { columns, records }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn column_values(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(column)?;
        Some(self.records.iter().map(|record| record[idx].as_str()).collect())
    }

    /// First `limit` records as column-keyed JSON objects, in header order.
    pub fn sample_json(&self, limit: usize) -> serde_json::Value {
        let rows = self
            .records
            .iter()
            .take(limit)
            .map(|record| {
                let object = self
                    .columns
                    .iter()
                    .zip(record)
                    .map(|(column, cell)| (column.clone(), serde_json::Value::from(cell.as_str())))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

/// Raw HTTP response as far as the loader cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches the whole body. Errors are transport-level (DNS, connect, body read).
    async fn fetch(&self, url: &Url) -> Result<FetchedBody, String>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedBody, String> {
        let response = self.client.get(url.clone()).send().await.map_err(|err| err.to_string())?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let body = response.bytes().await.map_err(|err| err.to_string())?.to_vec();
        Ok(FetchedBody { status, content_type, body })
    }
}

#[derive(Clone)]
pub struct SourceLoader {
    fetcher: Arc<dyn SourceFetcher>,
    timeout: Duration,
}

impl SourceLoader {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, timeout: Duration) -> Self {
        Self { fetcher, timeout }
    }

    pub async fn load(&self, reference: &str) -> Result<RowSet, LoadError> {
        match SourceRef::parse(reference)? {
            SourceRef::Local(path) => load_local(&path).await,
            SourceRef::Remote(url) => self.load_remote(&url).await,
        }
    }

    async fn load_remote(&self, url: &Url) -> Result<RowSet, LoadError> {
        tracing::debug!(%url, "fetching csv source");
        let fetched = tokio::time::timeout(self.timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| LoadError::FetchTimeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|reason| LoadError::FetchFailed { url: url.to_string(), reason })?;

        if !(200..300).contains(&fetched.status) {
            return Err(LoadError::FetchRejected { url: url.to_string(), status: fetched.status });
        }

        if let Some(content_type) = fetched.content_type.as_deref() {
            if content_type.to_ascii_lowercase().contains("text/html") {
                return Err(LoadError::UnexpectedContentType {
                    url: url.to_string(),
                    content_type: content_type.to_owned(),
                });
            }
        }

        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(fetched.body.as_slice());
        read_rows(reader, url.as_str())
    }
}

async fn load_local(path: &Path) -> Result<RowSet, LoadError> {
    let display = path.display().to_string();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| LoadError::LocalReadFailed { path: display.clone(), reason: err.to_string() })?;
    let reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes.as_slice());
    read_rows(reader, &display)
}

fn read_rows<R: io::Read>(mut reader: csv::Reader<R>, reference: &str) -> Result<RowSet, LoadError> {
    let malformed = |err: csv::Error| LoadError::MalformedSource {
        reference: reference.to_owned(),
        reason: err.to_string(),
    };

    let columns = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|header| header.trim().to_owned())
        .collect::<Vec<_>>();

    if let Some(marker) = columns.iter().find(|column| looks_like_html(column)) {
        return Err(LoadError::MalformedSource {
            reference: reference.to_owned(),
            reason: format!("header row contains HTML markup ({marker:?}); the source is a web page"),
        });
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        records.push(record.iter().map(ToOwned::to_owned).collect());
    }

    Ok(RowSet::new(columns, records))
}

fn looks_like_html(header: &str) -> bool {
    static HTML_MARKER: OnceLock<Regex> = OnceLock::new();
    HTML_MARKER
        .get_or_init(|| {
            Regex::new(r"(?i)<\s*/?\s*(!doctype|html|head|body|script|div|meta|title|link|style)\b")
                .expect("valid html marker regex")
        })
        .is_match(header)
}
