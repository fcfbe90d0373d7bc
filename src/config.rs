// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Environment-sourced process configuration.
//!
//! Everything is read once at startup. Only the model credential is mandatory; storage is
//! enabled when both its URL and key are present.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_BUCKET: &str = "charts";
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
pub const DEFAULT_PYTHON_BIN: &str = "python3";
pub const DEFAULT_RENDER_SCRIPT: &str = "scripts/render_chart.py";
pub const DEFAULT_SESSION_KEEP_ALIVE_SECS: u64 = 1800;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Upper bounds for every external call an invocation can make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub fetch: Duration,
    pub model: Duration,
    pub render: Duration,
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(30),
            model: Duration::from_secs(120),
            render: Duration::from_secs(120),
            upload: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub url: String,
    pub key: String,
    pub bucket: String,
    pub signed_url_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub storage: Option<StorageConfig>,
    pub port: u16,
    pub output_dir: PathBuf,
    pub python_bin: String,
    pub render_script: PathBuf,
    pub timeouts: Timeouts,
    /// Idle time after which the transport closes an MCP session.
    pub session_keep_alive: Duration,
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let gemini_api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let storage = match (get("SUPABASE_URL"), get("SUPABASE_KEY")) {
            (Some(url), Some(key)) => Some(StorageConfig {
                url: url.trim_end_matches('/').to_owned(),
                key,
                bucket: get("SUPABASE_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_owned()),
                signed_url_ttl: Duration::from_secs(
                    parse_or(get("SIGNED_URL_TTL_SECS"), DEFAULT_SIGNED_URL_TTL_SECS),
                ),
            }),
            _ => None,
        };

        let defaults = Timeouts::default();
        let secs = |key: &str, fallback: Duration| {
            Duration::from_secs(parse_or(get(key), fallback.as_secs()).max(1))
        };
        let timeouts = Timeouts {
            fetch: secs("FETCH_TIMEOUT_SECS", defaults.fetch),
            model: secs("MODEL_TIMEOUT_SECS", defaults.model),
            render: secs("RENDER_TIMEOUT_SECS", defaults.render),
            upload: secs("UPLOAD_TIMEOUT_SECS", defaults.upload),
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_owned())
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_owned()),
            storage,
            port: parse_or(get("PORT"), DEFAULT_PORT),
            output_dir: PathBuf::from(
                get("OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_owned()),
            ),
            python_bin: get("PYTHON_BIN").unwrap_or_else(|| DEFAULT_PYTHON_BIN.to_owned()),
            render_script: PathBuf::from(
                get("CHART_RENDER_SCRIPT").unwrap_or_else(|| DEFAULT_RENDER_SCRIPT.to_owned()),
            ),
            timeouts,
            session_keep_alive: secs(
                "SESSION_KEEP_ALIVE_SECS",
                Duration::from_secs(DEFAULT_SESSION_KEEP_ALIVE_SECS),
            ),
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, fallback: T) -> T {
    raw.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}
