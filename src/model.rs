// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Language-model collaborator.
//!
//! The orchestrator only ever needs "prompt in, text out" against a running conversation, so
//! the trait is exactly that. [`Conversation`] owns the history and applies the call timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Network(String),
    #[error("model API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected model response: {0}")]
    Parse(String),
    #[error("model call timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Submits `prompt` after `history` and returns the reply text.
    async fn submit_prompt(&self, history: &[Turn], prompt: &str) -> Result<String, ModelError>;
}

/// A single chat with a model, starting from empty history.
pub struct Conversation {
    model: Arc<dyn LanguageModel>,
    history: Vec<Turn>,
    timeout: Duration,
}

impl Conversation {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, history: Vec::new(), timeout }
    }

    pub async fn send(&mut self, prompt: &str) -> Result<String, ModelError> {
        let reply = tokio::time::timeout(self.timeout, self.model.submit_prompt(&self.history, prompt))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))??;

        self.history.push(Turn { role: Role::User, text: prompt.to_owned() });
        self.history.push(Turn { role: Role::Model, text: reply.clone() });
        Ok(reply)
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }
}

/// Gemini `generateContent` over REST.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self { client, base_url: base_url.into(), model: model.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn submit_prompt(&self, history: &[Turn], prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(history, prompt))
            .send()
            .await
            .map_err(|err| ModelError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api { status: status.as_u16(), body });
        }

        let data: serde_json::Value =
            response.json().await.map_err(|err| ModelError::Parse(err.to_string()))?;
        reply_text(&data)
    }
}

fn request_body(history: &[Turn], prompt: &str) -> serde_json::Value {
    let mut contents = history
        .iter()
        .map(|turn| {
            json!({
                "role": match turn.role {
                    Role::User => "user",
                    Role::Model => "model",
                },
                "parts": [{ "text": turn.text }],
            })
        })
        .collect::<Vec<_>>();
    contents.push(json!({ "role": "user", "parts": [{ "text": prompt }] }));
    json!({ "contents": contents })
}

fn reply_text(data: &serde_json::Value) -> Result<String, ModelError> {
    let parts = data
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array())
        .ok_or_else(|| ModelError::Parse("no candidate content in response".to_owned()))?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect::<String>();
    if text.is_empty() {
        return Err(ModelError::Parse("candidate has no text parts".to_owned()));
    }
    Ok(text)
}
