// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Terminal tool failures and their MCP error mapping.
//!
//! Only failures that end an invocation live here. Optional stages (render, upload) report
//! through [`crate::orchestrate::Stage`] instead and never become a `ToolError`.

use rmcp::model::ErrorCode;
use rmcp::ErrorData;
use serde_json::json;

use crate::artifacts::ArtifactError;
use crate::model::ModelError;
use crate::source::LoadError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool {name:?} (available: {})", .available.join(", "))]
    UnknownTool { name: String, available: Vec<&'static str> },
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{reference} parsed successfully but contains no data rows")]
    EmptySource { reference: String },
    #[error(
        "at least 2 columns are needed to build a chart; available columns: [{}]",
        .available.join(", ")
    )]
    InsufficientColumns { available: Vec<String> },
    #[error(
        "columns not found: [{}]; available columns: [{}]",
        .missing.join(", "),
        .available.join(", ")
    )]
    UnknownColumns { missing: Vec<String>, available: Vec<String> },
    #[error("model call failed: {0}")]
    ModelCallFailed(#[from] ModelError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl ToolError {
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments { tool: tool.into(), reason: reason.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "UnknownTool",
            Self::InvalidArguments { .. } => "InvalidArguments",
            Self::Load(err) => err.kind(),
            Self::EmptySource { .. } => "EmptySource",
            Self::InsufficientColumns { .. } => "InsufficientColumns",
            Self::UnknownColumns { .. } => "UnknownColumns",
            Self::ModelCallFailed(_) => "ModelCallFailed",
            Self::Artifact(_) => "ArtifactWriteFailed",
        }
    }

    pub fn to_error_data(&self) -> ErrorData {
        let message = self.to_string();
        let data = Some(self.details());
        match self {
            Self::UnknownTool { .. } => ErrorData::new(ErrorCode::METHOD_NOT_FOUND, message, data),
            Self::InvalidArguments { .. }
            | Self::EmptySource { .. }
            | Self::InsufficientColumns { .. }
            | Self::UnknownColumns { .. }
            | Self::Load(LoadError::InvalidReference { .. })
            | Self::Load(LoadError::UnexpectedContentType { .. })
            | Self::Load(LoadError::MalformedSource { .. })
            | Self::Load(LoadError::LocalReadFailed { .. }) => {
                ErrorData::invalid_params(message, data)
            }
            Self::Load(_) | Self::ModelCallFailed(_) | Self::Artifact(_) => {
                ErrorData::internal_error(message, data)
            }
        }
    }

    fn details(&self) -> serde_json::Value {
        let mut details = json!({ "kind": self.kind() });
        let extra = match self {
            Self::UnknownTool { name, available } => json!({ "tool": name, "available": available }),
            Self::InvalidArguments { tool, .. } => json!({ "tool": tool }),
            Self::EmptySource { reference } => json!({ "reference": reference }),
            Self::InsufficientColumns { available } => json!({ "available_columns": available }),
            Self::UnknownColumns { missing, available } => {
                json!({ "missing_columns": missing, "available_columns": available })
            }
            Self::Load(LoadError::InvalidReference { reference, .. })
            | Self::Load(LoadError::MalformedSource { reference, .. }) => {
                json!({ "reference": reference })
            }
            Self::Load(LoadError::FetchRejected { url, status }) => {
                json!({ "reference": url, "status": status })
            }
            Self::Load(LoadError::FetchTimeout { url, timeout_secs }) => {
                json!({ "reference": url, "timeout_secs": timeout_secs })
            }
            Self::Load(LoadError::FetchFailed { url, .. })
            | Self::Load(LoadError::UnexpectedContentType { url, .. }) => {
                json!({ "reference": url })
            }
            Self::Load(LoadError::LocalReadFailed { path, .. }) => json!({ "reference": path }),
            Self::ModelCallFailed(_) | Self::Artifact(_) => json!({}),
        };
        if let (Some(details), serde_json::Value::Object(extra)) = (details.as_object_mut(), extra) {
            details.extend(extra);
        }
        details
    }
}
