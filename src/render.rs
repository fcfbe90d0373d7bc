// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Chart rendering collaborator: an external script that turns a chart config file into a PNG.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The renderer cannot be started at all (script or interpreter missing).
    #[error("chart renderer unavailable: {0}")]
    Unavailable(String),
    #[error("chart renderer failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, config_path: &Path, image_path: &Path) -> Result<(), RenderError>;
}

/// `<python> <script> <config_path> <image_path>`; success is exit status 0 plus an image file.
#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    python: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptRenderer {
    pub fn new(python: impl Into<String>, script: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { python: python.into(), script: script.into(), timeout }
    }
}

#[async_trait]
impl ChartRenderer for ScriptRenderer {
    async fn render(&self, config_path: &Path, image_path: &Path) -> Result<(), RenderError> {
        if !self.script.is_file() {
            return Err(RenderError::Unavailable(format!(
                "render script not found at {}",
                self.script.display()
            )));
        }

        let mut command = tokio::process::Command::new(&self.python);
        command
            .arg(&self.script)
            .arg(config_path)
            .arg(image_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                RenderError::Unavailable(format!("cannot start {}: {err}", self.python))
            } else {
                RenderError::Failed(format!("cannot start {}: {err}", self.python))
            }
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                RenderError::Failed(format!("timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|err| RenderError::Failed(err.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            return Err(RenderError::Failed(format!("{}: {stderr}", output.status)));
        }

        if !image_path.is_file() {
            return Err(RenderError::Failed(format!(
                "renderer exited cleanly but wrote no image at {}",
                image_path.display()
            )));
        }

        tracing::debug!(image = %image_path.display(), "chart rendered");
        Ok(())
    }
}
