// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Per-tool call sequences against the external collaborators.
//!
//! Stages inside one sequence run strictly one after another. Anything up to and including the
//! first persisted artifact is terminal on failure; after that, optional stages record a
//! [`Stage`] outcome and the sequence keeps going.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::artifacts::{Artifact, OutputDir};
use crate::chart::{build_chart, ChartKind};
use crate::config::{Config, Timeouts};
use crate::error::ToolError;
use crate::model::{Conversation, GeminiClient, LanguageModel};
use crate::render::{ChartRenderer, RenderError, ScriptRenderer};
use crate::source::{HttpFetcher, RowSet, SourceFetcher, SourceLoader};
use crate::storage::{ArtifactStore, StorageError, SupabaseStore};

const SAMPLE_ROWS: usize = 5;

/// Why an optional stage produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    RenderUnavailable,
    RenderFailed,
    UploadSkipped,
    UploadFailed,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RenderUnavailable => "RenderUnavailable",
            Self::RenderFailed => "RenderFailed",
            Self::UploadSkipped => "UploadSkipped",
            Self::UploadFailed => "UploadFailed",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNote {
    pub kind: StageKind,
    pub detail: String,
}

impl StageNote {
    fn new(kind: StageKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

impl fmt::Display for StageNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Outcome of one optional stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage<T> {
    Succeeded(T),
    Skipped(StageNote),
    Failed(StageNote),
}

impl<T> Stage<T> {
    pub fn kind(&self) -> Option<StageKind> {
        match self {
            Self::Succeeded(_) => None,
            Self::Skipped(note) | Self::Failed(note) => Some(note.kind),
        }
    }

    pub fn succeeded(self) -> Option<T> {
        match self {
            Self::Succeeded(value) => Some(value),
            Self::Skipped(_) | Self::Failed(_) => None,
        }
    }

    pub fn as_succeeded(&self) -> Option<&T> {
        match self {
            Self::Succeeded(value) => Some(value),
            Self::Skipped(_) | Self::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisDepth {
    Basic,
    #[default]
    Detailed,
}

impl AnalysisDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Detailed => "detailed",
        }
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisDepth {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "detailed" => Ok(Self::Detailed),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextOutcome {
    pub text: String,
    pub artifact: Artifact,
}

#[derive(Debug, Clone)]
pub struct AnalysisPart {
    pub text: String,
    pub artifact: Artifact,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub parts: Vec<AnalysisPart>,
    pub summary: Artifact,
}

#[derive(Debug, Clone)]
pub struct VisualizeRequest {
    pub source: String,
    pub kind: ChartKind,
    pub columns: Option<Vec<String>>,
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VisualizationOutcome {
    pub label_column: String,
    pub value_column: String,
    pub kind: ChartKind,
    pub config: Artifact,
    pub render: Stage<Artifact>,
    pub upload: Stage<String>,
}

/// The external systems an orchestrator talks to. Storage is optional.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub model: Arc<dyn LanguageModel>,
    pub renderer: Arc<dyn ChartRenderer>,
    pub storage: Option<Arc<dyn ArtifactStore>>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Self {
        let client = reqwest::Client::new();
        Self {
            fetcher: Arc::new(HttpFetcher::new(client.clone())),
            model: Arc::new(GeminiClient::new(
                client.clone(),
                &config.gemini_base_url,
                &config.gemini_model,
                &config.gemini_api_key,
            )),
            renderer: Arc::new(ScriptRenderer::new(
                &config.python_bin,
                &config.render_script,
                config.timeouts.render,
            )),
            storage: config.storage.as_ref().map(|storage| {
                Arc::new(SupabaseStore::new(client, storage)) as Arc<dyn ArtifactStore>
            }),
        }
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    loader: SourceLoader,
    model: Arc<dyn LanguageModel>,
    renderer: Arc<dyn ChartRenderer>,
    storage: Option<Arc<dyn ArtifactStore>>,
    timeouts: Timeouts,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, timeouts: Timeouts) -> Self {
        Self {
            loader: SourceLoader::new(collaborators.fetcher, timeouts.fetch),
            model: collaborators.model,
            renderer: collaborators.renderer,
            storage: collaborators.storage,
            timeouts,
        }
    }

    fn conversation(&self) -> Conversation {
        Conversation::new(self.model.clone(), self.timeouts.model)
    }

    async fn load_rows(&self, source: &str) -> Result<RowSet, ToolError> {
        let rows = self.loader.load(source).await?;
        if rows.is_empty() {
            return Err(ToolError::EmptySource { reference: source.to_owned() });
        }
        tracing::debug!(
            source = %source,
            rows = rows.len(),
            columns = rows.columns().len(),
            "source loaded"
        );
        Ok(rows)
    }

    pub async fn generate_text(
        &self,
        out: &OutputDir,
        prompt: &str,
    ) -> Result<TextOutcome, ToolError> {
        let text = self.conversation().send(prompt).await?;
        let artifact = out.write("text", "response", "txt", text.as_bytes())?;
        tracing::info!(path = %artifact.path, "text response saved");
        Ok(TextOutcome { text, artifact })
    }

    /// All-or-nothing: a failed part drops the parts that already succeeded.
    pub async fn analyze_csv(
        &self,
        out: &OutputDir,
        source: &str,
        depth: AnalysisDepth,
    ) -> Result<AnalysisOutcome, ToolError> {
        let rows = self.load_rows(source).await?;
        let prompts = analysis_prompts(&rows, depth);

        let mut conversation = self.conversation();
        let mut replies = Vec::with_capacity(prompts.len());
        for (idx, prompt) in prompts.iter().enumerate() {
            tracing::debug!(part = idx + 1, of = prompts.len(), "submitting analysis prompt");
            replies.push(conversation.send(prompt).await?);
        }

        let mut parts = Vec::with_capacity(replies.len());
        for (idx, text) in replies.into_iter().enumerate() {
            let artifact =
                out.write("analysis", &format!("part{}", idx + 1), "txt", text.as_bytes())?;
            parts.push(AnalysisPart { text, artifact });
        }

        let summary_text = analysis_summary(source, &rows, depth, &parts);
        let summary = out.write("analysis", "summary", "md", summary_text.as_bytes())?;
        tracing::info!(path = %summary.path, parts = parts.len(), "analysis saved");

        Ok(AnalysisOutcome {
            row_count: rows.len(),
            columns: rows.columns().to_vec(),
            parts,
            summary,
        })
    }

    pub async fn visualize_csv(
        &self,
        out: &OutputDir,
        request: &VisualizeRequest,
    ) -> Result<VisualizationOutcome, ToolError> {
        let rows = self.load_rows(&request.source).await?;
        let (label_column, value_column) = chart_columns(&rows, request.columns.as_deref())?;

        let chart = build_chart(
            &rows,
            request.kind,
            &label_column,
            &value_column,
            request.title.as_deref(),
        )
        .ok_or_else(|| ToolError::UnknownColumns {
            missing: vec![label_column.clone(), value_column.clone()],
            available: rows.columns().to_vec(),
        })?;

        let qualifier = |role: &str| format!("{role}_{}", request.kind);
        let config = out.write_json("chart", &qualifier("config"), &chart)?;
        tracing::info!(path = %config.path, "chart config saved");

        let render = self.render_stage(out, &config, &qualifier("image")).await;
        let upload = match render.as_succeeded() {
            Some(image) => self.upload_stage(image).await,
            None => Stage::Skipped(StageNote::new(StageKind::UploadSkipped, "no rendered image")),
        };
        tracing::debug!(
            render = ?render.kind(),
            upload = ?upload.kind(),
            "visualization finished"
        );

        Ok(VisualizationOutcome {
            label_column,
            value_column,
            kind: request.kind,
            config,
            render,
            upload,
        })
    }

    async fn render_stage(
        &self,
        out: &OutputDir,
        config: &Artifact,
        qualifier: &str,
    ) -> Stage<Artifact> {
        let image = out.reserve("chart", qualifier, "png");
        match self.renderer.render(&config.path_buf(), &image.path_buf()).await {
            Ok(()) => {
                tracing::info!(path = %image.path, "chart image rendered");
                Stage::Succeeded(image)
            }
            Err(err @ RenderError::Unavailable(_)) => {
                tracing::warn!(error = %err, "skipping chart render");
                Stage::Failed(StageNote::new(StageKind::RenderUnavailable, err.to_string()))
            }
            Err(err @ RenderError::Failed(_)) => {
                tracing::warn!(error = %err, config = %config.path, "chart render failed");
                Stage::Failed(StageNote::new(StageKind::RenderFailed, err.to_string()))
            }
        }
    }

    async fn upload_stage(&self, image: &Artifact) -> Stage<String> {
        let Some(storage) = self.storage.as_ref() else {
            tracing::debug!("storage not configured; upload skipped");
            return Stage::Skipped(StageNote::new(
                StageKind::UploadSkipped,
                "storage not configured",
            ));
        };

        let bytes = match tokio::fs::read(image.path_buf()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(error = %err, path = %image.path, "cannot read rendered image");
                return Stage::Failed(StageNote::new(
                    StageKind::UploadFailed,
                    format!("cannot read {}: {err}", image.path),
                ));
            }
        };

        let object_path = image.filename.clone();
        let attempt = async {
            storage.upload(&object_path, bytes, "image/png").await?;
            storage.signed_url(&object_path).await
        };
        match bounded(self.timeouts.upload, attempt).await {
            Ok(Ok(url)) => {
                tracing::info!(object = %object_path, "chart uploaded");
                Stage::Succeeded(url)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, object = %object_path, "chart upload failed");
                Stage::Failed(StageNote::new(StageKind::UploadFailed, err.to_string()))
            }
            Err(timeout) => {
                tracing::warn!(object = %object_path, "chart upload timed out");
                Stage::Failed(StageNote::new(
                    StageKind::UploadFailed,
                    format!("upload timed out after {}s", timeout.as_secs()),
                ))
            }
        }
    }
}

async fn bounded<T>(
    limit: Duration,
    future: impl std::future::Future<Output = Result<T, StorageError>>,
) -> Result<Result<T, StorageError>, Duration> {
    tokio::time::timeout(limit, future).await.map_err(|_| limit)
}

/// Caller columns (first two used) or the first two columns of the row set.
fn chart_columns(
    rows: &RowSet,
    requested: Option<&[String]>,
) -> Result<(String, String), ToolError> {
    let available = rows.columns();
    match requested {
        Some(requested) => {
            let missing = requested
                .iter()
                .take(2)
                .filter(|column| !available.contains(column))
                .cloned()
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                return Err(ToolError::UnknownColumns { missing, available: available.to_vec() });
            }
            match requested {
                [label, value, ..] => Ok((label.clone(), value.clone())),
                _ => Err(ToolError::InsufficientColumns { available: available.to_vec() }),
            }
        }
        None => match available {
            [label, value, ..] => Ok((label.clone(), value.clone())),
            _ => Err(ToolError::InsufficientColumns { available: available.to_vec() }),
        },
    }
}

fn data_overview(rows: &RowSet) -> String {
    let sample = serde_json::to_string_pretty(&rows.sample_json(SAMPLE_ROWS))
        .unwrap_or_else(|_| "[]".to_owned());
    format!(
        "The dataset has {} rows and {} columns.\nColumns: {}\n\nSample data (first {} rows):\n{}",
        rows.len(),
        rows.columns().len(),
        rows.columns().join(", "),
        SAMPLE_ROWS.min(rows.len()),
        sample
    )
}

pub fn analysis_prompts(rows: &RowSet, depth: AnalysisDepth) -> Vec<String> {
    let overview = data_overview(rows);
    let first = format!(
        "Analyze the following CSV data and give a clear overview.\n\n{overview}\n\n\
         Please describe:\n\
         1. What the data appears to represent\n\
         2. The type and meaning of each column\n\
         3. Key statistics and notable values visible in the sample\n\
         4. Obvious patterns, anomalies, or data quality issues"
    );

    match depth {
        AnalysisDepth::Basic => vec![first],
        AnalysisDepth::Detailed => vec![
            first,
            "Building on your previous analysis of this dataset, go deeper:\n\
             1. Relationships and correlations between columns\n\
             2. Trends, seasonality, or distributions worth highlighting\n\
             3. Outliers and how they might affect conclusions\n\
             4. Data quality problems and how to address them\n\
             5. Recommended follow-up analyses and visualizations"
                .to_owned(),
        ],
    }
}

fn analysis_summary(
    source: &str,
    rows: &RowSet,
    depth: AnalysisDepth,
    parts: &[AnalysisPart],
) -> String {
    let mut summary = format!(
        "# CSV Analysis Summary\n\nSource: {source}\nRows: {}\nColumns: {}\nAnalysis type: {depth}\n",
        rows.len(),
        rows.columns().join(", ")
    );
    for (idx, part) in parts.iter().enumerate() {
        summary.push_str(&format!("\n---\n\n## Part {}\n\n{}\n", idx + 1, part.text.trim_end()));
    }
    summary
}

#[cfg(test)]
mod tests;
