// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Tool registry, argument validation, and response assembly.
//!
//! Every invocation goes through the same steps in the same order: tool lookup, argument
//! validation against the tool's [`ToolDescriptor`], output directory preparation, and only
//! then the orchestrator. A rejected invocation therefore never touches the filesystem or any
//! external system.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifacts::{Artifact, OutputDir};
use crate::chart::ChartKind;
use crate::config::Config;
use crate::error::ToolError;
use crate::orchestrate::{AnalysisDepth, Collaborators, Orchestrator, Stage, VisualizeRequest};

pub type JsonObject = Map<String, Value>;

pub const TEXT_GENERATE: &str = "text.generate";
pub const CSV_ANALYZE: &str = "csv.analyze";
pub const CSV_VISUALIZE: &str = "csv.visualize";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    String,
    StringList,
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub choices: &'static [&'static str],
    pub default: Option<&'static str>,
    pub min_items: usize,
}

impl ArgSpec {
    const fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: ArgKind::String,
            required: false,
            choices: &[],
            default: None,
            min_items: 0,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn choices(mut self, choices: &'static [&'static str], default: &'static str) -> Self {
        self.choices = choices;
        self.default = Some(default);
        self
    }

    const fn list(name: &'static str, min_items: usize) -> Self {
        Self { kind: ArgKind::StringList, min_items, ..Self::string(name) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub summary: &'static str,
    pub args: &'static [ArgSpec],
}

impl ToolDescriptor {
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|spec| spec.name == name)
    }
}

const OUTPUT_DIR: ArgSpec = ArgSpec::string("output_dir");
const CSV_PATH: ArgSpec = ArgSpec::string("csv_path").required();

pub const TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: TEXT_GENERATE,
        summary: "Send a prompt to the language model and save the reply as a text file.",
        args: &[ArgSpec::string("prompt").required(), OUTPUT_DIR],
    },
    ToolDescriptor {
        name: CSV_ANALYZE,
        summary: "Load a CSV file or URL, ask the language model to analyze it, and save the \
                  analysis parts plus a Markdown summary.",
        args: &[
            CSV_PATH,
            OUTPUT_DIR,
            ArgSpec::string("analysis_type").choices(&["basic", "detailed"], "detailed"),
        ],
    },
    ToolDescriptor {
        name: CSV_VISUALIZE,
        summary: "Load a CSV file or URL and build a chart from two of its columns; renders a PNG \
                  and uploads it when a renderer and storage are available.",
        args: &[
            CSV_PATH,
            OUTPUT_DIR,
            ArgSpec::string("chart_type").choices(&["bar", "line", "scatter", "pie"], "bar"),
            ArgSpec::list("columns", 2),
            ArgSpec::string("title"),
        ],
    },
];

pub fn descriptor(name: &str) -> Option<&'static ToolDescriptor> {
    TOOLS.iter().find(|tool| tool.name == name)
}

pub fn tool_names() -> Vec<&'static str> {
    TOOLS.iter().map(|tool| tool.name).collect()
}

fn lookup(name: &str) -> Result<&'static ToolDescriptor, ToolError> {
    descriptor(name)
        .ok_or_else(|| ToolError::UnknownTool { name: name.to_owned(), available: tool_names() })
}

/// Checks `args` against `tool`. `null` counts as absent.
pub fn validate_arguments(tool: &ToolDescriptor, args: &JsonObject) -> Result<(), ToolError> {
    let invalid = |reason: String| ToolError::invalid_arguments(tool.name, reason);

    if let Some(unknown) = args.keys().find(|key| tool.arg(key).is_none()) {
        let known = tool.args.iter().map(|spec| spec.name).collect::<Vec<_>>().join(", ");
        return Err(invalid(format!("unknown argument `{unknown}` (accepted: {known})")));
    }

    for spec in tool.args {
        let value = match args.get(spec.name) {
            None | Some(Value::Null) if spec.required => {
                return Err(invalid(format!("missing required argument `{}`", spec.name)));
            }
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };

        match spec.kind {
            ArgKind::String => {
                let Some(text) = value.as_str() else {
                    return Err(invalid(format!("`{}` must be a string", spec.name)));
                };
                if text.trim().is_empty() {
                    return Err(invalid(format!("`{}` must not be empty", spec.name)));
                }
                if !spec.choices.is_empty() && !spec.choices.contains(&text) {
                    return Err(invalid(format!(
                        "`{}` must be one of: {} (got {text:?})",
                        spec.name,
                        spec.choices.join(", ")
                    )));
                }
            }
            ArgKind::StringList => {
                let Some(items) = value.as_array() else {
                    return Err(invalid(format!("`{}` must be a list of strings", spec.name)));
                };
                if items.iter().any(|item| item.as_str().map_or(true, |s| s.trim().is_empty())) {
                    return Err(invalid(format!(
                        "`{}` must contain only non-empty strings",
                        spec.name
                    )));
                }
                if items.len() < spec.min_items {
                    return Err(invalid(format!(
                        "`{}` needs at least {} entries (got {})",
                        spec.name,
                        spec.min_items,
                        items.len()
                    )));
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TextGenerateArgs {
    /// Prompt sent to the language model.
    pub prompt: String,
    /// Directory for the saved reply; defaults to the server's output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CsvAnalyzeArgs {
    /// Local CSV path or http(s) URL.
    pub csv_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// `basic` (one overview prompt) or `detailed` (overview plus follow-up). Default `detailed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CsvVisualizeArgs {
    /// Local CSV path or http(s) URL.
    pub csv_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// One of `bar`, `line`, `scatter`, `pie`. Default `bar`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
    /// Label column then value column; further entries are ignored. Defaults to the first two
    /// columns of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Chart title; defaults to `<value column> by <label column>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TextGenerateResponse {
    pub text: String,
    pub artifact: Artifact,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CsvAnalyzeResponse {
    pub analysis_type: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub parts: Vec<String>,
    pub part_artifacts: Vec<Artifact>,
    pub summary_artifact: Artifact,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CsvVisualizeResponse {
    pub chart_type: String,
    /// `[label column, value column]` actually used.
    pub columns: Vec<String>,
    pub config_path: String,
    pub image_path: Option<String>,
    pub signed_url: Option<String>,
    /// `<Kind>: <detail>` for the image or the upload when it is missing, e.g.
    /// `UploadSkipped: storage not configured`.
    pub warnings: Vec<String>,
}

#[derive(Clone)]
pub struct Dispatcher {
    orchestrator: Orchestrator,
    default_output_dir: PathBuf,
}

impl Dispatcher {
    pub fn new(orchestrator: Orchestrator, default_output_dir: impl Into<PathBuf>) -> Self {
        Self { orchestrator, default_output_dir: default_output_dir.into() }
    }

    pub fn from_config(config: &Config) -> Self {
        let orchestrator =
            Orchestrator::new(Collaborators::from_config(config), config.timeouts);
        Self::new(orchestrator, config.output_dir.clone())
    }

    fn output_dir(&self, requested: Option<&str>) -> Result<OutputDir, ToolError> {
        Ok(OutputDir::prepare(requested, &self.default_output_dir)?)
    }

    pub async fn text_generate(
        &self,
        args: TextGenerateArgs,
    ) -> Result<TextGenerateResponse, ToolError> {
        check_typed(TEXT_GENERATE, &args)?;
        let out = self.output_dir(args.output_dir.as_deref())?;
        let outcome = self.orchestrator.generate_text(&out, &args.prompt).await?;
        Ok(TextGenerateResponse { text: outcome.text, artifact: outcome.artifact })
    }

    pub async fn csv_analyze(&self, args: CsvAnalyzeArgs) -> Result<CsvAnalyzeResponse, ToolError> {
        check_typed(CSV_ANALYZE, &args)?;
        let depth = parse_choice::<AnalysisDepth>(
            CSV_ANALYZE,
            "analysis_type",
            args.analysis_type.as_deref(),
        )?;
        let out = self.output_dir(args.output_dir.as_deref())?;

        let outcome = self.orchestrator.analyze_csv(&out, &args.csv_path, depth).await?;
        let (parts, part_artifacts): (Vec<_>, Vec<_>) =
            outcome.parts.into_iter().map(|part| (part.text, part.artifact)).unzip();
        Ok(CsvAnalyzeResponse {
            analysis_type: depth.to_string(),
            row_count: outcome.row_count,
            columns: outcome.columns,
            parts,
            part_artifacts,
            summary_artifact: outcome.summary,
        })
    }

    pub async fn csv_visualize(
        &self,
        args: CsvVisualizeArgs,
    ) -> Result<CsvVisualizeResponse, ToolError> {
        check_typed(CSV_VISUALIZE, &args)?;
        let kind =
            parse_choice::<ChartKind>(CSV_VISUALIZE, "chart_type", args.chart_type.as_deref())?;
        let out = self.output_dir(args.output_dir.as_deref())?;

        let request = VisualizeRequest {
            source: args.csv_path,
            kind,
            columns: args.columns,
            title: args.title,
        };
        let outcome = self.orchestrator.visualize_csv(&out, &request).await?;

        let mut warnings = Vec::new();
        let image_path = stage_value(outcome.render, &mut warnings).map(|image| image.path);
        let signed_url = stage_value(outcome.upload, &mut warnings);
        Ok(CsvVisualizeResponse {
            chart_type: outcome.kind.to_string(),
            columns: vec![outcome.label_column, outcome.value_column],
            config_path: outcome.config.path,
            image_path,
            signed_url,
            warnings,
        })
    }

    /// Name-based entry point: same checks and side effects as the typed methods.
    pub async fn dispatch_named(&self, name: &str, args: JsonObject) -> Result<Value, ToolError> {
        let tool = lookup(name)?;
        validate_arguments(tool, &args)?;

        let response = match tool.name {
            TEXT_GENERATE => to_json(self.text_generate(from_args(tool, args)?).await?),
            CSV_ANALYZE => to_json(self.csv_analyze(from_args(tool, args)?).await?),
            CSV_VISUALIZE => to_json(self.csv_visualize(from_args(tool, args)?).await?),
            other => {
                return Err(ToolError::UnknownTool {
                    name: other.to_owned(),
                    available: tool_names(),
                });
            }
        };
        Ok(response)
    }
}

fn check_typed<T: Serialize>(name: &str, args: &T) -> Result<(), ToolError> {
    let tool = lookup(name)?;
    match serde_json::to_value(args) {
        Ok(Value::Object(map)) => validate_arguments(tool, &map),
        Ok(_) => Err(ToolError::invalid_arguments(name, "arguments must be a JSON object")),
        Err(err) => Err(ToolError::invalid_arguments(name, err.to_string())),
    }
}

fn from_args<T: serde::de::DeserializeOwned>(
    tool: &ToolDescriptor,
    args: JsonObject,
) -> Result<T, ToolError> {
    let args = args.into_iter().filter(|(_, value)| !value.is_null()).collect();
    serde_json::from_value(Value::Object(args))
        .map_err(|err| ToolError::invalid_arguments(tool.name, err.to_string()))
}

fn parse_choice<T: std::str::FromStr + Default>(
    tool: &str,
    arg: &str,
    raw: Option<&str>,
) -> Result<T, ToolError> {
    match raw {
        None => Ok(T::default()),
        Some(raw) => raw.parse().map_err(|_| {
            ToolError::invalid_arguments(tool, format!("unsupported `{arg}` {raw:?}"))
        }),
    }
}

fn stage_value<T>(stage: Stage<T>, warnings: &mut Vec<String>) -> Option<T> {
    match stage {
        Stage::Succeeded(value) => Some(value),
        Stage::Skipped(note) | Stage::Failed(note) => {
            warnings.push(note.to_string());
            None
        }
    }
}

fn to_json<T: Serialize>(response: T) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}
