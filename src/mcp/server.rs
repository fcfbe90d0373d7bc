// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::{Json, Parameters};
use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData, ServerHandler, ServiceExt};

use crate::dispatch::{
    CsvAnalyzeArgs, CsvAnalyzeResponse, CsvVisualizeArgs, CsvVisualizeResponse, Dispatcher,
    TextGenerateArgs, TextGenerateResponse, CSV_ANALYZE, CSV_VISUALIZE, TEXT_GENERATE,
};
use crate::error::ToolError;

#[derive(Clone)]
pub struct InsightMcp {
    dispatcher: Arc<Dispatcher>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl InsightMcp {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher: Arc::new(dispatcher), tool_router: Self::tool_router() }
    }

    pub async fn serve_stdio(self) -> Result<(), rmcp::RmcpError> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Send `prompt` to the language model in a fresh conversation; the reply is returned and
    /// saved as `text_response_<timestamp>.txt` under `output_dir`.
    #[tool(name = "text.generate")]
    async fn text_generate(
        &self,
        params: Parameters<TextGenerateArgs>,
    ) -> Result<Json<TextGenerateResponse>, ErrorData> {
        tracing::info!(tool = TEXT_GENERATE, "tool invoked");
        self.dispatcher
            .text_generate(params.0)
            .await
            .map(Json)
            .map_err(|err| reject(TEXT_GENERATE, err))
    }

    /// Analyze a CSV file or http(s) URL with the language model. `basic` runs one overview
    /// prompt, `detailed` (default) adds a follow-up in the same conversation. Each part and a
    /// Markdown summary are saved under `output_dir`.
    #[tool(name = "csv.analyze")]
    async fn csv_analyze(
        &self,
        params: Parameters<CsvAnalyzeArgs>,
    ) -> Result<Json<CsvAnalyzeResponse>, ErrorData> {
        tracing::info!(tool = CSV_ANALYZE, source = %params.0.csv_path, "tool invoked");
        self.dispatcher.csv_analyze(params.0).await.map(Json).map_err(|err| reject(CSV_ANALYZE, err))
    }

    /// Build a Chart.js chart from two columns of a CSV file or http(s) URL (label column, then
    /// value column; defaults to the first two). The config JSON is always saved; a PNG is
    /// rendered and uploaded for a signed URL when those services are available, otherwise
    /// `image_path`/`signed_url` are null and `warnings` says why.
    #[tool(name = "csv.visualize")]
    async fn csv_visualize(
        &self,
        params: Parameters<CsvVisualizeArgs>,
    ) -> Result<Json<CsvVisualizeResponse>, ErrorData> {
        tracing::info!(tool = CSV_VISUALIZE, source = %params.0.csv_path, "tool invoked");
        self.dispatcher
            .csv_visualize(params.0)
            .await
            .map(Json)
            .map_err(|err| reject(CSV_VISUALIZE, err))
    }
}

fn reject(tool: &str, err: ToolError) -> ErrorData {
    tracing::warn!(tool, kind = err.kind(), error = %err, "tool failed");
    err.to_error_data()
}

#[tool_handler]
impl ServerHandler for InsightMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "csv-insight server (tools: text.generate, csv.analyze, csv.visualize). CSV tools \
                 accept a local path or an http(s) URL; results are saved under output_dir and \
                 returned with their paths."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
