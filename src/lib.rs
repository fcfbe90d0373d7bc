// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! csv-insight: an MCP server that loads CSV data, asks a language model about it, and turns it
//! into charts.
//!
//! Tools are served over streamable HTTP (see [`http`]) or stdio (see [`mcp::InsightMcp`]).

pub mod artifacts;
pub mod chart;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod mcp;
pub mod model;
pub mod orchestrate;
pub mod render;
pub mod session;
pub mod source;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
