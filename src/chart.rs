// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Chart.js-shaped chart descriptor, as read by the renderer script.
//!
//! Labels come from the first selected column verbatim. Values come from the second column,
//! coerced to numbers; cells that do not parse become NaN, which serializes as `null`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::source::RowSet;

const FILL_COLOR: &str = "rgba(54, 162, 235, 0.5)";
const BORDER_COLOR: &str = "rgba(54, 162, 235, 1)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Scatter,
    Pie,
}

impl ChartKind {
    pub const ALL: [ChartKind; 4] = [Self::Bar, Self::Line, Self::Scatter, Self::Pie];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Scatter => "scatter",
            Self::Pie => "pie",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s).ok_or(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: ChartOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: &'static str,
    pub border_color: &'static str,
    pub border_width: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartOptions {
    pub responsive: bool,
    pub plugins: ChartPlugins,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scales: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartPlugins {
    pub title: ChartTitle,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartTitle {
    pub display: bool,
    pub text: String,
}

pub fn default_title(label_column: &str, value_column: &str) -> String {
    format!("{value_column} by {label_column}")
}

/// Numeric coercion for the value column; never an error.
pub fn coerce_numeric(cell: &str) -> f64 {
    cell.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Builds the descriptor. Both columns must exist in `rows`.
pub fn build_chart(
    rows: &RowSet,
    kind: ChartKind,
    label_column: &str,
    value_column: &str,
    title: Option<&str>,
) -> Option<ChartConfig> {
    let labels = rows.column_values(label_column)?.into_iter().map(ToOwned::to_owned).collect();
    let data = rows.column_values(value_column)?.into_iter().map(coerce_numeric).collect();

    let title = title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_title(label_column, value_column));

    let scales = (kind != ChartKind::Pie).then(|| serde_json::json!({ "y": { "beginAtZero": true } }));

    Some(ChartConfig {
        kind,
        data: ChartData {
            labels,
            datasets: vec![Dataset {
                label: value_column.to_owned(),
                data,
                background_color: FILL_COLOR,
                border_color: BORDER_COLOR,
                border_width: 1,
            }],
        },
        options: ChartOptions {
            responsive: true,
            plugins: ChartPlugins { title: ChartTitle { display: true, text: title } },
            scales,
        },
    })
}
