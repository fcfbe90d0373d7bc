// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;
use std::path::Path;

use super::*;
use crate::testing::{write_csv, Doubles, FakeModel, FakeStore, RenderBehavior, SALES_CSV};

fn output(dir: &Path) -> OutputDir {
    OutputDir::prepare(None, dir).expect("prepare output dir")
}

fn visualize(source: &str) -> VisualizeRequest {
    VisualizeRequest { source: source.to_owned(), kind: ChartKind::Bar, columns: None, title: None }
}

fn files_in(dir: &Path) -> BTreeSet<String> {
    std::fs::read_dir(dir)
        .expect("read output dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn text_generation_persists_the_reply_verbatim() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let outcome =
        doubles.orchestrator().generate_text(&output(tmp.path()), "hello").await.expect("text");

    assert_eq!(outcome.text, "reply 1");
    assert!(outcome.artifact.filename.starts_with("text_response_"));
    assert_eq!(std::fs::read_to_string(outcome.artifact.path_buf()).expect("read"), "reply 1");
    assert_eq!(doubles.model.history_lens.lock().expect("lock").as_slice(), [0]);
}

#[tokio::test]
async fn text_generation_model_failure_is_terminal_and_writes_nothing() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let doubles = Doubles::new(FakeModel::failing_on(1), RenderBehavior::WriteImage, None);

    let err = doubles.orchestrator().generate_text(&output(tmp.path()), "hello").await.unwrap_err();

    assert_eq!(err.kind(), "ModelCallFailed");
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn detailed_analysis_runs_two_prompts_in_one_conversation() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let out_dir = tmp.path().join("out");
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let outcome = doubles
        .orchestrator()
        .analyze_csv(&output(&out_dir), &csv, AnalysisDepth::Detailed)
        .await
        .expect("analysis");

    assert_eq!(outcome.row_count, 3);
    assert_eq!(outcome.columns, ["month", "revenue", "region"]);
    assert_eq!(
        outcome.parts.iter().map(|part| part.text.as_str()).collect::<Vec<_>>(),
        ["reply 1", "reply 2"]
    );
    // The second prompt sees the first exchange.
    assert_eq!(doubles.model.history_lens.lock().expect("lock").as_slice(), [0, 2]);

    let summary = std::fs::read_to_string(outcome.summary.path_buf()).expect("summary");
    assert!(summary.contains("## Part 1\n\nreply 1"), "{summary}");
    assert!(summary.contains("## Part 2\n\nreply 2"), "{summary}");
    assert!(summary.contains("---"));
    assert_eq!(files_in(&out_dir).len(), 3);
}

#[tokio::test]
async fn basic_analysis_runs_a_single_prompt() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let outcome = doubles
        .orchestrator()
        .analyze_csv(&output(&tmp.path().join("out")), &csv, AnalysisDepth::Basic)
        .await
        .expect("analysis");

    assert_eq!(outcome.parts.len(), 1);
    assert_eq!(doubles.model.calls(), 1);
}

#[tokio::test]
async fn analysis_failure_on_a_later_part_discards_earlier_parts() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let out_dir = tmp.path().join("out");
    let doubles = Doubles::new(FakeModel::failing_on(2), RenderBehavior::WriteImage, None);

    let err = doubles
        .orchestrator()
        .analyze_csv(&output(&out_dir), &csv, AnalysisDepth::Detailed)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "ModelCallFailed");
    assert!(files_in(&out_dir).is_empty());
}

#[test]
fn analysis_prompts_embed_counts_columns_and_a_bounded_sample() {
    let rows = crate::source::RowSet::new(
        vec!["id".to_owned(), "value".to_owned()],
        (0..12).map(|i| vec![format!("row{i}"), i.to_string()]).collect(),
    );

    let prompts = analysis_prompts(&rows, AnalysisDepth::Detailed);
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("12 rows and 2 columns"));
    assert!(prompts[0].contains("Columns: id, value"));
    assert!(prompts[0].contains("\"row4\""));
    assert!(!prompts[0].contains("\"row5\""));
    assert!(prompts[1].contains("previous analysis"));

    assert_eq!(analysis_prompts(&rows, AnalysisDepth::Basic).len(), 1);
}

#[tokio::test]
async fn empty_source_is_terminal_before_any_model_call() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "empty.csv", "a,b\n");
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let err = doubles
        .orchestrator()
        .analyze_csv(&output(tmp.path()), &csv, AnalysisDepth::Basic)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "EmptySource");
    assert!(err.to_string().contains("empty.csv"));

    let err =
        doubles.orchestrator().visualize_csv(&output(tmp.path()), &visualize(&csv)).await.unwrap_err();
    assert_eq!(err.kind(), "EmptySource");
    assert_eq!(doubles.model.calls(), 0);
    assert_eq!(doubles.renderer.calls(), 0);
}

#[tokio::test]
async fn visualization_with_one_column_lists_available_columns() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "single.csv", "score\n1\n2\n");
    let out_dir = tmp.path().join("out");
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let err = doubles
        .orchestrator()
        .visualize_csv(&output(&out_dir), &visualize(&csv))
        .await
        .unwrap_err();

    match &err {
        ToolError::InsufficientColumns { available } => assert_eq!(available, &["score"]),
        other => panic!("expected InsufficientColumns, got {other:?}"),
    }
    assert!(err.to_string().contains("score"));
    assert!(files_in(&out_dir).is_empty());
    assert_eq!(doubles.renderer.calls(), 0);
}

#[tokio::test]
async fn visualization_rejects_columns_missing_from_the_source() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let mut request = visualize(&csv);
    request.columns = Some(vec!["month".to_owned(), "profit".to_owned()]);
    let err = doubles.orchestrator().visualize_csv(&output(tmp.path()), &request).await.unwrap_err();

    match err {
        ToolError::UnknownColumns { missing, available } => {
            assert_eq!(missing, ["profit"]);
            assert_eq!(available, ["month", "revenue", "region"]);
        }
        other => panic!("expected UnknownColumns, got {other:?}"),
    }
}

#[tokio::test]
async fn visualization_uses_first_two_columns_and_writes_config() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let outcome =
        doubles.orchestrator().visualize_csv(&output(tmp.path()), &visualize(&csv)).await.expect("viz");

    assert_eq!((outcome.label_column.as_str(), outcome.value_column.as_str()), ("month", "revenue"));
    assert!(outcome.config.filename.starts_with("chart_config_bar_"));

    let config: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(outcome.config.path_buf()).expect("read config"),
    )
    .expect("config json");
    assert_eq!(config["data"]["labels"], serde_json::json!(["Jan", "Feb", "Mar"]));
    assert_eq!(config["data"]["datasets"][0]["data"], serde_json::json!([100.0, null, 250.5]));
    assert_eq!(config["options"]["plugins"]["title"]["text"], "revenue by month");
    assert_eq!(doubles.model.calls(), 0);
}

#[tokio::test]
async fn caller_columns_pick_label_and_value() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let request = VisualizeRequest {
        source: csv,
        kind: ChartKind::Pie,
        columns: Some(vec!["region".to_owned(), "revenue".to_owned()]),
        title: Some("Revenue share".to_owned()),
    };
    let outcome = doubles.orchestrator().visualize_csv(&output(tmp.path()), &request).await.expect("viz");

    assert_eq!(outcome.label_column, "region");
    assert_eq!(outcome.kind, ChartKind::Pie);
    assert!(outcome.config.filename.starts_with("chart_config_pie_"));
}

#[tokio::test]
async fn render_failure_still_returns_the_config() {
    for (behavior, kind) in [
        (RenderBehavior::Unavailable, StageKind::RenderUnavailable),
        (RenderBehavior::Fail, StageKind::RenderFailed),
    ] {
        let tmp = tempfile::tempdir().expect("tempdir");
        let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
        let doubles = Doubles::new(FakeModel::default(), behavior, Some(FakeStore::new(false)));

        let outcome = doubles
            .orchestrator()
            .visualize_csv(&output(tmp.path()), &visualize(&csv))
            .await
            .expect("viz succeeds without a renderer");

        assert!(outcome.config.path_buf().is_file());
        assert!(matches!(outcome.render, Stage::Failed(_)), "{:?}", outcome.render);
        assert_eq!(outcome.render.kind(), Some(kind));
        assert!(matches!(outcome.upload, Stage::Skipped(_)), "{:?}", outcome.upload);
        assert_eq!(outcome.upload.kind(), Some(StageKind::UploadSkipped));
        assert_eq!(doubles.store.as_ref().expect("store").uploads(), 0);
    }
}

#[tokio::test]
async fn upload_failure_keeps_config_and_image() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles =
        Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, Some(FakeStore::new(true)));

    let outcome =
        doubles.orchestrator().visualize_csv(&output(tmp.path()), &visualize(&csv)).await.expect("viz");

    let image = outcome.render.as_succeeded().expect("rendered image");
    assert!(image.path_buf().is_file());
    assert!(image.filename.starts_with("chart_image_bar_"));
    assert!(matches!(outcome.upload, Stage::Failed(_)));
    assert_eq!(outcome.upload.kind(), Some(StageKind::UploadFailed));
    assert_eq!(doubles.store.as_ref().expect("store").uploads(), 1);
}

#[tokio::test]
async fn missing_image_after_render_is_an_upload_failure() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles =
        Doubles::new(FakeModel::default(), RenderBehavior::NoImage, Some(FakeStore::new(false)));

    let outcome =
        doubles.orchestrator().visualize_csv(&output(tmp.path()), &visualize(&csv)).await.expect("viz");

    assert!(outcome.render.as_succeeded().is_some());
    match &outcome.upload {
        Stage::Failed(note) => {
            assert_eq!(note.kind, StageKind::UploadFailed);
            assert!(note.detail.starts_with("cannot read "), "{note}");
        }
        other => panic!("expected upload failure, got {other:?}"),
    }
    assert_eq!(doubles.store.as_ref().expect("store").uploads(), 0);
}

#[tokio::test]
async fn unconfigured_storage_never_attempts_upload() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let outcome =
        doubles.orchestrator().visualize_csv(&output(tmp.path()), &visualize(&csv)).await.expect("viz");

    assert!(outcome.render.as_succeeded().is_some());
    assert_eq!(
        outcome.upload,
        Stage::Skipped(StageNote {
            kind: StageKind::UploadSkipped,
            detail: "storage not configured".to_owned(),
        })
    );
}

#[tokio::test]
async fn successful_upload_yields_a_signed_url() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let doubles =
        Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, Some(FakeStore::new(false)));

    let outcome =
        doubles.orchestrator().visualize_csv(&output(tmp.path()), &visualize(&csv)).await.expect("viz");

    let image = outcome.render.as_succeeded().expect("rendered image").clone();
    let url = outcome.upload.succeeded().expect("signed url");
    assert!(url.contains(&image.filename), "{url}");
}

#[tokio::test]
async fn remote_sources_go_through_the_fetcher() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);

    let outcome = doubles
        .orchestrator()
        .visualize_csv(&output(tmp.path()), &visualize("https://data.example/sales.csv"))
        .await
        .expect("viz");

    assert_eq!(doubles.fetcher.calls(), 1);
    assert_eq!(outcome.value_column, "revenue");
}

#[tokio::test]
async fn concurrent_visualizations_never_collide_on_filenames() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let csv = write_csv(tmp.path(), "sales.csv", SALES_CSV);
    let out_dir = tmp.path().join("out");
    let doubles = Doubles::new(FakeModel::default(), RenderBehavior::WriteImage, None);
    let out = output(&out_dir);

    let mut runs = tokio::task::JoinSet::new();
    for _ in 0..32 {
        let orchestrator = doubles.orchestrator();
        let out = out.clone();
        let request = visualize(&csv);
        runs.spawn(async move { orchestrator.visualize_csv(&out, &request).await });
    }

    let mut names = BTreeSet::new();
    while let Some(joined) = runs.join_next().await {
        let outcome = joined.expect("task").expect("viz");
        assert!(names.insert(outcome.config.filename));
        let image = outcome.render.succeeded().expect("image");
        assert!(names.insert(image.filename));
    }
    assert_eq!(names.len(), 64);
    assert_eq!(files_in(&out_dir).len(), 64);
}
