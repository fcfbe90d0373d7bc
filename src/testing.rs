// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! In-process collaborator doubles with call counters.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Url;

use crate::config::Timeouts;
use crate::model::{LanguageModel, ModelError, Turn};
use crate::orchestrate::{Collaborators, Orchestrator};
use crate::render::{ChartRenderer, RenderError};
use crate::source::{FetchedBody, SourceFetcher};
use crate::storage::{ArtifactStore, StorageError};

pub(crate) const SALES_CSV: &str = "month,revenue,region\nJan,100,north\nFeb,n/a,south\nMar,250.5,north\n";

#[derive(Default)]
pub(crate) struct FakeFetcher {
    pub calls: AtomicUsize,
    pub body: Mutex<Option<FetchedBody>>,
}

impl FakeFetcher {
    pub fn serving(content_type: &str, body: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            body: Mutex::new(Some(FetchedBody {
                status: 200,
                content_type: Some(content_type.to_owned()),
                body: body.as_bytes().to_vec(),
            })),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, _url: &Url) -> Result<FetchedBody, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.body.lock().expect("fetcher lock").clone().ok_or_else(|| "no route to host".to_owned())
    }
}

/// Answers `reply <n>` for the n-th call; fails on the call index in `fail_on` (1-based).
#[derive(Default)]
pub(crate) struct FakeModel {
    pub calls: AtomicUsize,
    pub fail_on: Option<usize>,
    pub history_lens: Mutex<Vec<usize>>,
}

impl FakeModel {
    pub fn failing_on(call: usize) -> Self {
        Self { fail_on: Some(call), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn submit_prompt(&self, history: &[Turn], _prompt: &str) -> Result<String, ModelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.history_lens.lock().expect("model lock").push(history.len());
        if self.fail_on == Some(call) {
            return Err(ModelError::Api { status: 503, body: "overloaded".to_owned() });
        }
        Ok(format!("reply {call}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderBehavior {
    WriteImage,
    /// Exits cleanly without producing the image.
    NoImage,
    Unavailable,
    Fail,
}

pub(crate) struct FakeRenderer {
    pub calls: AtomicUsize,
    pub behavior: RenderBehavior,
    pub images: Mutex<Vec<PathBuf>>,
}

impl FakeRenderer {
    pub fn new(behavior: RenderBehavior) -> Self {
        Self { calls: AtomicUsize::new(0), behavior, images: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChartRenderer for FakeRenderer {
    async fn render(&self, config_path: &Path, image_path: &Path) -> Result<(), RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            RenderBehavior::WriteImage => {
                assert!(config_path.is_file(), "config must exist before rendering");
                std::fs::write(image_path, b"\x89PNG fake")
                    .map_err(|err| RenderError::Failed(err.to_string()))?;
                self.images.lock().expect("renderer lock").push(image_path.to_path_buf());
                Ok(())
            }
            RenderBehavior::NoImage => Ok(()),
            RenderBehavior::Unavailable => {
                Err(RenderError::Unavailable("render script not found".to_owned()))
            }
            RenderBehavior::Fail => Err(RenderError::Failed("exit status: 1".to_owned())),
        }
    }
}

pub(crate) struct FakeStore {
    pub uploads: AtomicUsize,
    pub fail_upload: bool,
}

impl FakeStore {
    pub fn new(fail_upload: bool) -> Self {
        Self { uploads: AtomicUsize::new(0), fail_upload }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactStore for FakeStore {
    async fn upload(&self, _: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        assert_eq!(content_type, "image/png");
        assert!(!bytes.is_empty());
        if self.fail_upload {
            return Err(StorageError::Api { status: 500, body: "bucket offline".to_owned() });
        }
        Ok(())
    }

    async fn signed_url(&self, object_path: &str) -> Result<String, StorageError> {
        Ok(format!("https://storage.example/signed/{object_path}?token=t"))
    }
}

/// All doubles for one test, plus an orchestrator wired to them.
pub(crate) struct Doubles {
    pub fetcher: Arc<FakeFetcher>,
    pub model: Arc<FakeModel>,
    pub renderer: Arc<FakeRenderer>,
    pub store: Option<Arc<FakeStore>>,
}

impl Doubles {
    pub fn new(model: FakeModel, render: RenderBehavior, store: Option<FakeStore>) -> Self {
        Self {
            fetcher: Arc::new(FakeFetcher::serving("text/csv", SALES_CSV)),
            model: Arc::new(model),
            renderer: Arc::new(FakeRenderer::new(render)),
            store: store.map(Arc::new),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            fetcher: self.fetcher.clone(),
            model: self.model.clone(),
            renderer: self.renderer.clone(),
            storage: self.store.clone().map(|store| store as Arc<dyn ArtifactStore>),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.collaborators(), Timeouts::default())
    }

    pub fn external_calls(&self) -> usize {
        self.fetcher.calls()
            + self.model.calls()
            + self.renderer.calls()
            + self.store.as_ref().map_or(0, |store| store.uploads())
    }
}

pub(crate) fn write_csv(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write csv fixture");
    path.to_string_lossy().into_owned()
}
