// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-CsvInsight-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of csv-insight and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Artifact persistence under a resolved output directory.
//!
//! Filenames follow `<kind>_<qualifier>_<timestamp>.<ext>`. The timestamp is UTC milliseconds
//! followed by a process-wide sequence number and a random suffix, so two invocations in the
//! same millisecond (or two processes sharing a directory) never pick the same name.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot create output directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("output path {path:?} exists and is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("cannot write artifact {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("refusing to write through symlink at {path:?}")]
    SymlinkRefused { path: PathBuf },
    #[error("artifact {path:?} already exists")]
    AlreadyExists { path: PathBuf },
}

/// A file written (or reserved) under the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Artifact {
    pub filename: String,
    pub path: String,
}

impl Artifact {
    pub fn path_buf(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }
}

/// An absolute, existing output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    /// Resolves `requested` (or `default`) to an absolute path and creates it if absent.
    pub fn prepare(requested: Option<&str>, default: &Path) -> Result<Self, ArtifactError> {
        let chosen = requested
            .map(str::trim)
            .filter(|requested| !requested.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default.to_path_buf());
        let root = absolutize(&chosen)?;

        match fs::metadata(&root) {
            Ok(md) if md.is_dir() => {}
            Ok(_) => return Err(ArtifactError::NotADirectory { path: root }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::create_dir_all(&root)
                    .map_err(|source| ArtifactError::CreateDir { path: root.clone(), source })?;
            }
            Err(source) => return Err(ArtifactError::CreateDir { path: root, source }),
        }

        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Picks a fresh artifact name without writing anything (for files produced by others).
    pub fn reserve(&self, kind: &str, qualifier: &str, ext: &str) -> Artifact {
        let filename = artifact_filename(kind, qualifier, ext);
        let path = self.root.join(&filename);
        Artifact { filename, path: path.to_string_lossy().into_owned() }
    }

    pub fn write(
        &self,
        kind: &str,
        qualifier: &str,
        ext: &str,
        contents: &[u8],
    ) -> Result<Artifact, ArtifactError> {
        let artifact = self.reserve(kind, qualifier, ext);
        write_atomic(&self.root, &artifact.path_buf(), contents)?;
        tracing::debug!(path = %artifact.path, bytes = contents.len(), "artifact written");
        Ok(artifact)
    }

    pub fn write_json<T: Serialize>(
        &self,
        kind: &str,
        qualifier: &str,
        value: &T,
    ) -> Result<Artifact, ArtifactError> {
        let json = serde_json::to_vec_pretty(value).map_err(|err| ArtifactError::Write {
            path: self.root.clone(),
            source: io::Error::other(err),
        })?;
        self.write(kind, qualifier, "json", &json)
    }
}

pub fn artifact_filename(kind: &str, qualifier: &str, ext: &str) -> String {
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{kind}_{qualifier}_{stamp}-{seq:04}-{}.{ext}", &nonce[..6])
}

fn absolutize(path: &Path) -> Result<PathBuf, ArtifactError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|source| ArtifactError::CreateDir { path: path.to_path_buf(), source })?;
    Ok(cwd.join(path))
}

/// Writes through a temp file and publishes it with a hard link, which never replaces an
/// existing `path`.
fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), ArtifactError> {
    match fs::symlink_metadata(path) {
        Ok(md) if md.file_type().is_symlink() => {
            return Err(ArtifactError::SymlinkRefused { path: path.to_path_buf() });
        }
        Ok(_) => return Err(ArtifactError::AlreadyExists { path: path.to_path_buf() }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(ArtifactError::Write { path: path.to_path_buf(), source }),
    }

    let Some(file_name) = path.file_name() else {
        return Err(ArtifactError::Write {
            path: path.to_path_buf(),
            source: io::Error::other("path has no file name"),
        });
    };
    let tmp_path = dir.join(format!(".csv-insight.tmp.{}", file_name.to_string_lossy()));

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp_path)
        .map_err(|source| ArtifactError::Write { path: tmp_path.clone(), source })?;

    if let Err(source) = file.write_all(contents) {
        drop(file);
        let _ = fs::remove_file(&tmp_path);
        return Err(ArtifactError::Write { path: tmp_path, source });
    }
    drop(file);

    let linked = fs::hard_link(&tmp_path, path);
    let _ = fs::remove_file(&tmp_path);
    match linked {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            Err(ArtifactError::AlreadyExists { path: path.to_path_buf() })
        }
        Err(source) => Err(ArtifactError::Write { path: path.to_path_buf(), source }),
    }
}
