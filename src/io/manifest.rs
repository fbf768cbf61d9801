//! JSON manifest sidecars (`<artifact>.meta.json`).
//!
//! Each manifest records when its artifact was produced and which upstream
//! manifest it was built from, so consumers can tell a fresh artifact from a
//! stale one without re-running anything.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::io::atomic::write_atomic;

pub const SCHEMA_VERSION: u32 = 1;

/// Pointer to the upstream artifact a stage consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamRef {
    pub artifact: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub artifact: String,
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    #[serde(default)]
    pub upstream: Vec<UpstreamRef>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Stage-specific metadata.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Manifest {
    pub fn new(artifact: impl Into<String>, rows: usize) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            artifact: artifact.into(),
            generated_at: Utc::now(),
            rows,
            upstream: Vec::new(),
            warnings: Vec::new(),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_upstream(mut self, upstream: &Manifest) -> Self {
        self.upstream.push(UpstreamRef {
            artifact: upstream.artifact.clone(),
            generated_at: upstream.generated_at,
        });
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    /// `generated_at` recorded for `artifact`, if this manifest was built from it.
    pub fn upstream_generated_at(&self, artifact: &str) -> Option<DateTime<Utc>> {
        self.upstream
            .iter()
            .find(|u| u.artifact == artifact)
            .map(|u| u.generated_at)
    }
}

/// Sidecar path for an artifact: `dir/name.csv` → `dir/name.csv.meta.json`.
pub fn manifest_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".meta.json");
    artifact.with_file_name(name)
}

pub fn write_manifest(artifact: &Path, manifest: &Manifest) -> Result<(), AppError> {
    let path = manifest_path(artifact);
    write_atomic(&path, |w| {
        serde_json::to_writer_pretty(&mut *w, manifest).map_err(|e| AppError::json(&path, e))?;
        w.write_all(b"\n").map_err(|e| AppError::io(&path, e))
    })
}

/// Read an artifact's manifest; `Ok(None)` when it does not exist.
pub fn read_manifest(artifact: &Path) -> Result<Option<Manifest>, AppError> {
    let path = manifest_path(artifact);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|e| AppError::io(&path, e))?;
    let manifest = serde_json::from_str(&text).map_err(|e| AppError::json(&path, e))?;
    Ok(Some(manifest))
}

fn remove_manifest(artifact: &Path) -> Result<(), AppError> {
    let path = manifest_path(artifact);
    match fs::remove_file(&path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(AppError::io(&path, e)),
        _ => Ok(()),
    }
}

/// Replace an artifact and its manifest as a pair.
///
/// The old manifest goes first, so an interrupted publish can leave an
/// artifact without a manifest but never a new artifact beside an old one.
pub fn publish<F>(artifact: &Path, manifest: &Manifest, write: F) -> Result<(), AppError>
where
    F: FnOnce(&Path) -> Result<(), AppError>,
{
    remove_manifest(artifact)?;
    write(artifact)?;
    write_manifest(artifact, manifest)
}
