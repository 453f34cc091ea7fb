//! Triton model repository layout and archive step.
//!
//! ```text
//! <out>/model_repository/<model>/<descriptor-filename>
//! <out>/model_repository/<model>/<version>/model.onnx
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::config::{Config, ModelEntry};
use crate::descriptor::{ModelDescriptor, model_name_from_path};
use crate::error::LayerError;

pub const REPOSITORY_DIR: &str = "model_repository";
pub const ARCHIVE_NAME: &str = "model_repository.tar.gz";
pub const ARTIFACT_FILE: &str = "model.onnx";
pub const MODEL_EXTENSION: &str = "onnx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRepositoryEntry {
    pub model_name: String,
    pub source_path: PathBuf,
    pub target_dir: PathBuf,
    pub version: u32,
    pub copied_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct PackReport {
    pub packaged: Vec<ModelRepositoryEntry>,
    /// `(model name, error)` for every model that was skipped.
    pub failed: Vec<(String, String)>,
    pub archive: Option<PathBuf>,
}

/// Every `*.onnx` file directly inside `dir`, in name order. Files whose
/// name yields no usable repository entry, or one already taken by an
/// earlier file, are skipped with a warning.
pub fn discover_models(dir: &Path) -> Result<Vec<ModelEntry>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to list models directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == MODEL_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = HashSet::new();
    let mut models = Vec::new();
    for path in paths {
        let name = model_name_from_path(&path);
        if !is_entry_name(&name) {
            warn!(path = %path.display(), "artifact name gives no model name; skipping");
            continue;
        }
        if !seen.insert(name.clone()) {
            warn!(model = %name, path = %path.display(), "duplicate model name; skipping");
            continue;
        }
        models.push(ModelEntry {
            name,
            path: Some(path),
        });
    }
    info!(dir = %dir.display(), count = models.len(), "discovered models");
    Ok(models)
}

/// A name that maps to exactly one directory directly below the repository.
fn is_entry_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn prepare(name: &str, source: &Path, repo: &Path, config: &Config) -> Result<ModelRepositoryEntry> {
    if !is_entry_name(name) {
        return Err(anyhow!("model name {name:?} is not a single directory name"));
    }
    let target_dir = repo.join(name);
    if target_dir.exists() {
        return Err(anyhow!(
            "repository entry {} already exists",
            target_dir.display()
        ));
    }

    info!(model = name, path = %source.display(), "generating descriptor");
    // Introspect before touching the tree so a bad artifact leaves nothing behind.
    let descriptor = ModelDescriptor::from_model_file(source, config)?;

    let result = write_entry(name, source, &target_dir, &descriptor, config);
    if result.is_err() && target_dir.exists() {
        let _ = fs::remove_dir_all(&target_dir);
    }
    result
}

fn write_entry(
    name: &str,
    source: &Path,
    target_dir: &Path,
    descriptor: &ModelDescriptor,
    config: &Config,
) -> Result<ModelRepositoryEntry> {
    fs::create_dir_all(target_dir)
        .with_context(|| format!("failed to create {}", target_dir.display()))?;

    let descriptor_path = target_dir.join(&config.descriptor_filename);
    fs::write(&descriptor_path, descriptor.render())
        .with_context(|| format!("failed to write descriptor {}", descriptor_path.display()))?;

    let version = config.model_version_number;
    let version_dir = target_dir.join(version.to_string());
    fs::create_dir_all(&version_dir)
        .with_context(|| format!("failed to create {}", version_dir.display()))?;

    let copied_path = version_dir.join(ARTIFACT_FILE);
    fs::copy(source, &copied_path).with_context(|| {
        format!("failed to copy {} to {}", source.display(), copied_path.display())
    })?;

    Ok(ModelRepositoryEntry {
        model_name: name.to_string(),
        source_path: source.to_path_buf(),
        target_dir: target_dir.to_path_buf(),
        version,
        copied_path,
    })
}

/// Lay out every model under `<output_dir>/model_repository`, then archive
/// the tree when enabled. A failing model is logged and skipped; a failing
/// archiver aborts.
pub fn pack_models(models: &[ModelEntry], output_dir: &Path, config: &Config) -> Result<PackReport> {
    let repo = output_dir.join(REPOSITORY_DIR);
    fs::create_dir_all(&repo).with_context(|| format!("failed to create {}", repo.display()))?;

    let mut report = PackReport::default();
    for model in models {
        let Some(path) = model.path.as_deref() else {
            warn!(model = %model.name, "no artifact path configured; skipping");
            continue;
        };
        match prepare(&model.name, path, &repo, config) {
            Ok(entry) => report.packaged.push(entry),
            Err(e) => {
                let err = format!("{e:#}");
                warn!(model = %model.name, err = %err, "failed to package model");
                report.failed.push((model.name.clone(), err));
            }
        }
    }
    info!(
        packaged = report.packaged.len(),
        failed = report.failed.len(),
        repo = %repo.display(),
        "model repository prepared"
    );

    if config.run_archive_step {
        report.archive = Some(archive_repository(output_dir)?);
    }
    Ok(report)
}

/// `tar -czf <out>/model_repository.tar.gz -C <out> model_repository`
pub fn archive_repository(output_dir: &Path) -> Result<PathBuf> {
    let archive = output_dir.join(ARCHIVE_NAME);
    info!(path = %archive.display(), "creating model repository archive");

    let status = Command::new("tar")
        .arg("-czf")
        .arg(&archive)
        .arg("-C")
        .arg(output_dir)
        .arg(REPOSITORY_DIR)
        .status()
        .map_err(|e| anyhow!("failed to spawn tar; ensure it is installed and on PATH ({e})"))?;

    if !status.success() {
        return Err(LayerError::ArchiveStepFailure { status, archive }.into());
    }

    info!(path = %archive.display(), "model repository archive created");
    Ok(archive)
}
