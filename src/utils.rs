use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::info;

/// Copy the contents of `src` into `dest`, merging with any existing
/// directories and overwriting files of the same name.
pub fn merge_into(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    for entry in
        fs::read_dir(src).with_context(|| format!("failed to list {}", src.display()))?
    {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            merge_into(&from, &to)?;
        } else {
            fs::copy(&from, &to).with_context(|| {
                format!("failed to copy {} to {}", from.display(), to.display())
            })?;
        }
    }
    Ok(())
}

/// Scratch directory the run writes into before merging into the destination.
pub fn create_staging_dir() -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("layerforge-")
        .tempdir()
        .context("failed to create staging directory")?;
    info!(path = %dir.path().display(), "staging directory created");
    Ok(dir)
}

/// Drop (and delete) the staging directory, or keep it on disk and return
/// where it lives.
pub fn finish_staging(dir: TempDir, remove: bool) -> Option<PathBuf> {
    if remove {
        info!(path = %dir.path().display(), "removing staging directory");
        drop(dir);
        None
    } else {
        let kept = dir.keep();
        info!(path = %kept.display(), "keeping staging directory");
        Some(kept)
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub item: String,
    pub kind: &'static str,
    pub status: String,
}

pub fn print_summary(rows: &[SummaryRow], destination: &Path) {
    if rows.is_empty() {
        println!("\nNothing was built. Output directory: {}", destination.display());
        return;
    }
    let width = rows.iter().map(|r| r.item.len()).max().unwrap_or(4).max(4);
    println!();
    println!("{:<width$} | {:<7} | Status", "Item", "Kind");
    println!("{:-<width$}-+-{:-<7}-+-{:-<20}", "", "", "");
    for row in rows {
        println!("{:<width$} | {:<7} | {}", row.item, row.kind, row.status);
    }
    println!("\nOutput directory: {}", destination.display());
}
