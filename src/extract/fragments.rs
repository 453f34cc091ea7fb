//! Type preamble and class fragment extraction.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use super::imports::{ImportSet, MalformedImports, scan_line};

/// Split a typing file into its imports (merged into `imports`) and the
/// remaining lines, kept in order.
pub fn extract_types(
    path: &Path,
    imports: &mut ImportSet,
    policy: MalformedImports,
) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read typing file {}", path.display()))?;
    let types = extract_types_from_str(&text, imports, policy)
        .with_context(|| format!("failed to extract types from {}", path.display()))?;
    info!(path = %path.display(), lines = types.len(), "extracted type preamble");
    Ok(types)
}

pub fn extract_types_from_str(
    text: &str,
    imports: &mut ImportSet,
    policy: MalformedImports,
) -> Result<Vec<String>> {
    let mut types = Vec::new();
    for line in text.lines() {
        if !scan_line(line, imports, policy)? {
            types.push(line.to_string());
        }
    }
    Ok(types)
}

/// Everything from the first line containing `class ` onward. Imports on
/// every line, latched or not, are merged into `imports`.
pub fn extract_class_lines(
    text: &str,
    imports: &mut ImportSet,
    policy: MalformedImports,
) -> Result<Vec<String>> {
    let mut latched = false;
    let mut lines = Vec::new();
    for line in text.lines() {
        scan_line(line, imports, policy)?;
        if line.contains("class ") {
            latched = true;
        }
        if latched {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Concatenate the class fragments of every regular file directly inside
/// `dir`, visiting files in name order.
pub fn extract_classes(
    dir: &Path,
    imports: &mut ImportSet,
    policy: MalformedImports,
) -> Result<Vec<String>> {
    let mut fragment = Vec::new();
    for file in list_files(dir)? {
        let text = fs::read_to_string(&file)
            .with_context(|| format!("failed to read source file {}", file.display()))?;
        let lines = extract_class_lines(&text, imports, policy)
            .with_context(|| format!("failed to extract classes from {}", file.display()))?;
        debug!(path = %file.display(), lines = lines.len(), "class fragment");
        fragment.extend(lines);
    }
    info!(
        dir = %dir.display(),
        lines = fragment.len(),
        imports = imports.len(),
        "extracted class fragment"
    );
    Ok(fragment)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to list source directory {}", dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
