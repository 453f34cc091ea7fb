use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Failures with a meaning of their own. Everything else (missing template,
/// unreadable pipeline file, permission errors) travels as plain I/O errors
/// wrapped in `anyhow` context.
#[derive(Error, Debug)]
pub enum LayerError {
    #[error("malformed import line {line:?}: {reason}")]
    MalformedImportLine { line: String, reason: String },

    #[error("model artifact {} is not a readable ONNX graph: {reason}", path.display())]
    MalformedModel { path: PathBuf, reason: String },

    #[error("archiver exited with {status} while writing {}", archive.display())]
    ArchiveStepFailure { status: ExitStatus, archive: PathBuf },
}
