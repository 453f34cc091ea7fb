//! Text/marker based fragment extraction.
//!
//! # Submodules
//! - [`imports`]   — canonical import declarations from single lines
//! - [`fragments`] — typing preamble and `class ` latched fragments
//! - [`pipeline`]  — START/END delimited pipeline slices and input guesses

pub mod fragments;
pub mod imports;
pub mod pipeline;

pub use fragments::{extract_classes, extract_types};
pub use imports::{ImportSet, MalformedImports, extract_imports, scan_line};
pub use pipeline::{InputBinding, extract_pipeline, infer_inputs};
