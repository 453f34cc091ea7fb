/// layerforge library crate.
///
/// Exposes the extraction, assembly and packaging stages as a public API so
/// that integration tests in tests/ can import them via `layerforge::`.
///
/// The binary entry point (src/main.rs) uses these same modules.
pub mod config;
pub mod descriptor;
pub mod error;
pub mod extract;
pub mod layer;
pub mod packager;
pub mod template;
pub mod utils;
