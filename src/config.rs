//! Run configuration.
//!
//! A single [`Config`] value is built once (defaults, optionally overlaid by a
//! TOML file and CLI flags) and handed by reference to every component.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// One entry of the model mapping. An entry without a path is skipped when
/// packaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub remove_temp_files: bool,
    pub package_models: bool,
    pub run_archive_step: bool,
    pub descriptor_filename: String,
    pub max_batch_size: u32,
    pub platform_identifier: String,
    pub model_version_number: u32,
    pub output_destination_directory: PathBuf,
    pub template_file: PathBuf,
    pub typing_file: PathBuf,
    pub pipeline_file_name: String,
    pub compiled_file_name: String,
    /// Spaces prepended to every injected input and pipeline line.
    pub indent_width: usize,
    /// Warn and treat the line as plain text instead of aborting.
    pub skip_malformed_imports: bool,
    pub models: Vec<ModelEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remove_temp_files: true,
            package_models: true,
            run_archive_step: true,
            descriptor_filename: "config.pbtxt".to_string(),
            max_batch_size: 5,
            platform_identifier: "onnxruntime_onnx".to_string(),
            model_version_number: 1,
            output_destination_directory: PathBuf::from("aws_lambda"),
            template_file: PathBuf::from("templates/lambda_function"),
            typing_file: PathBuf::from("config/typing_config.py"),
            pipeline_file_name: "pipeline.py".to_string(),
            compiled_file_name: "lambda_function.py".to_string(),
            indent_width: 4,
            skip_malformed_imports: false,
            models: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("TOML parsing error")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.descriptor_filename.trim().is_empty() {
            return Err(anyhow!("descriptor-filename must not be empty"));
        }
        if self.compiled_file_name.trim().is_empty() {
            return Err(anyhow!("compiled-file-name must not be empty"));
        }
        if self.model_version_number == 0 {
            return Err(anyhow!("model-version-number must be at least 1"));
        }
        if let Some(dup) = self
            .models
            .iter()
            .enumerate()
            .find(|(i, m)| self.models[..*i].iter().any(|o| o.name == m.name))
        {
            return Err(anyhow!("model {:?} is listed more than once", dup.1.name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_settings() {
        let cfg = Config::default();
        assert!(cfg.remove_temp_files);
        assert!(cfg.package_models);
        assert!(cfg.run_archive_step);
        assert_eq!(cfg.descriptor_filename, "config.pbtxt");
        assert_eq!(cfg.max_batch_size, 5);
        assert_eq!(cfg.platform_identifier, "onnxruntime_onnx");
        assert_eq!(cfg.model_version_number, 1);
        assert_eq!(cfg.indent_width, 4);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = Config::from_toml_str(
            r#"
max-batch-size = 8
run-archive-step = false

[[models]]
name = "detector"
path = "models/detector.onnx"

[[models]]
name = "unused"
"#,
        )
        .expect("parse");
        assert_eq!(cfg.max_batch_size, 8);
        assert!(!cfg.run_archive_step);
        assert_eq!(cfg.descriptor_filename, "config.pbtxt");
        assert_eq!(cfg.models.len(), 2);
        assert_eq!(cfg.models[0].name, "detector");
        assert!(cfg.models[1].path.is_none());
    }

    #[test]
    fn test_duplicate_model_names_rejected() {
        let err = Config::from_toml_str(
            r#"
[[models]]
name = "a"
path = "a.onnx"

[[models]]
name = "a"
path = "b.onnx"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        assert!(Config::from_toml_str("max-batch-size = \"lots\"").is_err());
    }
}
