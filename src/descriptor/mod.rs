//! Triton model descriptors (`config.pbtxt`) generated from ONNX graphs.
//!
//! # Submodules
//! - [`onnx`]   — protobuf message subset used to read graph signatures
//! - [`render`] — fixed-grammar text rendering
//!
//! # Entry points
//! - [`ModelDescriptor::from_model_file`] — introspect an artifact
//! - [`write_descriptor`]                 — introspect and write the record

pub mod onnx;
pub mod render;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use prost::Message;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::LayerError;
use onnx::{ModelProto, ValueInfoProto};

/// One tensor dimension. Dynamic axes render as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Fixed(i64),
    Dynamic,
}

impl Dim {
    pub fn value(self) -> i64 {
        match self {
            Dim::Fixed(v) => v,
            Dim::Dynamic => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    pub name: String,
    pub elem_type: i32,
    pub dims: Vec<Dim>,
}

impl TensorDescriptor {
    fn from_value_info(info: &ValueInfoProto) -> Self {
        let tensor = info.r#type.as_ref().and_then(|t| t.tensor_type.as_ref());
        let dims = tensor
            .and_then(|t| t.shape.as_ref())
            .map(|shape| {
                shape
                    .dim
                    .iter()
                    .map(|d| match (d.dim_value, &d.dim_param) {
                        (_, Some(_)) => Dim::Dynamic,
                        (Some(v), None) if v > 0 => Dim::Fixed(v),
                        _ => Dim::Dynamic,
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: info.name.clone(),
            elem_type: tensor.map_or(0, |t| t.elem_type),
            dims,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub name: String,
    pub platform: String,
    pub max_batch_size: u32,
    pub inputs: Vec<TensorDescriptor>,
    pub outputs: Vec<TensorDescriptor>,
}

/// File name without directory and without anything from the first `.` on.
pub fn model_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file_name.split_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => file_name,
    }
}

impl ModelDescriptor {
    pub fn from_model_file(path: &Path, config: &Config) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read model artifact {}", path.display()))?;
        let descriptor = Self::from_model_bytes(path, &bytes, config)?;
        debug!(
            path = %path.display(),
            inputs = descriptor.inputs.len(),
            outputs = descriptor.outputs.len(),
            "introspected model graph"
        );
        Ok(descriptor)
    }

    /// Decode a serialized ONNX model read from `path`, which also names it.
    pub fn from_model_bytes(
        path: &Path,
        bytes: &[u8],
        config: &Config,
    ) -> std::result::Result<Self, LayerError> {
        let malformed = |reason: String| LayerError::MalformedModel {
            path: path.to_path_buf(),
            reason,
        };
        let model = ModelProto::decode(bytes).map_err(|e| malformed(e.to_string()))?;
        let graph = model
            .graph
            .ok_or_else(|| malformed("model has no graph".to_string()))?;
        Ok(Self {
            name: model_name_from_path(path),
            platform: config.platform_identifier.clone(),
            max_batch_size: config.max_batch_size,
            inputs: graph.input.iter().map(TensorDescriptor::from_value_info).collect(),
            outputs: graph.output.iter().map(TensorDescriptor::from_value_info).collect(),
        })
    }

    pub fn render(&self) -> String {
        render::render_descriptor(self)
    }
}

/// Introspect `model_path` and write its descriptor to `out_path`.
pub fn write_descriptor(model_path: &Path, out_path: &Path, config: &Config) -> Result<ModelDescriptor> {
    let descriptor = ModelDescriptor::from_model_file(model_path, config)?;
    fs::write(out_path, descriptor.render())
        .with_context(|| format!("failed to write descriptor {}", out_path.display()))?;
    info!(model = %descriptor.name, path = %out_path.display(), "wrote model descriptor");
    Ok(descriptor)
}
