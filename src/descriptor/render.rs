//! Text rendering of model descriptors.
//!
//! The punctuation is load-bearing: every block entry except the last closes
//! with `},` and the last with `}`.

use std::fmt::Write;

use super::{ModelDescriptor, TensorDescriptor};

/// Triton data type token for an ONNX `TensorProto.DataType` code.
pub fn data_type_token(code: i32) -> &'static str {
    match code {
        1 => "TYPE_FP32",
        2 => "TYPE_UINT8",
        3 => "TYPE_INT8",
        4 => "TYPE_UINT16",
        5 => "TYPE_INT16",
        6 => "TYPE_INT32",
        7 => "TYPE_INT64",
        8 => "TYPE_STRING",
        9 => "TYPE_BOOL",
        10 => "TYPE_FP16",
        11 => "TYPE_FP64",
        12 => "TYPE_UINT32",
        13 => "TYPE_UINT64",
        _ => "UNKNOWN",
    }
}

fn render_dims(tensor: &TensorDescriptor) -> String {
    let dims = tensor
        .dims
        .iter()
        .map(|d| d.value().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{dims}]")
}

fn render_block(out: &mut String, label: &str, tensors: &[TensorDescriptor]) {
    let _ = writeln!(out, "\n{label} [");
    for (i, tensor) in tensors.iter().enumerate() {
        let _ = write!(
            out,
            "\t{{\n\t\tname: \"{name}\",\n\t\tdata_type: {ty},\n\t\tdims: {dims}\n",
            name = tensor.name,
            ty = data_type_token(tensor.elem_type),
            dims = render_dims(tensor),
        );
        out.push_str(if i + 1 == tensors.len() { "\t}\n" } else { "\t},\n" });
    }
    out.push_str("]\n");
}

pub fn render_descriptor(descriptor: &ModelDescriptor) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name: \"{}\"", descriptor.name);
    let _ = writeln!(out, "platform: \"{}\"", descriptor.platform);
    let _ = writeln!(out, "max_batch_size: {}", descriptor.max_batch_size);
    render_block(&mut out, "input", &descriptor.inputs);
    render_block(&mut out, "output", &descriptor.outputs);
    out
}
