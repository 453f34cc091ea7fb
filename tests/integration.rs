/// Integration tests for layerforge pipeline stages.
///
/// These tests run the library against the fixture tree in
/// tests/fixtures/lambda and against ONNX models encoded on the fly. They do
/// NOT invoke `tar`; archive behaviour is covered by the CLI tests.
use std::fs;
use std::path::{Path, PathBuf};

use layerforge::config::{Config, ModelEntry};
use layerforge::descriptor::onnx::{Dimension, GraphProto, ModelProto, ValueInfoProto};
use layerforge::descriptor::{ModelDescriptor, write_descriptor};
use layerforge::error::LayerError;
use layerforge::extract::pipeline::extract_pipeline_from_str;
use layerforge::layer::LayerBuilder;
use layerforge::packager::pack_models;
use prost::Message;
use tempfile::tempdir;

fn fixture_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/lambda")
}

fn fixture_config() -> Config {
    let root = fixture_root();
    Config {
        template_file: root.join("templates/lambda_function"),
        typing_file: root.join("config/typing_config.py"),
        run_archive_step: false,
        ..Config::default()
    }
}

fn write_model(dir: &Path, file: &str, inputs: Vec<ValueInfoProto>, outputs: Vec<ValueInfoProto>) -> PathBuf {
    let bytes = ModelProto {
        ir_version: 9,
        producer_name: "integration".to_string(),
        graph: Some(GraphProto {
            name: "main".to_string(),
            input: inputs,
            output: outputs,
        }),
    }
    .encode_to_vec();
    let path = dir.join(file);
    fs::write(&path, bytes).expect("write model");
    path
}

// ── layer assembly ───────────────────────────────────────────────────────────

#[test]
fn integration_each_directory_builds_one_handler_per_process() {
    let config = fixture_config();
    let staging = tempdir().expect("tempdir");
    let built = LayerBuilder::new(&config)
        .build_each_directory(&fixture_root().join("src"), staging.path())
        .expect("build failed");

    let names: Vec<&str> = built.iter().map(|b| b.process.as_str()).collect();
    assert_eq!(names, vec!["classify", "detect"]);
    assert!(staging.path().join("detect/lambda_function.py").exists());
    assert!(staging.path().join("classify/lambda_function.py").exists());
}

#[test]
fn integration_detect_handler_content() {
    let config = fixture_config();
    let staging = tempdir().expect("tempdir");
    LayerBuilder::new(&config)
        .build_each_directory(&fixture_root().join("src"), staging.path())
        .expect("build failed");
    let out = fs::read_to_string(staging.path().join("detect/lambda_function.py"))
        .expect("read handler");

    assert!(
        out.starts_with(
            "import json\nfrom typing import List\nfrom typing import TypedDict\nimport numpy as np\nimport cv2\nimport base64\n"
        ),
        "unexpected import block:\n{out}"
    );
    assert!(!out.contains("Handler template"), "pre-imports line leaked");
    assert!(out.contains("class Box(TypedDict):"), "missing type preamble");
    assert!(!out.contains("SCORE_FLOOR = 0.05"), "pre-class line leaked");

    let post = out.find("class Postprocessor:").expect("postprocessor class");
    let pre = out.find("class Preprocessor:").expect("preprocessor class");
    assert!(post < pre, "class files not concatenated in name order");

    assert!(out.contains(
        "    image = event.get('image')\n    raw = event.get('raw')\n    threshold = event.get('threshold')\n"
    ));
    assert!(out.contains(
        "    # Preprocess\n    tensor = preprocessor(image, 640)\n    # Postprocess\n    result = postprocessor(raw, threshold)\n"
    ));
    assert!(!out.contains("self.detector.run"), "inference section leaked");
    assert!(!out.contains("classify"), "other process leaked");
    assert!(out.ends_with("    return {\"statusCode\": 200, \"body\": json.dumps(result)}\n"));
}

#[test]
fn integration_rebuild_is_byte_identical() {
    let config = fixture_config();
    let first = tempdir().expect("tempdir");
    let second = tempdir().expect("tempdir");
    let builder = LayerBuilder::new(&config);
    builder
        .build_each_directory(&fixture_root().join("src"), first.path())
        .expect("first build");
    builder
        .build_each_directory(&fixture_root().join("src"), second.path())
        .expect("second build");
    for process in ["detect", "classify"] {
        let a = fs::read(first.path().join(process).join("lambda_function.py")).expect("a");
        let b = fs::read(second.path().join(process).join("lambda_function.py")).expect("b");
        assert_eq!(a, b, "{process} differs between runs");
    }
}

#[test]
fn integration_malformed_import_aborts_build() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    fs::create_dir_all(src.join("broken")).expect("mkdir");
    fs::write(src.join("broken/mod.py"), "from x import (a,\nclass A:\n").expect("write");
    fs::write(src.join("pipeline.py"), "").expect("write");

    let config = fixture_config();
    let err = LayerBuilder::new(&config)
        .build_each_directory(&src, &tmp.path().join("out"))
        .expect_err("malformed import should abort");
    assert!(
        matches!(
            err.downcast_ref::<LayerError>(),
            Some(LayerError::MalformedImportLine { .. })
        ),
        "unexpected error: {err:#}"
    );

    let lenient = Config {
        skip_malformed_imports: true,
        ..fixture_config()
    };
    let built = LayerBuilder::new(&lenient)
        .build_each_directory(&src, &tmp.path().join("out2"))
        .expect("skip policy should continue");
    assert_eq!(built[0].class_lines, 1);
}

#[test]
fn integration_missing_pipeline_file_aborts() {
    let tmp = tempdir().expect("tempdir");
    let src = tmp.path().join("src");
    fs::create_dir_all(src.join("solo")).expect("mkdir");
    fs::write(src.join("solo/a.py"), "class A:\n    pass\n").expect("write");

    let config = fixture_config();
    assert!(
        LayerBuilder::new(&config)
            .build_each_directory(&src, &tmp.path().join("out"))
            .is_err()
    );
}

#[test]
fn integration_inference_span_removed_between_markers() {
    let text = "*** X START ***\nkeep_a()\n\t# Inference\ndrop_b()\ndrop_c()\n\t# Postprocess\nkeep_d()\n*** X END ***\n";
    let fragment = extract_pipeline_from_str(text, "x");
    assert_eq!(fragment, vec!["keep_a()", "\t# Postprocess", "keep_d()"]);
}

// ── model descriptor + repository ────────────────────────────────────────────

#[test]
fn integration_descriptor_for_two_inputs_one_output() {
    let tmp = tempdir().expect("tempdir");
    let model = write_model(
        tmp.path(),
        "ranker.onnx",
        vec![
            ValueInfoProto::tensor("query", 7, vec![Dimension::symbolic("batch"), Dimension::fixed(32)]),
            ValueInfoProto::tensor("doc", 7, vec![Dimension::symbolic("batch"), Dimension::fixed(128)]),
        ],
        vec![ValueInfoProto::tensor("score", 1, vec![Dimension::symbolic("batch"), Dimension::fixed(1)])],
    );
    let out = tmp.path().join("config.pbtxt");
    let descriptor = write_descriptor(&model, &out, &fixture_config()).expect("descriptor");
    assert_eq!(descriptor.name, "ranker");

    let text = fs::read_to_string(&out).expect("read descriptor");
    assert_eq!(
        text,
        "name: \"ranker\"\nplatform: \"onnxruntime_onnx\"\nmax_batch_size: 5\n\n\
input [\n\t{\n\t\tname: \"query\",\n\t\tdata_type: TYPE_INT64,\n\t\tdims: [-1, 32]\n\t},\n\
\t{\n\t\tname: \"doc\",\n\t\tdata_type: TYPE_INT64,\n\t\tdims: [-1, 128]\n\t}\n]\n\n\
output [\n\t{\n\t\tname: \"score\",\n\t\tdata_type: TYPE_FP32,\n\t\tdims: [-1, 1]\n\t}\n]\n"
    );

    let input_block = &text[text.find("input [").unwrap()..text.find("output [").unwrap()];
    assert_eq!(input_block.matches("\t},\n").count(), 1);
    assert_eq!(input_block.matches("\t}\n").count(), 1);
}

#[test]
fn integration_descriptor_missing_artifact_errors() {
    let err = ModelDescriptor::from_model_file(Path::new("/definitely/not/here.onnx"), &Config::default())
        .expect_err("missing file should fail");
    assert!(format!("{err:#}").contains("here.onnx"));
}

#[test]
fn integration_packaging_skips_missing_model() {
    let tmp = tempdir().expect("tempdir");
    let good = write_model(
        tmp.path(),
        "a.onnx",
        vec![ValueInfoProto::tensor("x", 1, vec![Dimension::fixed(3)])],
        vec![ValueInfoProto::tensor("y", 1, vec![Dimension::fixed(3)])],
    );
    let out = tmp.path().join("out");
    let models = vec![
        ModelEntry {
            name: "a".to_string(),
            path: Some(good),
        },
        ModelEntry {
            name: "b".to_string(),
            path: Some(tmp.path().join("missing.onnx")),
        },
    ];

    let report = pack_models(&models, &out, &fixture_config()).expect("run completes");

    let repo = out.join("model_repository");
    assert!(repo.join("a/config.pbtxt").exists());
    assert!(repo.join("a/1/model.onnx").exists());
    assert!(!repo.join("b").exists());
    assert_eq!(report.packaged.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "b");
    assert_eq!(
        fs::read(repo.join("a/1/model.onnx")).expect("copied"),
        fs::read(tmp.path().join("a.onnx")).expect("source")
    );
}
