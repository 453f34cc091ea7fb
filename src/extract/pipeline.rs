//! Per-process slices of the shared pipeline file, and the input guesses
//! derived from them.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};

static CALL_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w+\((.*?)\)").expect("valid call regex"));

pub fn start_marker(process: &str) -> String {
    format!("*** {} START ***", process.to_uppercase())
}

pub fn end_marker(process: &str) -> String {
    format!("*** {} END ***", process.to_uppercase())
}

/// Rewrites `[self.]<process>_pre(` / `[self.]<process>_post(` to the
/// generic handler names used by the assembled function.
struct HandlerRewriter {
    pre: Regex,
    post: Regex,
}

impl HandlerRewriter {
    fn new(process: &str) -> Self {
        let name = regex::escape(process);
        Self {
            pre: Regex::new(&format!(r"(?:\bself\.|\b){name}_pre\(")).expect("valid pre regex"),
            post: Regex::new(&format!(r"(?:\bself\.|\b){name}_post\("))
                .expect("valid post regex"),
        }
    }

    fn rewrite(&self, line: &str) -> String {
        let line = self.pre.replace_all(line, "preprocessor(");
        self.post.replace_all(&line, "postprocessor(").into_owned()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Inference,
    Processing,
}

fn section_marker(line: &str) -> Option<Section> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("# Inference") {
        Some(Section::Inference)
    } else if trimmed.starts_with("# Preprocess") || trimmed.starts_with("# Postprocess") {
        Some(Section::Processing)
    } else {
        None
    }
}

/// Read `path` and return the fragment belonging to `process`.
pub fn extract_pipeline(path: &Path, process: &str) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read pipeline file {}", path.display()))?;
    let fragment = extract_pipeline_from_str(&text, process);
    info!(path = %path.display(), process, lines = fragment.len(), "extracted pipeline fragment");
    Ok(fragment)
}

/// Lines strictly between the START and END markers of `process`, with the
/// inference sections gated out and handler calls rewritten.
pub fn extract_pipeline_from_str(text: &str, process: &str) -> Vec<String> {
    let start = start_marker(process);
    let end = end_marker(process);
    let rewriter = HandlerRewriter::new(process);

    let mut fragment = Vec::new();
    let mut inside = false;
    let mut active = true;
    for line in text.lines() {
        if line.contains(&end) {
            return fragment;
        }
        if !inside {
            inside = line.contains(&start);
            continue;
        }
        match section_marker(line) {
            Some(Section::Inference) => active = false,
            Some(Section::Processing) => active = true,
            None => {}
        }
        if active {
            fragment.push(rewriter.rewrite(line));
        }
    }

    if inside {
        warn!(process, marker = %end, "pipeline section has no END marker; using rest of file");
    } else {
        warn!(process, marker = %start, "pipeline section not found");
    }
    fragment
}

/// A guessed event-sourced input of the assembled handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub name: String,
}

impl InputBinding {
    pub fn accessor(&self) -> String {
        format!("{name} = event.get('{name}')", name = self.name)
    }
}

fn is_candidate(arg: &str) -> bool {
    !arg.is_empty()
        && !arg.chars().all(|c| c.is_ascii_digit())
        && !(arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"'))
        && !(arg.len() >= 2 && arg.starts_with('\'') && arg.ends_with('\''))
        && !arg.starts_with('(')
        && arg != "True"
        && arg != "False"
}

/// Every plausible variable argument of every call in `fragment`, in
/// first-seen order. Duplicates are kept.
pub fn infer_inputs(fragment: &[String]) -> Vec<InputBinding> {
    let mut inputs = Vec::new();
    for line in fragment {
        for caps in CALL_ARGS.captures_iter(line) {
            for arg in caps[1].split(',') {
                let arg = arg.trim();
                if is_candidate(arg) {
                    inputs.push(InputBinding {
                        name: arg.to_string(),
                    });
                }
            }
        }
    }
    debug!(count = inputs.len(), "inferred pipeline inputs");
    inputs
}
