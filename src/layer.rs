//! Per-process assembly: gather fragments for one process and render its
//! compiled handler from the template.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::config::Config;
use crate::extract::{
    ImportSet, MalformedImports, extract_classes, extract_pipeline, extract_types, infer_inputs,
    scan_line,
};
use crate::template::{Fragments, build_from_template};

/// Outcome of assembling one process.
#[derive(Debug, Clone)]
pub struct BuiltProcess {
    pub process: String,
    pub output: PathBuf,
    pub imports: usize,
    pub class_lines: usize,
    pub pipeline_lines: usize,
    pub inputs: usize,
}

/// Imports and type lines shared by every process: the template's own
/// imports followed by the typing file.
#[derive(Debug, Clone, Default)]
pub struct Preamble {
    pub imports: ImportSet,
    pub types: Vec<String>,
}

pub struct LayerBuilder<'a> {
    config: &'a Config,
}

impl<'a> LayerBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn policy(&self) -> MalformedImports {
        if self.config.skip_malformed_imports {
            MalformedImports::Skip
        } else {
            MalformedImports::Abort
        }
    }

    pub fn prepare_template(&self) -> Result<Preamble> {
        let template = &self.config.template_file;
        let text = fs::read_to_string(template)
            .with_context(|| format!("failed to read template {}", template.display()))?;
        let mut imports = ImportSet::new();
        for line in text.lines() {
            scan_line(line, &mut imports, self.policy())
                .with_context(|| format!("failed to scan template {}", template.display()))?;
        }
        let types = extract_types(&self.config.typing_file, &mut imports, self.policy())?;
        Ok(Preamble { imports, types })
    }

    /// Assemble `process` from the class files in `class_dir` and its slice
    /// of `<src_root>/<pipeline-file-name>`, writing `output`.
    pub fn build_process(
        &self,
        preamble: &Preamble,
        process: &str,
        class_dir: &Path,
        src_root: &Path,
        output: &Path,
    ) -> Result<BuiltProcess> {
        let mut imports = preamble.imports.clone();
        let classes = extract_classes(class_dir, &mut imports, self.policy())?;
        let pipeline =
            extract_pipeline(&src_root.join(&self.config.pipeline_file_name), process)?;
        let inputs = infer_inputs(&pipeline);

        let fragments = Fragments {
            imports: &imports,
            types: &preamble.types,
            classes: &classes,
            inputs: &inputs,
            pipeline: &pipeline,
        };
        build_from_template(
            &self.config.template_file,
            output,
            &fragments,
            self.config.indent_width,
        )
        .with_context(|| format!("failed to assemble process {process}"))?;

        Ok(BuiltProcess {
            process: process.to_string(),
            output: output.to_path_buf(),
            imports: imports.len(),
            class_lines: classes.len(),
            pipeline_lines: pipeline.len(),
            inputs: inputs.len(),
        })
    }

    /// One process per subdirectory of `src_root` whose name has no `_`,
    /// each written to `<staging>/<process>/<compiled-file-name>`.
    pub fn build_each_directory(&self, src_root: &Path, staging: &Path) -> Result<Vec<BuiltProcess>> {
        let preamble = self.prepare_template()?;

        let mut processes = Vec::new();
        for entry in fs::read_dir(src_root)
            .with_context(|| format!("failed to list source root {}", src_root.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && !name.contains('_') {
                processes.push(name);
            }
        }
        processes.sort();

        let mut built = Vec::new();
        for process in processes {
            info!(process = %process, "processing directory");
            let target_dir = staging.join(&process);
            fs::create_dir_all(&target_dir)
                .with_context(|| format!("failed to create {}", target_dir.display()))?;
            let output = target_dir.join(&self.config.compiled_file_name);
            built.push(self.build_process(
                &preamble,
                &process,
                &src_root.join(&process),
                src_root,
                &output,
            )?);
        }
        info!(count = built.len(), "assembled processes");
        Ok(built)
    }

    /// The source directory itself is the single process, named after the
    /// directory. Classes and `<pipeline-file-name>` are both read from
    /// `src_dir`; writes `<staging>/<compiled-file-name>`.
    pub fn build_single(&self, src_dir: &Path, staging: &Path) -> Result<BuiltProcess> {
        let process = src_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("cannot derive a process name from {}", src_dir.display()))?;
        let preamble = self.prepare_template()?;
        let output = staging.join(&self.config.compiled_file_name);
        self.build_process(&preamble, &process, src_dir, src_dir, &output)
    }
}
