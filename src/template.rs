//! Line-oriented template assembly.
//!
//! The template is streamed once. Nothing is written until the imports
//! marker has been seen; after that, non-marker lines pass through verbatim.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::extract::{ImportSet, InputBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Imports,
    Types,
    Classes,
    Inputs,
    Pipeline,
}

impl Placeholder {
    /// Checked in this order; the first marker found on a line wins.
    pub const ALL: [Placeholder; 5] = [
        Placeholder::Imports,
        Placeholder::Types,
        Placeholder::Classes,
        Placeholder::Inputs,
        Placeholder::Pipeline,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            Placeholder::Imports => "IMPORTS GO HERE",
            Placeholder::Types => "TYPES GO HERE",
            Placeholder::Classes => "CLASSES GO HERE",
            Placeholder::Inputs => "LAMBDA INPUTS GO HERE",
            Placeholder::Pipeline => "PIPELINE GOES HERE",
        }
    }

    pub fn detect(line: &str) -> Option<Placeholder> {
        Self::ALL.into_iter().find(|p| line.contains(p.marker()))
    }
}

/// The extracted pieces substituted into one template.
#[derive(Debug, Clone, Copy)]
pub struct Fragments<'a> {
    pub imports: &'a ImportSet,
    pub types: &'a [String],
    pub classes: &'a [String],
    pub inputs: &'a [InputBinding],
    pub pipeline: &'a [String],
}

fn write_lines<'l, W: Write>(
    out: &mut W,
    lines: impl IntoIterator<Item = &'l String>,
) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn write_indented<W, S>(out: &mut W, lines: impl IntoIterator<Item = S>, indent: &str) -> std::io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    for line in lines {
        writeln!(out, "{indent}{}", line.as_ref().trim_start())?;
    }
    Ok(())
}

/// Stream `template` into `out`, substituting each placeholder's first
/// occurrence. Repeated markers and every line before the imports marker
/// are dropped.
pub fn assemble<W: Write>(
    template: &str,
    fragments: &Fragments<'_>,
    indent_width: usize,
    out: &mut W,
) -> std::io::Result<()> {
    let indent = " ".repeat(indent_width);
    let mut writing = false;
    let mut consumed = [false; Placeholder::ALL.len()];

    for line in template.split_inclusive('\n') {
        let Some(placeholder) = Placeholder::detect(line) else {
            if writing {
                out.write_all(line.as_bytes())?;
            }
            continue;
        };

        let slot = &mut consumed[placeholder as usize];
        if *slot {
            debug!(marker = placeholder.marker(), "dropping repeated placeholder");
            continue;
        }
        *slot = true;

        match placeholder {
            Placeholder::Imports => {
                writing = true;
                write_lines(out, fragments.imports.iter())?;
            }
            Placeholder::Types => write_lines(out, fragments.types)?,
            Placeholder::Classes => write_lines(out, fragments.classes)?,
            Placeholder::Inputs => write_indented(
                out,
                fragments.inputs.iter().map(InputBinding::accessor),
                &indent,
            )?,
            Placeholder::Pipeline => write_indented(out, fragments.pipeline, &indent)?,
        }
    }
    Ok(())
}

/// Assemble `template_path` into `output_path`.
pub fn build_from_template(
    template_path: &Path,
    output_path: &Path,
    fragments: &Fragments<'_>,
    indent_width: usize,
) -> Result<()> {
    let template = fs::read_to_string(template_path)
        .with_context(|| format!("failed to read template {}", template_path.display()))?;
    let file = File::create(output_path)
        .with_context(|| format!("failed to create {}", output_path.display()))?;
    let mut out = BufWriter::new(file);
    assemble(&template, fragments, indent_width, &mut out)
        .and_then(|()| out.flush())
        .with_context(|| format!("failed to write {}", output_path.display()))?;
    info!(
        template = %template_path.display(),
        output = %output_path.display(),
        "assembled template"
    );
    Ok(())
}
