//! Import declaration extraction.
//!
//! A line is only handed to the Python parser when it contains `import `;
//! every imported name becomes one canonical declaration
//! (`import M[ as A]` or `from M import N[ as A]`).

use rustpython_parser::Parse;
use rustpython_parser::ast::{Alias, ExceptHandler, Stmt, Suite};
use tracing::warn;

use crate::error::LayerError;

/// Ordered set of canonical import declarations, first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    decls: Vec<String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `decl` unless already present. Returns true when it was new.
    pub fn insert(&mut self, decl: String) -> bool {
        if self.decls.contains(&decl) {
            return false;
        }
        self.decls.push(decl);
        true
    }

    pub fn contains(&self, decl: &str) -> bool {
        self.decls.iter().any(|d| d == decl)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.decls
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.decls.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for ImportSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = ImportSet::new();
        for decl in iter {
            set.insert(decl.into());
        }
        set
    }
}

/// What to do with a line that looks like an import but does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedImports {
    #[default]
    Abort,
    Skip,
}

/// Parse one line and merge its import declarations into `set`.
///
/// Returns whether the line held an import statement. Lines without the
/// `import ` substring are never parsed and never fail.
pub fn extract_imports(line: &str, set: &mut ImportSet) -> Result<bool, LayerError> {
    if !line.contains("import ") {
        return Ok(false);
    }

    // Indentation is meaningless for a lone line; imports inside function
    // bodies are hoisted instead of rejected.
    let source = line.trim_start();
    let suite =
        Suite::parse(source, "<line>").map_err(|e| LayerError::MalformedImportLine {
            line: line.to_string(),
            reason: e.to_string(),
        })?;

    let mut matched = false;
    collect_imports(&suite, set, &mut matched);
    Ok(matched)
}

/// [`extract_imports`] with a policy for unparsable lines.
pub fn scan_line(
    line: &str,
    set: &mut ImportSet,
    policy: MalformedImports,
) -> Result<bool, LayerError> {
    match extract_imports(line, set) {
        Err(LayerError::MalformedImportLine { line, reason })
            if policy == MalformedImports::Skip =>
        {
            warn!(line = %line, reason = %reason, "skipping malformed import line");
            Ok(false)
        }
        other => other,
    }
}

fn collect_imports(stmts: &[Stmt], set: &mut ImportSet, matched: &mut bool) {
    for stmt in stmts {
        match stmt {
            Stmt::Import(import) => {
                *matched = true;
                for alias in &import.names {
                    set.insert(render_alias("import ", alias));
                }
            }
            Stmt::ImportFrom(import) => {
                *matched = true;
                let dots = ".".repeat(import.level.as_ref().map_or(0, |l| l.to_u32() as usize));
                let module = import.module.as_ref().map_or("", |m| m.as_str());
                let prefix = format!("from {dots}{module} import ");
                for alias in &import.names {
                    set.insert(render_alias(&prefix, alias));
                }
            }
            Stmt::FunctionDef(s) => collect_imports(&s.body, set, matched),
            Stmt::AsyncFunctionDef(s) => collect_imports(&s.body, set, matched),
            Stmt::ClassDef(s) => collect_imports(&s.body, set, matched),
            Stmt::If(s) => {
                collect_imports(&s.body, set, matched);
                collect_imports(&s.orelse, set, matched);
            }
            Stmt::Try(s) => {
                collect_imports(&s.body, set, matched);
                collect_handlers(&s.handlers, set, matched);
                collect_imports(&s.orelse, set, matched);
                collect_imports(&s.finalbody, set, matched);
            }
            Stmt::TryStar(s) => {
                collect_imports(&s.body, set, matched);
                collect_handlers(&s.handlers, set, matched);
                collect_imports(&s.orelse, set, matched);
                collect_imports(&s.finalbody, set, matched);
            }
            Stmt::With(s) => collect_imports(&s.body, set, matched),
            Stmt::AsyncWith(s) => collect_imports(&s.body, set, matched),
            Stmt::For(s) => {
                collect_imports(&s.body, set, matched);
                collect_imports(&s.orelse, set, matched);
            }
            Stmt::AsyncFor(s) => {
                collect_imports(&s.body, set, matched);
                collect_imports(&s.orelse, set, matched);
            }
            Stmt::While(s) => {
                collect_imports(&s.body, set, matched);
                collect_imports(&s.orelse, set, matched);
            }
            Stmt::Match(s) => {
                for case in &s.cases {
                    collect_imports(&case.body, set, matched);
                }
            }
            _ => {}
        }
    }
}

fn collect_handlers(handlers: &[ExceptHandler], set: &mut ImportSet, matched: &mut bool) {
    for handler in handlers {
        let ExceptHandler::ExceptHandler(h) = handler;
        collect_imports(&h.body, set, matched);
    }
}

fn render_alias(prefix: &str, alias: &Alias) -> String {
    match &alias.asname {
        Some(asname) => format!("{prefix}{} as {}", alias.name.as_str(), asname.as_str()),
        None => format!("{prefix}{}", alias.name.as_str()),
    }
}
