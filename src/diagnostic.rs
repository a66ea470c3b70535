//! Accumulated, non-aborting problems found during a run.
//!
//! Stages push [`Diagnostic`]s instead of failing; the driver decides at the
//! end whether the run is fatal (any `Fatal` entry, or any entry at all in
//! strict mode) and prints the summary.

use crate::log;
use crate::error::{FieldError, GraphError, RecordError, RenderError};
use colored::Colorize;
use rustc_hash::FxHashSet;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// What kind of problem a diagnostic describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Record,
    Field,
    AmbiguousReference,
    UnresolvedReference,
    Graph,
    Render,
}

impl DiagnosticKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Record => "RecordError",
            Self::Field => "FieldError",
            Self::AmbiguousReference => "AmbiguousReference",
            Self::UnresolvedReference => "UnresolvedReference",
            Self::Graph => "GraphError",
            Self::Render => "RenderError",
        }
    }
}

/// How bad a diagnostic is.
///
/// `Fatal` always fails the run. `Error` and `Warning` only fail it in
/// strict mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub source: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            source: None,
            message: message.into(),
        }
    }

    pub fn ambiguous(token: &str, candidates: &[String]) -> Self {
        Self::new(
            DiagnosticKind::AmbiguousReference,
            Severity::Warning,
            format!(
                "`{token}` is ambiguous between {}; use a table-qualified reference",
                candidates.join(", ")
            ),
        )
    }

    pub fn unresolved(token: &str) -> Self {
        Self::new(
            DiagnosticKind::UnresolvedReference,
            Severity::Warning,
            format!("`{token}` does not match any record or bibliography entry"),
        )
    }

    pub fn field(err: &FieldError) -> Self {
        Self::new(DiagnosticKind::Field, Severity::Error, err.to_string())
    }

    /// Duplicate ids abort before indexing; every other record error is
    /// fatal at the end of the run.
    pub fn record(err: &RecordError) -> Self {
        Self::new(DiagnosticKind::Record, Severity::Fatal, error_chain(err))
            .with_source(err.path())
    }

    pub fn graph(table: &str, err: &GraphError) -> Self {
        Self::new(
            DiagnosticKind::Graph,
            Severity::Warning,
            format!("graph page for `{table}` skipped: {}", error_chain(err)),
        )
    }

    pub fn render(table: &str, err: &RenderError) -> Self {
        Self::new(
            DiagnosticKind::Render,
            Severity::Warning,
            format!("render hook for `{table}` failed, using fallback renderer: {}", error_chain(err)),
        )
    }

    pub fn with_source(mut self, path: impl AsRef<Path>) -> Self {
        self.source = Some(path.as_ref().to_path_buf());
        self
    }

    /// Attach a source only if none is set yet.
    pub fn or_source(mut self, path: &Path) -> Self {
        if self.source.is_none() {
            self.source = Some(path.to_path_buf());
        }
        self
    }

    pub fn is_fatal(&self, strict: bool) -> bool {
        self.severity == Severity::Fatal || strict
    }
}

/// Render an error and its `source()` chain on one line.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}: {}", self.kind.as_str(), source.display(), self.message),
            None => write!(f, "{}: {}", self.kind.as_str(), self.message),
        }
    }
}

/// Ordered, de-duplicated collection of diagnostics for one run.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
    seen: FxHashSet<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic. An identical entry (same kind, source and message)
    /// is only reported once.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        if self.seen.insert(diagnostic.clone()) {
            self.items.push(diagnostic);
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_fatal(&self, strict: bool) -> bool {
        self.items.iter().any(|d| d.is_fatal(strict))
    }

    /// Print every diagnostic followed by a one-line tally.
    pub fn print_summary(&self, strict: bool) {
        if self.items.is_empty() {
            log!("summary"; "no diagnostics");
            return;
        }

        for diagnostic in &self.items {
            let label = match (diagnostic.is_fatal(strict), diagnostic.severity) {
                (true, _) => "error",
                (false, Severity::Error) => "error",
                (false, _) => "warn",
            };
            log!(label; "{diagnostic}");
        }

        let fatal = self.items.iter().filter(|d| d.is_fatal(strict)).count();
        let tally = format!(
            "{} diagnostic(s), {} fatal{}",
            self.items.len(),
            fatal,
            if strict { " (strict)" } else { "" }
        );
        if fatal > 0 {
            log!("summary"; "{}", tally.bright_red());
        } else {
            log!("summary"; "{}", tally.bright_yellow());
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
