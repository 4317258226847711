//! Compile-time diagnostics.
//!
//! Problems found while lowering are not fatal on their own. A warning means
//! the backend emitted a best-effort fallback; an error means it emitted
//! sentinel text that will not compile in the target. Either way the pass
//! continues so that one run reports everything, and the driver refuses to
//! release output if any error was recorded.
//!
//! Every record is also forwarded to the `log` crate.

use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Rendered source position, `-` when unknown.
    pub position: String,
    /// Name of the backend that reported it.
    pub backend: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {}: {}",
            self.position, self.backend, self.severity, self.message
        )
    }
}

/// Accumulates diagnostics for one compilation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    backend: String,
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates a sink that tags every record with `backend`.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            records: Vec::new(),
        }
    }

    fn push(&mut self, severity: Severity, position: &dyn fmt::Display, message: String) {
        let diag = Diagnostic {
            severity,
            position: position.to_string(),
            backend: self.backend.clone(),
            message,
        };
        match severity {
            Severity::Warning => log::warn!("{}", diag),
            Severity::Error => log::error!("{}", diag),
        }
        self.records.push(diag);
    }

    pub fn warn(&mut self, position: &dyn fmt::Display, message: impl Into<String>) {
        self.push(Severity::Warning, position, message.into());
    }

    pub fn error(&mut self, position: &dyn fmt::Display, message: impl Into<String>) {
        self.push(Severity::Error, position, message.into());
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.records.iter().filter(|d| d.severity == severity).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.records
    }
}
