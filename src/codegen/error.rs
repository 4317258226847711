//! Code generation error types.
//!
//! Per-instruction problems are recorded as [`Diagnostic`]s and do not stop
//! the pass. The errors here are the ones surfaced at the driver and
//! registry boundaries.

use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// An error returned by backend registration or a compilation run.
#[derive(Debug, Error, Clone)]
pub enum CodeGenError {
    /// The run logged compile-time logic errors; no files were released.
    #[error("code generation failed with {errors} error(s)")]
    Failed {
        errors: usize,
        diagnostics: Vec<Diagnostic>,
    },

    /// No backend is registered under this name.
    #[error("Target Language Not Found: {name}")]
    UnknownBackend { name: String },

    /// A backend with this name is already registered.
    #[error("backend `{name}` is already registered")]
    DuplicateBackend { name: String },

    /// Backend configuration rejected at registration.
    #[error("invalid configuration for backend `{backend}`: {reason}")]
    InvalidConfig { backend: String, reason: String },
}

impl CodeGenError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Diagnostics attached to a failed run.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Failed { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodeGenError::UnknownBackend {
            name: "cobol".to_string(),
        };
        assert_eq!(err.to_string(), "Target Language Not Found: cobol");
    }

    #[test]
    fn test_invalid_config() {
        let err = CodeGenError::invalid_config("haxe", "limit must be positive");
        assert!(err.to_string().contains("haxe"));
        assert!(err.to_string().contains("limit must be positive"));
        assert!(err.diagnostics().is_empty());
    }
}
