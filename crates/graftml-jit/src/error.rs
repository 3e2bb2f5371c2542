//! JIT Error Types
//!
//! Error handling for graph loading, transformation and execution.

use std::fmt;

use graftml_onnx::OnnxError;

/// Result type for JIT operations.
pub type JitResult<T> = Result<T, JitError>;

/// JIT compilation errors.
#[derive(Debug)]
pub enum JitError {
    /// Invalid graph structure.
    InvalidGraph(String),
    /// Value kind mismatch (tensor vs sequence).
    TypeMismatch {
        /// Expected kind.
        expected: String,
        /// Actual kind.
        found: String,
    },
    /// Operation cannot be executed or differentiated.
    UnsupportedOp(String),
    /// Runtime execution error.
    RuntimeError(String),
    /// Input not found.
    InputNotFound(String),
    /// Output not found.
    OutputNotFound(String),
    /// Tensor kernel failure.
    Tensor(graftml_core::Error),
    /// Interchange document could not be read.
    Interchange(OnnxError),
}

impl fmt::Display for JitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGraph(msg) => write!(f, "Invalid graph: {msg}"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {expected}, found {found}")
            }
            Self::UnsupportedOp(op) => write!(f, "Unsupported operation: {op}"),
            Self::RuntimeError(msg) => write!(f, "Runtime error: {msg}"),
            Self::InputNotFound(name) => write!(f, "Input not found: {name}"),
            Self::OutputNotFound(name) => write!(f, "Output not found: {name}"),
            Self::Tensor(err) => write!(f, "Kernel error: {err}"),
            Self::Interchange(err) => write!(f, "Interchange error: {err}"),
        }
    }
}

impl std::error::Error for JitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tensor(err) => Some(err),
            Self::Interchange(err) => Some(err),
            _ => None,
        }
    }
}

impl From<graftml_core::Error> for JitError {
    fn from(err: graftml_core::Error) -> Self {
        Self::Tensor(err)
    }
}

impl From<OnnxError> for JitError {
    fn from(err: OnnxError) -> Self {
        Self::Interchange(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JitError::TypeMismatch {
            expected: "sequence".to_string(),
            found: "tensor".to_string(),
        };
        assert!(err.to_string().contains("Type mismatch"));
    }

    #[test]
    fn test_kernel_error_has_source() {
        use std::error::Error as _;
        let err = JitError::from(graftml_core::Error::invalid_operation("bad"));
        assert!(err.to_string().starts_with("Kernel error"));
        assert!(err.source().is_some());
    }
}
