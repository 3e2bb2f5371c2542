//! Bridge Error Types
//!
//! Every failure carries the names, lengths or devices involved so a
//! contract violation between the compiled graph and the host can be
//! diagnosed from the message alone.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_autograd::AutogradError;
use graftml_core::Device;
use graftml_jit::JitError;
use graftml_onnx::OnnxError;
use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while compiling or running a compiled model.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A value's nesting disagrees with its template.
    #[error("Shape mismatch at {path}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Where in the value the mismatch was found.
        path: String,
        /// Outline of the template.
        expected: String,
        /// Outline of the value.
        actual: String,
    },

    /// Tensors of one call live on different devices.
    #[error("Device mismatch: {name} is on {actual}, expected {expected}")]
    DeviceMismatch {
        /// The offending value.
        name: String,
        /// Device of the first value of the call.
        expected: Device,
        /// Device of the offending value.
        actual: Device,
    },

    /// Unknown translator name.
    #[error("Unsupported translator: {name} (expected one of: trace, onnx)")]
    UnsupportedTranslator {
        /// Requested name.
        name: String,
    },

    /// A name list and a value list have different lengths.
    #[error("Arity mismatch for {what}: {expected} names but {actual} values")]
    ArityMismatch {
        /// Which list.
        what: &'static str,
        /// Number of names.
        expected: usize,
        /// Number of values.
        actual: usize,
    },

    /// The compiled graph needs a parameter the model does not have.
    #[error("Parameter {name} required by the compiled graph is not a model parameter")]
    MissingParameter {
        /// Graph parameter name.
        name: String,
    },

    /// The executable did not return a declared output.
    #[error("Compiled graph did not produce output {name}")]
    MissingOutput {
        /// Output name.
        name: String,
    },

    /// Backward ran twice on one node.
    #[error("{node} node was already consumed by a backward pass")]
    NodeConsumed {
        /// Node kind.
        node: &'static str,
    },

    /// Internal bookkeeping disagreed with itself.
    #[error("Internal inconsistency: {0}")]
    Inconsistent(String),

    /// Graph loading, transformation or execution failed.
    #[error(transparent)]
    Jit(#[from] JitError),

    /// Host autodiff engine failure.
    #[error(transparent)]
    Autograd(AutogradError),

    /// Tensor operation failed.
    #[error(transparent)]
    Tensor(#[from] graftml_core::Error),

    /// Temporary artifact could not be written or removed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AutogradError> for BridgeError {
    /// Recovers a bridge error raised inside a compiled node, so it keeps
    /// its kind after passing through the host engine.
    fn from(err: AutogradError) -> Self {
        match err {
            AutogradError::Function { function, source } => match source.downcast::<BridgeError>() {
                Ok(inner) => *inner,
                Err(source) => Self::Autograd(AutogradError::Function { function, source }),
            },
            other => Self::Autograd(other),
        }
    }
}

impl From<OnnxError> for BridgeError {
    fn from(err: OnnxError) -> Self {
        Self::Jit(JitError::from(err))
    }
}
