//! Autograd Error Types
//!
//! Errors raised while recording or differentiating the dynamic graph.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use thiserror::Error;

/// Boxed error returned by [`crate::Function`] implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for autograd operations.
pub type AutogradResult<T> = Result<T, AutogradError>;

/// Errors that can occur during forward recording or the backward pass.
#[derive(Error, Debug)]
pub enum AutogradError {
    /// A function's forward or backward failed.
    #[error("{function} failed: {source}")]
    Function {
        /// Name of the failing function.
        function: &'static str,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// A function returned the wrong number of gradients.
    #[error("{function} returned {actual} gradients for {expected} inputs")]
    GradientArity {
        /// Name of the function.
        function: &'static str,
        /// Number of inputs recorded.
        expected: usize,
        /// Number of gradients returned.
        actual: usize,
    },

    /// Model input did not have the expected form.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tensor operation failed.
    #[error(transparent)]
    Tensor(#[from] graftml_core::Error),
}

impl AutogradError {
    /// Wraps an error raised by `function`.
    pub fn function(function: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Function {
            function,
            source: source.into(),
        }
    }
}
