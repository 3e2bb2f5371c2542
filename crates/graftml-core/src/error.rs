//! Error Types - Graftml Core Error Handling
//!
//! Error type shared by tensor-level operations: shape and device
//! disagreements, bad indices and invalid arguments.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use thiserror::Error;

use crate::device::Device;

// =============================================================================
// Error Types
// =============================================================================

/// The main error type for tensor-level operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Shape mismatch between tensors.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// Device mismatch between tensors.
    #[error("Device mismatch: expected {expected}, got {actual}")]
    DeviceMismatch {
        /// The expected device.
        expected: Device,
        /// The actual device.
        actual: Device,
    },

    /// Tensor has the wrong number of dimensions for the operation.
    #[error("Invalid rank: {op} expects {expected} dimensions, got shape {shape:?}")]
    InvalidRank {
        /// The operation name.
        op: &'static str,
        /// Required number of dimensions.
        expected: usize,
        /// The offending shape.
        shape: Vec<usize>,
    },

    /// Index out of bounds.
    #[error("Index out of bounds: index {index} for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index.
        index: usize,
        /// The size of the dimension.
        size: usize,
    },

    /// Invalid operation for the given tensor.
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

// =============================================================================
// Result Type
// =============================================================================

/// Result type alias for tensor-level operations.
pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    /// Creates a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates an invalid operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::shape_mismatch(&[2, 3], &[3, 2]);
        assert!(err.to_string().contains("Shape mismatch"));
        assert!(err.to_string().contains("[2, 3]"));
    }

    #[test]
    fn test_device_mismatch_display() {
        let err = Error::DeviceMismatch {
            expected: Device::Cpu,
            actual: Device::Cuda(1),
        };
        assert_eq!(err.to_string(), "Device mismatch: expected cpu, got cuda:1");
    }
}
