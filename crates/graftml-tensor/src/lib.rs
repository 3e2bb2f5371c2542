//! Graftml Tensor - Dense Arrays for the Host and the Reference Runtime
//!
//! This crate provides the `Tensor` type exchanged between the host autodiff
//! engine and compiled graphs, plus the small kernel set both sides share.
//! Sharing the kernels keeps compiled and uncompiled execution numerically
//! aligned.
//!
//! # Key Features
//! - Row-major `f32` tensors with cheap clones (shared buffers)
//! - Device tag carried and validated by every operation
//! - Linear, activation and classification kernels with their gradients
//!
//! # Example
//! ```rust
//! use graftml_tensor::Tensor;
//!
//! let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
//! let b = Tensor::ones(&[2, 2]);
//! let c = a.add(&b).unwrap();
//! assert_eq!(c.to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

// =============================================================================
// Modules
// =============================================================================

pub mod ops;
pub mod tensor;

// =============================================================================
// Re-exports
// =============================================================================

pub use graftml_core::{Device, Error, Result};
pub use tensor::Tensor;

/// Creates a tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    Tensor::zeros(shape)
}

/// Creates a tensor filled with ones.
pub fn ones(shape: &[usize]) -> Tensor {
    Tensor::ones(shape)
}

/// Creates a tensor with values drawn uniformly from `[low, high)`.
pub fn uniform<R: rand::Rng + ?Sized>(rng: &mut R, shape: &[usize], low: f32, high: f32) -> Tensor {
    Tensor::uniform(rng, shape, low, high)
}
