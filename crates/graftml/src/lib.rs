//! # Graftml - Compiled Graphs Inside a Define-by-Run Engine
//!
//! Graftml lets a dynamic model be compiled into a static dataflow graph and
//! then keep training inside the define-by-run autodiff engine it came
//! from. The compiled graph shows up in the host graph as one opaque,
//! differentiable node.
//!
//! ## Crates
//!
//! - **core**: devices, errors and nested `Structure` values
//! - **tensor**: dense `f32` tensors and kernels
//! - **autograd**: `Variable`, the `Function` protocol and reverse-mode backward
//! - **onnx**: the interchange document and its JSON/protobuf encodings
//! - **jit**: graph IR, tracer, gradient generation and interpreter
//! - **nn**: traceable models (`Linear`, `Mlp`, `Classifier`)
//! - **bridge**: compiled nodes and the `CompiledModel` wrapper
//!
//! # Quick Start
//!
//! ```ignore
//! use graftml::prelude::*;
//!
//! let model = CompiledModel::new(
//!     Classifier::new(Mlp::new(224, 100, 10)),
//!     CompileConfig::new().translator(Translator::Onnx),
//! );
//!
//! let inputs = [Structure::leaf(x), Structure::leaf(t)];
//! let outputs = model.forward(&inputs)?; // eager run, then compile
//! let outputs = model.forward(&inputs)?; // compiled run
//! let loss = outputs.children().unwrap()[0].as_leaf().unwrap().clone();
//! loss.backward()?;
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

// =============================================================================
// Re-exports
// =============================================================================

pub use graftml_autograd as autograd;
pub use graftml_bridge as bridge;
pub use graftml_core as core;
pub use graftml_jit as jit;
pub use graftml_nn as nn;
pub use graftml_onnx as onnx;
pub use graftml_tensor as tensor;

pub mod train;

pub use bridge::{compile, BridgeError, BridgeResult, CompileConfig, CompiledModel, Strategy, Translator};
pub use train::{synthetic_batch, Sgd};

// =============================================================================
// Prelude
// =============================================================================

/// Common imports.
pub mod prelude {
    pub use crate::autograd::{functions, Variable};
    pub use crate::bridge::prelude::*;
    pub use crate::core::{Device, Structure, Template};
    pub use crate::nn::prelude::*;
    pub use crate::tensor::Tensor;
    pub use crate::train::{synthetic_batch, Sgd};
}

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_prelude() {
        use crate::prelude::*;
        let x = Variable::new(Tensor::zeros(&[1, 4]), false);
        let model = Mlp::new(4, 3, 2);
        let y = Module::forward(&model, &x).unwrap();
        assert_eq!(y.data().shape(), &[1, 2]);
        assert_eq!(CompileConfig::new().strategy, Strategy::TwoPhase);
    }
}
