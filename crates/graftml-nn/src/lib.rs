//! graftml-nn - Dynamic Models
//!
//! Layers and models that run eagerly on the host autodiff engine and can
//! also be traced into a graph for compilation.
//!
//! # Key Components
//!
//! - **Module trait**: one tensor in, one tensor out
//! - **Model trait**: nested inputs and outputs, absolute parameter paths
//! - **Layers**: Linear
//! - **Models**: Mlp, Classifier
//!
//! # Example
//!
//! ```ignore
//! use graftml_nn::prelude::*;
//!
//! let model = Classifier::new(Mlp::new(784, 100, 10));
//! let outputs = model.forward(&[x, t])?;
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod classifier;
pub mod init;
pub mod layers;
pub mod mlp;
pub mod module;

pub use classifier::Classifier;
pub use layers::Linear;
pub use mlp::Mlp;
pub use module::{Model, Module};

/// Common imports for neural network development.
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::layers::Linear;
    pub use crate::mlp::Mlp;
    pub use crate::module::{Model, Module};
}
