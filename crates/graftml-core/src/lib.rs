//! Graftml Core - Foundation Layer for the Graftml Bridge
//!
//! This crate provides the abstractions shared by every other graftml crate:
//! device placement tags, the unified error type, and the nested
//! `Structure<T>` container used to carry arbitrarily nested model inputs and
//! outputs across the compiled-graph boundary.
//!
//! # Key Features
//! - Device placement tags (CPU, CUDA ordinal)
//! - Unified error type for tensor-level operations
//! - Tagged nested structures (`Leaf` / `Branch`) with templates
//!
//! # Example
//! ```rust
//! use graftml_core::{Device, Structure};
//!
//! let value = Structure::branch(vec![Structure::leaf(1), Structure::leaf(2)]);
//! assert_eq!(value.num_leaves(), 2);
//! assert_eq!(Device::default(), Device::Cpu);
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

// =============================================================================
// Modules
// =============================================================================

pub mod device;
pub mod error;
pub mod structure;

// =============================================================================
// Re-exports
// =============================================================================

pub use device::Device;
pub use error::{Error, Result};
pub use structure::{Structure, Template};

// =============================================================================
// Prelude
// =============================================================================

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::device::Device;
    pub use crate::error::{Error, Result};
    pub use crate::structure::{Structure, Template};
}
