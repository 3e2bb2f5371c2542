//! Graftml Bridge - Compiled Graphs as Autodiff Nodes
//!
//! Runs a statically compiled graph as one opaque, differentiable node of
//! the define-by-run engine. The bridge translates a dynamic model into an
//! interchange document, loads and compiles it, and from then on routes
//! every call of the model through the compiled executables.
//!
//! - Flattening of nested tensor values against structure templates
//! - Name-based binding between positional node arguments and graph I/O
//! - Two-phase nodes (separate forward and backward executables)
//! - One-phase nodes (fused forward and gradients)
//! - A model wrapper that compiles on first call
//!
//! # Example
//!
//! ```ignore
//! use graftml_bridge::{CompileConfig, CompiledModel, Strategy};
//!
//! let model = CompiledModel::new(classifier, CompileConfig::new().strategy(Strategy::TwoPhase));
//! let eager = model.forward(&[x.clone(), t.clone()])?;   // runs the model, then compiles
//! let outputs = model.forward(&[x, t])?;                  // runs the compiled graphs
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod codec;
pub mod compiled;
pub mod config;
pub mod error;
pub mod node;
pub mod translate;

pub use binding::{grad_name, NamedIoTable, GRAD_OUT_PREFIX};
pub use codec::{flatten, flatten_against, unflatten, unflatten_exact};
pub use compiled::{compile, CompiledModel, DUMP_TARGET};
pub use config::{CompileConfig, Strategy};
pub use error::{BridgeError, BridgeResult};
pub use node::{NodeCall, OnePhaseNode, OutputLayout, TwoPhaseNode};
pub use translate::Translator;

/// Common imports for compiling models.
pub mod prelude {
    pub use crate::compiled::{compile, CompiledModel};
    pub use crate::config::{CompileConfig, Strategy};
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::translate::Translator;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_config() {
        use crate::prelude::*;
        let config = CompileConfig::new().strategy(Strategy::OnePhase);
        assert_eq!(config.translator, Translator::Trace);
    }
}
