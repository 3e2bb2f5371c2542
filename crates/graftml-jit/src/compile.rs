//! Graph Compilation API
//!
//! The traits a compiled model is driven through: a [`GraphCompiler`]
//! loads an interchange document into a [`CompiledGraph`], which can be
//! split into forward and backward graphs and compiled into
//! [`Executable`]s.
//!
//! # Example
//! ```rust,ignore
//! use graftml_jit::{CompileOptions, Compiler, GraphCompiler};
//!
//! let graph = Compiler::new().load("model.onnx")?;
//! let mut wrt = graph.input_names();
//! wrt.extend(graph.param_names());
//! let (forward, backward) = graph.split_for_backward(&wrt)?;
//! let forward = forward.compile(&CompileOptions::new())?;
//! ```
//!
//! @version 0.1.0

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::JitResult;
use crate::exec::Program;
use crate::gradient::{split_for_backward, with_backprop};
use crate::ir::{Graph, Value};

// =============================================================================
// Options
// =============================================================================

/// Options for compiling a graph into an executable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Skip the validation and kind inference pass.
    pub skip_shape_inference: bool,
    /// Also compute gradients of every input and parameter, seeding each
    /// output with ones.
    pub enable_backprop: bool,
}

impl CompileOptions {
    /// Creates default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: skip validation.
    #[must_use]
    pub fn skip_shape_inference(mut self, skip: bool) -> Self {
        self.skip_shape_inference = skip;
        self
    }

    /// Builder: fuse gradient computation into the executable.
    #[must_use]
    pub fn enable_backprop(mut self, enable: bool) -> Self {
        self.enable_backprop = enable;
        self
    }
}

// =============================================================================
// Traits
// =============================================================================

/// A compiled executable mapping named inputs to named outputs.
pub trait Executable: Send + Sync {
    /// Runs the executable. Every declared input must be present.
    fn run(&self, inputs: &HashMap<String, Value>) -> JitResult<HashMap<String, Value>>;
}

/// A loaded graph ready for transformation and compilation.
pub trait CompiledGraph: Send + Sync {
    /// Data input names in order.
    fn input_names(&self) -> Vec<String>;

    /// Output names in order.
    fn output_names(&self) -> Vec<String>;

    /// Parameter names in order.
    fn param_names(&self) -> Vec<String>;

    /// Splits into a forward graph and a backward graph computing
    /// `grad_out@<name>` for the names in `wrt`.
    fn split_for_backward(
        &self,
        wrt: &[String],
    ) -> JitResult<(Box<dyn CompiledGraph>, Box<dyn CompiledGraph>)>;

    /// Compiles into an executable.
    fn compile(&self, options: &CompileOptions) -> JitResult<Arc<dyn Executable>>;

    /// Human-readable listing.
    fn dump(&self) -> String;
}

/// Loads interchange documents.
pub trait GraphCompiler {
    /// Loads the document at `path`.
    fn load(&self, path: &Path) -> JitResult<Box<dyn CompiledGraph>>;
}

// =============================================================================
// Implementations
// =============================================================================

impl CompiledGraph for Graph {
    fn input_names(&self) -> Vec<String> {
        Graph::input_names(self)
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs().to_vec()
    }

    fn param_names(&self) -> Vec<String> {
        Graph::param_names(self)
    }

    fn split_for_backward(
        &self,
        wrt: &[String],
    ) -> JitResult<(Box<dyn CompiledGraph>, Box<dyn CompiledGraph>)> {
        let (forward, backward) = split_for_backward(self, wrt)?;
        Ok((Box::new(forward), Box::new(backward)))
    }

    fn compile(&self, options: &CompileOptions) -> JitResult<Arc<dyn Executable>> {
        let graph = if options.enable_backprop {
            let mut wrt = Graph::input_names(self);
            wrt.extend(Graph::param_names(self));
            with_backprop(self, &wrt)?
        } else {
            self.clone()
        };
        if !options.skip_shape_inference {
            graph.validate()?;
        }
        debug!(
            graph = graph.name(),
            nodes = graph.len(),
            backprop = options.enable_backprop,
            "compiled graph"
        );
        Ok(Arc::new(Program::new(graph)))
    }

    fn dump(&self) -> String {
        Graph::dump(self)
    }
}

/// Loads interchange documents into interpreted graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler;

impl Compiler {
    /// Creates a compiler.
    pub fn new() -> Self {
        Self
    }
}

impl GraphCompiler for Compiler {
    fn load(&self, path: &Path) -> JitResult<Box<dyn CompiledGraph>> {
        let proto = graftml_onnx::import_model(path)?;
        let graph = Graph::from_proto(&proto)?;
        info!(
            path = %path.display(),
            graph = graph.name(),
            nodes = graph.len(),
            inputs = graph.input_names().len(),
            params = graph.param_names().len(),
            "loaded graph"
        );
        Ok(Box::new(graph))
    }
}

// =============================================================================
// Tests
// =============================================================================
