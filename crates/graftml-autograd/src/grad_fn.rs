//! Gradient Functions - Differentiable Operation Interface
//!
//! Defines the protocol every node of the dynamic graph implements. A
//! [`Function`] maps a flat list of input tensors to a flat list of output
//! tensors, and later maps one optional gradient per output to one optional
//! gradient per input. `None` means "no gradient flows here" and is never
//! replaced by zeros by the engine.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use graftml_tensor::Tensor;
use parking_lot::{Mutex, RwLock};

use crate::error::{AutogradError, AutogradResult, BoxError};
use crate::variable::Variable;

// =============================================================================
// Function Trait
// =============================================================================

/// A differentiable operation with any number of inputs and outputs.
///
/// `forward` runs once when the function is applied. `backward` is called at
/// most once per recorded node by the engine, after every node that consumes
/// this node's outputs has been processed.
pub trait Function: Send {
    /// Returns the name of this function for debugging and errors.
    fn name(&self) -> &'static str;

    /// Computes the outputs from the inputs.
    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError>;

    /// Computes one optional gradient per input from one optional gradient
    /// per output.
    fn backward(&mut self, grad_outputs: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError>;
}

// =============================================================================
// Graph Nodes
// =============================================================================

/// Shared gradient accumulator for leaf variables.
pub type GradAccumulator = Arc<RwLock<Option<Tensor>>>;

/// Adds `grad` into a leaf accumulator.
pub(crate) fn accumulate(acc: &GradAccumulator, grad: &Tensor) -> AutogradResult<()> {
    let mut guard = acc.write();
    let next = match guard.as_ref() {
        Some(existing) => existing.add(grad)?,
        None => grad.clone(),
    };
    *guard = Some(next);
    Ok(())
}

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

/// Where the gradient for one function input goes.
#[derive(Clone)]
pub enum Edge {
    /// Input does not require a gradient.
    Detached,
    /// Input is a leaf; gradients accumulate here.
    Leaf(GradAccumulator),
    /// Input was produced by another node.
    Node {
        /// The producing node.
        node: Arc<GradNode>,
        /// Which output of the producing node.
        output: usize,
    },
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Detached => write!(f, "Detached"),
            Self::Leaf(_) => write!(f, "Leaf"),
            Self::Node { node, output } => write!(f, "Node({}#{}:{output})", node.name(), node.id()),
        }
    }
}

/// A recorded application of a [`Function`].
///
/// Node ids increase with creation order, so every node's inputs were
/// produced by nodes with smaller ids.
pub struct GradNode {
    id: usize,
    name: &'static str,
    function: Mutex<Box<dyn Function>>,
    edges: Vec<Edge>,
    num_outputs: usize,
}

impl GradNode {
    fn new(function: Box<dyn Function>, edges: Vec<Edge>, num_outputs: usize) -> Self {
        Self {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            name: function.name(),
            function: Mutex::new(function),
            edges,
            num_outputs,
        }
    }

    /// Creation-ordered id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Name of the wrapped function.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// One edge per function input.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of function outputs.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Runs the function's backward and checks the gradient count.
    pub(crate) fn run_backward(&self, grads: &[Option<Tensor>]) -> AutogradResult<Vec<Option<Tensor>>> {
        let input_grads = self
            .function
            .lock()
            .backward(grads)
            .map_err(|source| AutogradError::Function {
                function: self.name,
                source,
            })?;
        if input_grads.len() != self.edges.len() {
            return Err(AutogradError::GradientArity {
                function: self.name,
                expected: self.edges.len(),
                actual: input_grads.len(),
            });
        }
        Ok(input_grads)
    }
}

impl fmt::Debug for GradNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("edges", &self.edges)
            .field("num_outputs", &self.num_outputs)
            .finish()
    }
}

// =============================================================================
// Apply
// =============================================================================

/// Runs `function` on the inputs' data and records it in the graph.
///
/// A node is recorded only when at least one input requires a gradient;
/// otherwise the outputs are plain constants.
pub fn apply<F: Function + 'static>(mut function: F, inputs: &[Variable]) -> AutogradResult<Vec<Variable>> {
    let name = function.name();
    let tensors: Vec<Tensor> = inputs.iter().map(Variable::data).collect();
    let outputs = function
        .forward(&tensors)
        .map_err(|source| AutogradError::Function { function: name, source })?;

    if !inputs.iter().any(Variable::requires_grad) {
        return Ok(outputs.into_iter().map(Variable::constant).collect());
    }

    let edges = inputs.iter().map(Variable::edge).collect();
    let node = Arc::new(GradNode::new(Box::new(function), edges, outputs.len()));
    tracing::trace!(function = name, id = node.id(), inputs = inputs.len(), outputs = outputs.len(), "recorded node");

    Ok(outputs
        .into_iter()
        .enumerate()
        .map(|(output, tensor)| Variable::from_node(tensor, Arc::clone(&node), output))
        .collect())
}

// =============================================================================
// Tests
// =============================================================================
