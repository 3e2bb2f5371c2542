//! Variable - Tensor with Gradient Tracking
//!
//! A `Variable` wraps a tensor and remembers which recorded node produced
//! it. Leaf variables that require gradients own an accumulator that the
//! backward pass fills.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::fmt;
use std::sync::Arc;

use graftml_core::Device;
use graftml_tensor::Tensor;
use parking_lot::RwLock;

use crate::backward::backward;
use crate::error::AutogradResult;
use crate::grad_fn::{Edge, GradAccumulator, GradNode};

// =============================================================================
// Variable Struct
// =============================================================================

/// A tensor with automatic differentiation support.
///
/// Clones share the same data, gradient and history, so a parameter held by
/// a model and a clone handed to an operation are the same variable.
#[derive(Clone)]
pub struct Variable {
    /// The underlying tensor data.
    data: Arc<RwLock<Tensor>>,
    /// Gradient accumulator (filled for leaves).
    grad: GradAccumulator,
    /// Whether this variable requires gradient computation.
    requires_grad: bool,
    /// Producing node and output index, for non-leaf variables.
    creator: Option<(Arc<GradNode>, usize)>,
}

impl Variable {
    /// Creates a leaf variable.
    #[must_use]
    pub fn new(data: Tensor, requires_grad: bool) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            grad: Arc::new(RwLock::new(None)),
            requires_grad,
            creator: None,
        }
    }

    /// Creates a leaf variable that does not require gradients.
    #[must_use]
    pub fn constant(data: Tensor) -> Self {
        Self::new(data, false)
    }

    /// Creates the `output`-th result of a recorded node.
    pub(crate) fn from_node(data: Tensor, node: Arc<GradNode>, output: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            grad: Arc::new(RwLock::new(None)),
            requires_grad: true,
            creator: Some((node, output)),
        }
    }

    /// Returns the tensor data.
    #[must_use]
    pub fn data(&self) -> Tensor {
        self.data.read().clone()
    }

    /// Replaces the tensor data in place. History is not affected.
    pub fn set_data(&self, data: Tensor) {
        *self.data.write() = data;
    }

    /// Returns the shape of the tensor.
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.data.read().shape().to_vec()
    }

    /// Returns the device of the tensor.
    #[must_use]
    pub fn device(&self) -> Device {
        self.data.read().device()
    }

    /// Returns whether this variable requires gradients.
    #[must_use]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Returns whether this is a leaf variable (not produced by a node).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.creator.is_none()
    }

    /// Returns the accumulated gradient.
    #[must_use]
    pub fn grad(&self) -> Option<Tensor> {
        self.grad.read().clone()
    }

    /// Clears the accumulated gradient.
    pub fn zero_grad(&self) {
        *self.grad.write() = None;
    }

    /// Returns the node that produced this variable.
    #[must_use]
    pub fn creator(&self) -> Option<&Arc<GradNode>> {
        self.creator.as_ref().map(|(node, _)| node)
    }

    /// Returns true if both handles refer to the same variable.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Where a gradient for this variable must be sent.
    pub(crate) fn edge(&self) -> Edge {
        if !self.requires_grad {
            return Edge::Detached;
        }
        match &self.creator {
            Some((node, output)) => Edge::Node {
                node: Arc::clone(node),
                output: *output,
            },
            None => Edge::Leaf(Arc::clone(&self.grad)),
        }
    }

    /// Backpropagates from this variable with a seed of ones.
    pub fn backward(&self) -> AutogradResult<()> {
        backward(self, None)
    }

    /// Backpropagates from this variable with an explicit seed.
    pub fn backward_with(&self, seed: Tensor) -> AutogradResult<()> {
        backward(self, Some(seed))
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("shape", &self.shape())
            .field("device", &self.device())
            .field("requires_grad", &self.requires_grad)
            .field("creator", &self.creator().map(|n| n.name()))
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
