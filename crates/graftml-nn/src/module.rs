//! Module Traits - Model Interfaces
//!
//! `Module` is a layer with one tensor input and one tensor output.
//! `Model` is a whole model with structured inputs and outputs. Both can
//! run eagerly on the host autodiff engine and be traced into a graph.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_autograd::{AutogradResult, Variable};
use graftml_core::Structure;
use graftml_jit::{JitResult, Symbol, Tracer};

// =============================================================================
// Module Trait
// =============================================================================

/// A layer mapping one tensor to one tensor.
pub trait Module: Send + Sync {
    /// Performs the forward pass.
    fn forward(&self, input: &Variable) -> AutogradResult<Variable>;

    /// Records the forward pass. Parameters are named below `prefix`.
    fn trace(&self, tracer: &mut Tracer, prefix: &str, input: &Symbol) -> Symbol;

    /// Returns parameters named by their path below `prefix`.
    fn named_parameters(&self, prefix: &str) -> Vec<(String, Variable)>;

    /// Returns all parameters.
    fn parameters(&self) -> Vec<Variable> {
        self.named_parameters("")
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }

    /// Returns the number of trainable scalars.
    fn num_parameters(&self) -> usize {
        self.parameters()
            .iter()
            .filter(|p| p.requires_grad())
            .map(|p| p.shape().iter().product::<usize>())
            .sum()
    }

    /// Zeros all gradients of parameters.
    fn zero_grad(&self) {
        for param in self.parameters() {
            param.zero_grad();
        }
    }
}

// =============================================================================
// Model Trait
// =============================================================================

/// A model with arbitrarily nested inputs and outputs.
pub trait Model: Send + Sync {
    /// Runs the model on the host autodiff engine.
    fn forward(&self, inputs: &[Structure<Variable>]) -> AutogradResult<Vec<Structure<Variable>>>;

    /// Records the model into `tracer`.
    fn trace(
        &self,
        tracer: &mut Tracer,
        inputs: &[Structure<Symbol>],
    ) -> JitResult<Vec<Structure<Symbol>>>;

    /// Returns parameters named by absolute `/`-separated paths.
    fn named_parameters(&self) -> Vec<(String, Variable)>;

    /// Zeros all gradients of parameters.
    fn zero_grad(&self) {
        for (_, param) in self.named_parameters() {
            param.zero_grad();
        }
    }
}

/// Checks that `inputs` are exactly `count` tensors and returns them.
pub(crate) fn leaf_inputs<'a, T>(
    model: &str,
    inputs: &'a [Structure<T>],
    count: usize,
) -> Result<Vec<&'a T>, String> {
    if inputs.len() != count {
        return Err(format!(
            "{model} expects {count} inputs, got {}",
            inputs.len()
        ));
    }
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            input
                .as_leaf()
                .ok_or_else(|| format!("{model} input {i} must be a tensor, got {input}"))
        })
        .collect()
}
