//! Differentiable Functions
//!
//! Built-in [`Function`](crate::Function) implementations and the
//! variable-level helpers that apply them.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

pub mod activation;
pub mod basic;
pub mod linalg;
pub mod loss;

use graftml_tensor::Tensor;

use crate::error::{AutogradError, AutogradResult, BoxError};
use crate::grad_fn::apply;
use crate::variable::Variable;

pub use activation::ReluFunction;
pub use basic::{AddFunction, MulFunction, ScaleFunction, SumFunction};
pub use linalg::LinearFunction;
pub use loss::SoftmaxCrossEntropyFunction;

fn single(function: &'static str, mut outputs: Vec<Variable>) -> AutogradResult<Variable> {
    if outputs.len() == 1 {
        Ok(outputs.remove(0))
    } else {
        Err(AutogradError::function(
            function,
            format!("expected one output, got {}", outputs.len()),
        ))
    }
}

/// Takes the saved tensor a forward pass stored, or fails if backward runs first.
pub(crate) fn saved<'a>(slot: &'a Option<Tensor>, what: &str) -> Result<&'a Tensor, BoxError> {
    slot.as_ref()
        .ok_or_else(|| format!("{what} was not saved by forward").into())
}

// =============================================================================
// Variable-Level Helpers
// =============================================================================

/// `x Wᵀ + b`.
pub fn linear(x: &Variable, weight: &Variable, bias: Option<&Variable>) -> AutogradResult<Variable> {
    let mut inputs = vec![x.clone(), weight.clone()];
    inputs.extend(bias.cloned());
    single("Linear", apply(LinearFunction::default(), &inputs)?)
}

/// Rectified linear unit.
pub fn relu(x: &Variable) -> AutogradResult<Variable> {
    single("Relu", apply(ReluFunction::default(), &[x.clone()])?)
}

/// Element-wise sum.
pub fn add(a: &Variable, b: &Variable) -> AutogradResult<Variable> {
    single("Add", apply(AddFunction, &[a.clone(), b.clone()])?)
}

/// Element-wise product.
pub fn mul(a: &Variable, b: &Variable) -> AutogradResult<Variable> {
    single("Mul", apply(MulFunction::default(), &[a.clone(), b.clone()])?)
}

/// Multiplication by a constant.
pub fn scale(x: &Variable, factor: f32) -> AutogradResult<Variable> {
    single("Scale", apply(ScaleFunction::new(factor), &[x.clone()])?)
}

/// Sum of all elements.
pub fn sum(x: &Variable) -> AutogradResult<Variable> {
    single("Sum", apply(SumFunction::default(), &[x.clone()])?)
}

/// Mean softmax cross entropy of `logits` against class-index `labels`.
pub fn softmax_cross_entropy(logits: &Variable, labels: &Variable) -> AutogradResult<Variable> {
    single(
        "SoftmaxCrossEntropy",
        apply(SoftmaxCrossEntropyFunction::default(), &[logits.clone(), labels.clone()])?,
    )
}

/// Classification accuracy. Not differentiable; the result is a constant.
pub fn accuracy(logits: &Variable, labels: &Variable) -> AutogradResult<Variable> {
    let value = graftml_tensor::ops::nn::accuracy(&logits.data(), &labels.data())?;
    Ok(Variable::constant(value))
}
