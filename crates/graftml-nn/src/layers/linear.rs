//! Linear Layer - Fully Connected Layer
//!
//! Applies a linear transformation: y = xW^T + b
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_autograd::functions;
use graftml_autograd::{AutogradResult, Variable};
use graftml_jit::{Symbol, Tracer};
use graftml_tensor::Tensor;
use rand::Rng;

use crate::init::{kaiming_uniform, zeros};
use crate::module::Module;

// =============================================================================
// Linear
// =============================================================================

/// Applies a linear transformation to the input.
///
/// # Shape
/// - Input: (batch, in_features)
/// - Output: (batch, out_features)
///
/// Parameters are named `W` (out_features, in_features) and `b`
/// (out_features).
pub struct Linear {
    /// Weight matrix of shape (out_features, in_features).
    pub weight: Variable,
    /// Bias vector of shape (out_features).
    pub bias: Option<Variable>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear layer with bias.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_rng(in_features, out_features, true, &mut rand::thread_rng())
    }

    /// Creates a new Linear layer drawing initial weights from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        bias: bool,
        rng: &mut R,
    ) -> Self {
        let weight = Variable::new(kaiming_uniform(rng, out_features, in_features), true);
        let bias = bias.then(|| Variable::new(zeros(&[out_features]), true));
        Self {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    /// Creates a Linear layer from existing weight and bias tensors.
    pub fn from_weights(weight: Tensor, bias: Option<Tensor>) -> Self {
        let (out_features, in_features) = match weight.shape() {
            [out, inp] => (*out, *inp),
            _ => (weight.numel(), 1),
        };
        Self {
            weight: Variable::new(weight, true),
            bias: bias.map(|b| Variable::new(b, true)),
            in_features,
            out_features,
        }
    }

    /// Returns the input feature dimension.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output feature dimension.
    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    fn forward(&self, input: &Variable) -> AutogradResult<Variable> {
        functions::linear(input, &self.weight, self.bias.as_ref())
    }

    fn trace(&self, tracer: &mut Tracer, prefix: &str, input: &Symbol) -> Symbol {
        let weight = tracer.param(&format!("{prefix}/W"), &self.weight.data());
        let bias = self
            .bias
            .as_ref()
            .map(|b| tracer.param(&format!("{prefix}/b"), &b.data()));
        tracer.gemm(input, &weight, bias.as_ref())
    }

    fn named_parameters(&self, prefix: &str) -> Vec<(String, Variable)> {
        let mut params = vec![(format!("{prefix}/W"), self.weight.clone())];
        if let Some(bias) = &self.bias {
            params.push((format!("{prefix}/b"), bias.clone()));
        }
        params
    }
}

// =============================================================================
// Tests
// =============================================================================
