//! Multi-Layer Perceptron
//!
//! Three linear layers with ReLU between them.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_autograd::functions;
use graftml_autograd::{AutogradError, AutogradResult, Variable};
use graftml_core::Structure;
use graftml_jit::{JitError, JitResult, Symbol, Tracer};
use rand::Rng;

use crate::layers::Linear;
use crate::module::{leaf_inputs, Model, Module};

/// `l3(relu(l2(relu(l1(x)))))`.
pub struct Mlp {
    /// First layer.
    pub l1: Linear,
    /// Hidden layer.
    pub l2: Linear,
    /// Output layer.
    pub l3: Linear,
}

impl Mlp {
    /// Creates an MLP with `units` hidden units per layer.
    pub fn new(in_features: usize, units: usize, out_features: usize) -> Self {
        Self::with_rng(in_features, units, out_features, &mut rand::thread_rng())
    }

    /// Creates an MLP drawing initial weights from `rng`.
    pub fn with_rng<R: Rng + ?Sized>(
        in_features: usize,
        units: usize,
        out_features: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            l1: Linear::with_rng(in_features, units, true, rng),
            l2: Linear::with_rng(units, units, true, rng),
            l3: Linear::with_rng(units, out_features, true, rng),
        }
    }
}

impl Module for Mlp {
    fn forward(&self, input: &Variable) -> AutogradResult<Variable> {
        let h = functions::relu(&self.l1.forward(input)?)?;
        let h = functions::relu(&self.l2.forward(&h)?)?;
        self.l3.forward(&h)
    }

    fn trace(&self, tracer: &mut Tracer, prefix: &str, input: &Symbol) -> Symbol {
        let h = self.l1.trace(tracer, &format!("{prefix}/l1"), input);
        let h = tracer.relu(&h);
        let h = self.l2.trace(tracer, &format!("{prefix}/l2"), &h);
        let h = tracer.relu(&h);
        self.l3.trace(tracer, &format!("{prefix}/l3"), &h)
    }

    fn named_parameters(&self, prefix: &str) -> Vec<(String, Variable)> {
        let mut params = self.l1.named_parameters(&format!("{prefix}/l1"));
        params.extend(self.l2.named_parameters(&format!("{prefix}/l2")));
        params.extend(self.l3.named_parameters(&format!("{prefix}/l3")));
        params
    }
}

impl Model for Mlp {
    fn forward(&self, inputs: &[Structure<Variable>]) -> AutogradResult<Vec<Structure<Variable>>> {
        let x = leaf_inputs("Mlp", inputs, 1).map_err(AutogradError::InvalidInput)?;
        Ok(vec![Structure::leaf(Module::forward(self, x[0])?)])
    }

    fn trace(
        &self,
        tracer: &mut Tracer,
        inputs: &[Structure<Symbol>],
    ) -> JitResult<Vec<Structure<Symbol>>> {
        let x = leaf_inputs("Mlp", inputs, 1).map_err(JitError::InvalidGraph)?;
        Ok(vec![Structure::leaf(Module::trace(self, tracer, "", x[0]))])
    }

    fn named_parameters(&self) -> Vec<(String, Variable)> {
        Module::named_parameters(self, "")
    }
}
