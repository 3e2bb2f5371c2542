//! Training Utilities
//!
//! Plain SGD and synthetic classification batches, enough to drive a model
//! (compiled or not) through a few optimization steps.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_autograd::Variable;
use graftml_core::Result;
use graftml_tensor::Tensor;
use rand::Rng;

// =============================================================================
// SGD
// =============================================================================

/// Stochastic gradient descent without momentum.
#[derive(Debug, Clone)]
pub struct Sgd {
    params: Vec<Variable>,
    lr: f32,
}

impl Sgd {
    /// Creates an optimizer over `params`.
    pub fn new(params: Vec<Variable>, lr: f32) -> Self {
        Self { params, lr }
    }

    /// Returns the learning rate.
    pub fn lr(&self) -> f32 {
        self.lr
    }

    /// Updates every parameter that has a gradient, in place.
    ///
    /// Parameter objects are kept, so compiled models that cached them see
    /// the new values on their next call.
    pub fn step(&self) -> Result<()> {
        for param in &self.params {
            if let Some(grad) = param.grad() {
                param.set_data(param.data().sub(&grad.scale(self.lr))?);
            }
        }
        Ok(())
    }

    /// Clears all gradients.
    pub fn zero_grad(&self) {
        for param in &self.params {
            param.zero_grad();
        }
    }
}

// =============================================================================
// Synthetic Data
// =============================================================================

/// Uniform features in `[-1, 1)` and integer labels below `classes`, stored
/// as `f32`.
pub fn synthetic_batch<R: Rng + ?Sized>(
    rng: &mut R,
    batch: usize,
    features: usize,
    classes: usize,
) -> (Tensor, Tensor) {
    let x = Tensor::uniform(rng, &[batch, features], -1.0, 1.0);
    let labels = (0..batch).map(|_| rng.gen_range(0..classes) as f32).collect();
    let t = Tensor::from_vec(labels, &[batch]).unwrap_or_else(|_| Tensor::zeros(&[batch]));
    (x, t)
}
