//! Basic Functions - Arithmetic Operations
//!
//! add, mul, scale and full reduction.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use graftml_tensor::Tensor;

use super::saved;
use crate::error::BoxError;
use crate::grad_fn::Function;

// =============================================================================
// Add
// =============================================================================

/// d/da(a + b) = 1, d/db(a + b) = 1
#[derive(Debug, Default, Clone, Copy)]
pub struct AddFunction;

impl Function for AddFunction {
    fn name(&self) -> &'static str {
        "Add"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        Ok(vec![inputs[0].add(&inputs[1])?])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        Ok(vec![grads[0].clone(), grads[0].clone()])
    }
}

// =============================================================================
// Mul
// =============================================================================

/// d/da(a * b) = b, d/db(a * b) = a
#[derive(Debug, Default)]
pub struct MulFunction {
    lhs: Option<Tensor>,
    rhs: Option<Tensor>,
}

impl Function for MulFunction {
    fn name(&self) -> &'static str {
        "Mul"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        let out = inputs[0].mul(&inputs[1])?;
        self.lhs = Some(inputs[0].clone());
        self.rhs = Some(inputs[1].clone());
        Ok(vec![out])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        let Some(gy) = &grads[0] else {
            return Ok(vec![None, None]);
        };
        let lhs = saved(&self.lhs, "lhs")?;
        let rhs = saved(&self.rhs, "rhs")?;
        Ok(vec![Some(gy.mul(rhs)?), Some(gy.mul(lhs)?)])
    }
}

// =============================================================================
// Scale
// =============================================================================

/// d/dx(alpha * x) = alpha
#[derive(Debug, Clone, Copy)]
pub struct ScaleFunction {
    factor: f32,
}

impl ScaleFunction {
    /// Creates a scale by `factor`.
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }
}

impl Function for ScaleFunction {
    fn name(&self) -> &'static str {
        "Scale"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        Ok(vec![inputs[0].scale(self.factor)])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        Ok(vec![grads[0].as_ref().map(|g| g.scale(self.factor))])
    }
}

// =============================================================================
// Sum
// =============================================================================

/// Gradient of a full reduction broadcasts the incoming scalar.
#[derive(Debug, Default)]
pub struct SumFunction {
    input: Option<Tensor>,
}

impl Function for SumFunction {
    fn name(&self) -> &'static str {
        "Sum"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        self.input = Some(inputs[0].clone());
        Ok(vec![inputs[0].sum_all()])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        let Some(gy) = &grads[0] else {
            return Ok(vec![None]);
        };
        let input = saved(&self.input, "input")?;
        Ok(vec![Some(Tensor::ones_like(input).scale(gy.item()?))])
    }
}

// =============================================================================
// Tests
// =============================================================================
