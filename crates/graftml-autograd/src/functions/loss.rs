//! Loss Functions
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use graftml_tensor::ops::nn;
use graftml_tensor::Tensor;

use super::saved;
use crate::error::BoxError;
use crate::grad_fn::Function;

/// Mean softmax cross entropy over inputs `[logits, labels]`.
///
/// Labels are class indices and receive no gradient.
#[derive(Debug, Default)]
pub struct SoftmaxCrossEntropyFunction {
    logits: Option<Tensor>,
    labels: Option<Tensor>,
}

impl Function for SoftmaxCrossEntropyFunction {
    fn name(&self) -> &'static str {
        "SoftmaxCrossEntropy"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        let loss = nn::softmax_cross_entropy(&inputs[0], &inputs[1])?;
        self.logits = Some(inputs[0].clone());
        self.labels = Some(inputs[1].clone());
        Ok(vec![loss])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        let Some(gy) = &grads[0] else {
            return Ok(vec![None, None]);
        };
        let logits = saved(&self.logits, "logits")?;
        let labels = saved(&self.labels, "labels")?;
        Ok(vec![Some(nn::softmax_cross_entropy_grad(gy, logits, labels)?), None])
    }
}

#[cfg(test)]
mod tests {
    use crate::functions;
    use crate::Variable;
    use graftml_tensor::Tensor;

    #[test]
    fn test_softmax_cross_entropy_backward() {
        let logits = Variable::new(Tensor::zeros(&[2, 2]), true);
        let labels = Variable::constant(Tensor::from_vec(vec![0.0, 1.0], &[2]).unwrap());
        let loss = functions::softmax_cross_entropy(&logits, &labels).unwrap();
        assert!((loss.data().item().unwrap() - 2.0f32.ln()).abs() < 1e-6);
        loss.backward().unwrap();
        let g = logits.grad().unwrap().to_vec();
        assert!((g[0] + 0.25).abs() < 1e-6);
        assert!((g[1] - 0.25).abs() < 1e-6);
        assert!(labels.grad().is_none());
    }

    #[test]
    fn test_accuracy_is_constant() {
        let logits = Variable::new(Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], &[2, 2]).unwrap(), true);
        let labels = Variable::constant(Tensor::from_vec(vec![0.0, 0.0], &[2]).unwrap());
        let acc = functions::accuracy(&logits, &labels).unwrap();
        assert_eq!(acc.data().item().unwrap(), 0.5);
        assert!(!acc.requires_grad());
    }
}
