//! Activation Functions
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use graftml_tensor::Tensor;

use super::saved;
use crate::error::BoxError;
use crate::grad_fn::Function;

/// ReLU; the gradient passes where the input was positive.
#[derive(Debug, Default)]
pub struct ReluFunction {
    input: Option<Tensor>,
}

impl Function for ReluFunction {
    fn name(&self) -> &'static str {
        "Relu"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        self.input = Some(inputs[0].clone());
        Ok(vec![inputs[0].relu()])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        let Some(gy) = &grads[0] else {
            return Ok(vec![None]);
        };
        Ok(vec![Some(saved(&self.input, "input")?.relu_backward(gy)?)])
    }
}

#[cfg(test)]
mod tests {
    use crate::functions;
    use crate::Variable;
    use graftml_tensor::Tensor;

    #[test]
    fn test_relu_backward() {
        let x = Variable::new(Tensor::from_vec(vec![-1.0, 2.0, 0.5], &[3]).unwrap(), true);
        let y = functions::sum(&functions::relu(&x).unwrap()).unwrap();
        y.backward().unwrap();
        assert_eq!(x.grad().unwrap().to_vec(), vec![0.0, 1.0, 1.0]);
    }
}
