//! Linear Algebra Functions
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use graftml_tensor::ops::nn;
use graftml_tensor::Tensor;

use super::saved;
use crate::error::BoxError;
use crate::grad_fn::Function;

/// `y = x Wᵀ + b` over inputs `[x, W]` or `[x, W, b]`.
///
/// dx = gy W, dW = gyᵀ x, db = Σ_rows gy
#[derive(Debug, Default)]
pub struct LinearFunction {
    input: Option<Tensor>,
    weight: Option<Tensor>,
    has_bias: bool,
}

impl Function for LinearFunction {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        let (x, w) = (&inputs[0], &inputs[1]);
        let bias = inputs.get(2);
        let y = nn::linear(x, w, bias)?;
        self.input = Some(x.clone());
        self.weight = Some(w.clone());
        self.has_bias = bias.is_some();
        Ok(vec![y])
    }

    fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        let arity = if self.has_bias { 3 } else { 2 };
        let Some(gy) = &grads[0] else {
            return Ok(vec![None; arity]);
        };
        let x = saved(&self.input, "input")?;
        let w = saved(&self.weight, "weight")?;
        let mut out = vec![
            Some(nn::linear_grad_input(gy, w)?),
            Some(nn::linear_grad_weight(gy, x)?),
        ];
        if self.has_bias {
            out.push(Some(nn::linear_grad_bias(gy)?));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::functions;
    use crate::Variable;
    use graftml_tensor::Tensor;

    #[test]
    fn test_linear_backward() {
        let x = Variable::new(Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap(), true);
        let w = Variable::new(Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[3, 2]).unwrap(), true);
        let b = Variable::new(Tensor::zeros(&[3]), true);
        let y = functions::linear(&x, &w, Some(&b)).unwrap();
        assert_eq!(y.shape(), vec![2, 3]);
        functions::sum(&y).unwrap().backward().unwrap();
        assert_eq!(b.grad().unwrap().to_vec(), vec![2.0, 2.0, 2.0]);
        assert_eq!(w.grad().unwrap().to_vec(), vec![4.0, 6.0, 4.0, 6.0, 4.0, 6.0]);
        assert_eq!(x.grad().unwrap().to_vec(), vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_linear_without_bias() {
        let x = Variable::constant(Tensor::ones(&[1, 2]));
        let w = Variable::new(Tensor::ones(&[1, 2]), true);
        let y = functions::linear(&x, &w, None).unwrap();
        y.backward().unwrap();
        assert_eq!(w.grad().unwrap().to_vec(), vec![1.0, 1.0]);
    }
}
