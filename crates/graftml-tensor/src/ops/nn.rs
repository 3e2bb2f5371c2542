//! Neural Network Kernels
//!
//! Linear layer, softmax cross entropy and accuracy, with the gradient
//! kernels the autodiff engine and the graph runtime both call.
//!
//! Labels are class indices stored as `f32`, one per batch row.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use graftml_core::{Error, Result};

use super::{add_row, matmul, sum_rows, transpose};
use crate::tensor::Tensor;

// =============================================================================
// Linear
// =============================================================================

/// `y = x Wᵀ + b` with `x` (n, in), `W` (out, in), `b` (out).
pub fn linear(x: &Tensor, weight: &Tensor, bias: Option<&Tensor>) -> Result<Tensor> {
    let y = matmul(x, &transpose(weight)?)?;
    match bias {
        Some(b) => add_row(&y, b),
        None => Ok(y),
    }
}

/// Gradient of [`linear`] with respect to `x`: `gy W`.
pub fn linear_grad_input(grad: &Tensor, weight: &Tensor) -> Result<Tensor> {
    matmul(grad, weight)
}

/// Gradient of [`linear`] with respect to `W`: `gyᵀ x`.
pub fn linear_grad_weight(grad: &Tensor, x: &Tensor) -> Result<Tensor> {
    matmul(&transpose(grad)?, x)
}

/// Gradient of [`linear`] with respect to `b`.
pub fn linear_grad_bias(grad: &Tensor) -> Result<Tensor> {
    sum_rows(grad)
}

// =============================================================================
// Classification
// =============================================================================

fn class_indices(logits: &Tensor, labels: &Tensor) -> Result<Vec<usize>> {
    logits.check_rank("softmax_cross_entropy", 2)?;
    labels.check_rank("softmax_cross_entropy", 1)?;
    logits.check_device(labels)?;
    let (rows, classes) = (logits.shape()[0], logits.shape()[1]);
    if labels.shape()[0] != rows {
        return Err(Error::shape_mismatch(&[rows], labels.shape()));
    }
    labels
        .as_slice()
        .iter()
        .map(|&label| {
            if label < 0.0 || label.fract() != 0.0 || label as usize >= classes {
                Err(Error::invalid_operation(format!(
                    "label {label} is not a class index below {classes}"
                )))
            } else {
                Ok(label as usize)
            }
        })
        .collect()
}

fn softmax_row(row: &[f32]) -> Vec<f32> {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = row.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Mean softmax cross entropy over the batch, as a zero-dimensional tensor.
pub fn softmax_cross_entropy(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let targets = class_indices(logits, labels)?;
    let classes = logits.shape()[1];
    let rows = targets.len();
    let mut total = 0.0f32;
    for (row, &target) in logits.as_slice().chunks(classes.max(1)).zip(&targets) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let log_sum: f32 = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln() + max;
        total += log_sum - row[target];
    }
    let mean = if rows == 0 { 0.0 } else { total / rows as f32 };
    Ok(Tensor::scalar(mean).to_device(logits.device()))
}

/// Gradient of [`softmax_cross_entropy`] with respect to the logits,
/// scaled by the incoming scalar gradient.
pub fn softmax_cross_entropy_grad(grad: &Tensor, logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let targets = class_indices(logits, labels)?;
    let scale = grad.item()?;
    let classes = logits.shape()[1];
    let rows = targets.len().max(1) as f32;
    let mut out = Vec::with_capacity(logits.numel());
    for (row, &target) in logits.as_slice().chunks(classes.max(1)).zip(&targets) {
        let probs = softmax_row(row);
        for (c, p) in probs.into_iter().enumerate() {
            let onehot = if c == target { 1.0 } else { 0.0 };
            out.push((p - onehot) * scale / rows);
        }
    }
    Tensor::from_vec(out, logits.shape()).map(|t| t.to_device(logits.device()))
}

/// Fraction of rows whose arg-max matches the label.
pub fn accuracy(logits: &Tensor, labels: &Tensor) -> Result<Tensor> {
    let targets = class_indices(logits, labels)?;
    let classes = logits.shape()[1];
    let hits = logits
        .as_slice()
        .chunks(classes.max(1))
        .zip(&targets)
        .filter(|(row, &target)| {
            let best = row
                .iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
                    if v > bv {
                        (i, v)
                    } else {
                        (bi, bv)
                    }
                })
                .0;
            best == target
        })
        .count();
    let value = if targets.is_empty() {
        0.0
    } else {
        hits as f32 / targets.len() as f32
    };
    Ok(Tensor::scalar(value).to_device(logits.device()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear() {
        let x = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        let w = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0], &[3, 2]).unwrap();
        let b = Tensor::from_vec(vec![0.5, 0.5, 0.5], &[3]).unwrap();
        let y = linear(&x, &w, Some(&b)).unwrap();
        assert_eq!(y.to_vec(), vec![1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_linear_grads_shapes() {
        let x = Tensor::ones(&[4, 3]);
        let w = Tensor::ones(&[2, 3]);
        let gy = Tensor::ones(&[4, 2]);
        assert_eq!(linear_grad_input(&gy, &w).unwrap().shape(), &[4, 3]);
        assert_eq!(linear_grad_weight(&gy, &x).unwrap().shape(), &[2, 3]);
        assert_eq!(linear_grad_bias(&gy).unwrap().to_vec(), vec![4.0, 4.0]);
    }

    #[test]
    fn test_softmax_cross_entropy_uniform() {
        let logits = Tensor::zeros(&[2, 4]);
        let labels = Tensor::from_vec(vec![0.0, 3.0], &[2]).unwrap();
        let loss = softmax_cross_entropy(&logits, &labels).unwrap();
        assert!((loss.item().unwrap() - 4.0f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_cross_entropy_grad_matches_finite_difference() {
        let logits = Tensor::from_vec(vec![0.2, -0.4, 1.1, 0.3, 0.0, -0.7], &[2, 3]).unwrap();
        let labels = Tensor::from_vec(vec![2.0, 0.0], &[2]).unwrap();
        let grad = softmax_cross_entropy_grad(&Tensor::scalar(1.0), &logits, &labels).unwrap();
        let eps = 1e-3;
        for i in 0..logits.numel() {
            let mut plus = logits.to_vec();
            plus[i] += eps;
            let mut minus = logits.to_vec();
            minus[i] -= eps;
            let lp = softmax_cross_entropy(&Tensor::from_vec(plus, &[2, 3]).unwrap(), &labels)
                .unwrap()
                .item()
                .unwrap();
            let lm = softmax_cross_entropy(&Tensor::from_vec(minus, &[2, 3]).unwrap(), &labels)
                .unwrap()
                .item()
                .unwrap();
            let numeric = (lp - lm) / (2.0 * eps);
            assert!((numeric - grad.as_slice()[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_accuracy() {
        let logits = Tensor::from_vec(vec![0.9, 0.1, 0.2, 0.8, 0.6, 0.4], &[3, 2]).unwrap();
        let labels = Tensor::from_vec(vec![0.0, 1.0, 1.0], &[3]).unwrap();
        let acc = accuracy(&logits, &labels).unwrap().item().unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_labels_rejected() {
        let logits = Tensor::zeros(&[1, 3]);
        assert!(softmax_cross_entropy(&logits, &Tensor::from_vec(vec![3.0], &[1]).unwrap()).is_err());
        assert!(softmax_cross_entropy(&logits, &Tensor::from_vec(vec![0.5], &[1]).unwrap()).is_err());
        assert!(accuracy(&logits, &Tensor::zeros(&[2])).is_err());
    }
}
