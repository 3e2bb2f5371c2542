//! Tensor - Core N-Dimensional Array Type
//!
//! Row-major `f32` tensor with a shared, immutable buffer. Cloning a tensor
//! is cheap; every operation produces a new buffer. Binary operations
//! require both operands on the same device and propagate that device to
//! their result.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::sync::Arc;

use graftml_core::{Device, Error, Result};
use rand::Rng;

// =============================================================================
// Tensor Struct
// =============================================================================

/// An N-dimensional array of `f32` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Arc<Vec<f32>>,
    shape: Vec<usize>,
    device: Device,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Creates a tensor from a vector and shape.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(Error::shape_mismatch(&[numel], &[data.len()]));
        }
        Ok(Self {
            data: Arc::new(data),
            shape: shape.to_vec(),
            device: Device::Cpu,
        })
    }

    /// Creates a zero-dimensional tensor holding one value.
    pub fn scalar(value: f32) -> Self {
        Self::full(&[], value)
    }

    /// Creates a tensor filled with `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        let numel: usize = shape.iter().product();
        Self {
            data: Arc::new(vec![value; numel]),
            shape: shape.to_vec(),
            device: Device::Cpu,
        }
    }

    /// Creates a tensor filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    /// Creates a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zeros with the shape and device of `other`.
    pub fn zeros_like(other: &Self) -> Self {
        Self::zeros(&other.shape).to_device(other.device)
    }

    /// Ones with the shape and device of `other`.
    pub fn ones_like(other: &Self) -> Self {
        Self::ones(&other.shape).to_device(other.device)
    }

    /// Creates a tensor with values drawn uniformly from `[low, high)`.
    pub fn uniform<R: Rng + ?Sized>(rng: &mut R, shape: &[usize], low: f32, high: f32) -> Self {
        let numel: usize = shape.iter().product();
        let data = (0..numel).map(|_| rng.gen_range(low..high)).collect();
        Self {
            data: Arc::new(data),
            shape: shape.to_vec(),
            device: Device::Cpu,
        }
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Returns the shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Returns the device this tensor is placed on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Returns the elements in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Copies the elements into a new vector.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.as_ref().clone()
    }

    /// Returns the single value of a one-element tensor.
    pub fn item(&self) -> Result<f32> {
        match self.data.as_slice() {
            [value] => Ok(*value),
            _ => Err(Error::invalid_operation(format!(
                "item() requires a single element, tensor has shape {:?}",
                self.shape
            ))),
        }
    }

    /// Returns a copy placed on `device`. Shares the buffer.
    #[must_use]
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            device,
        }
    }

    /// Returns a tensor with the same buffer and a new shape.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self> {
        let numel: usize = shape.iter().product();
        if numel != self.numel() {
            return Err(Error::shape_mismatch(&self.shape, shape));
        }
        Ok(Self {
            data: Arc::clone(&self.data),
            shape: shape.to_vec(),
            device: self.device,
        })
    }

    /// Builds a new tensor on this tensor's device.
    pub(crate) fn with_data(&self, data: Vec<f32>, shape: &[usize]) -> Self {
        Self {
            data: Arc::new(data),
            shape: shape.to_vec(),
            device: self.device,
        }
    }

    // =========================================================================
    // Checks
    // =========================================================================

    /// Fails unless `other` lives on the same device.
    pub fn check_device(&self, other: &Self) -> Result<()> {
        if self.device == other.device {
            Ok(())
        } else {
            Err(Error::DeviceMismatch {
                expected: self.device,
                actual: other.device,
            })
        }
    }

    /// Fails unless `other` has the same shape and device.
    pub fn check_same(&self, other: &Self) -> Result<()> {
        self.check_device(other)?;
        if self.shape == other.shape {
            Ok(())
        } else {
            Err(Error::shape_mismatch(&self.shape, &other.shape))
        }
    }

    /// Fails unless the tensor has exactly `rank` dimensions.
    pub fn check_rank(&self, op: &'static str, rank: usize) -> Result<()> {
        if self.ndim() == rank {
            Ok(())
        } else {
            Err(Error::InvalidRank {
                op,
                expected: rank,
                shape: self.shape.clone(),
            })
        }
    }

    // =========================================================================
    // Element-wise Operations
    // =========================================================================

    fn zip_with(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        self.check_same(other)?;
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(self.with_data(data, &self.shape))
    }

    /// Maps every element.
    #[must_use]
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        let data = self.data.iter().map(|v| f(*v)).collect();
        self.with_data(data, &self.shape)
    }

    /// Element-wise addition.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a + b)
    }

    /// Element-wise subtraction.
    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Element-wise multiplication.
    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.zip_with(other, |a, b| a * b)
    }

    /// Multiplies every element by `factor`.
    #[must_use]
    pub fn scale(&self, factor: f32) -> Self {
        self.map(|v| v * factor)
    }

    /// Rectified linear unit.
    #[must_use]
    pub fn relu(&self) -> Self {
        self.map(|v| v.max(0.0))
    }

    /// Passes `grad` where this tensor is positive, zero elsewhere.
    pub fn relu_backward(&self, grad: &Self) -> Result<Self> {
        self.zip_with(grad, |x, g| if x > 0.0 { g } else { 0.0 })
    }

    // =========================================================================
    // Reductions
    // =========================================================================

    /// Sum of all elements as a zero-dimensional tensor.
    #[must_use]
    pub fn sum_all(&self) -> Self {
        let total: f32 = self.data.iter().sum();
        self.with_data(vec![total], &[])
    }

    /// Largest absolute element-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Self) -> Result<f32> {
        if self.shape != other.shape {
            return Err(Error::shape_mismatch(&self.shape, &other.shape));
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max))
    }

    /// Returns true if shapes match and every element is within `tol`.
    pub fn allclose(&self, other: &Self, tol: f32) -> bool {
        self.max_abs_diff(other).is_ok_and(|diff| diff <= tol)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(Tensor::from_vec(vec![1.0, 2.0, 3.0], &[2, 2]).is_err());
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.numel(), 4);
        assert_eq!(t.device(), Device::Cpu);
    }

    #[test]
    fn test_scalar_item() {
        let s = Tensor::scalar(2.5);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.item().unwrap(), 2.5);
        assert!(Tensor::zeros(&[2]).item().is_err());
    }

    #[test]
    fn test_binary_ops() {
        let a = Tensor::from_vec(vec![1.0, -2.0, 3.0], &[3]).unwrap();
        let b = Tensor::from_vec(vec![4.0, 5.0, -6.0], &[3]).unwrap();
        assert_eq!(a.add(&b).unwrap().to_vec(), vec![5.0, 3.0, -3.0]);
        assert_eq!(a.sub(&b).unwrap().to_vec(), vec![-3.0, -7.0, 9.0]);
        assert_eq!(a.mul(&b).unwrap().to_vec(), vec![4.0, -10.0, -18.0]);
        assert_eq!(a.scale(2.0).to_vec(), vec![2.0, -4.0, 6.0]);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[3, 2]);
        assert!(matches!(a.add(&b), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_device_mismatch_rejected() {
        let a = Tensor::zeros(&[2]);
        let b = Tensor::zeros(&[2]).to_device(Device::Cuda(0));
        assert!(matches!(a.add(&b), Err(Error::DeviceMismatch { .. })));
        assert_eq!(b.scale(3.0).device(), Device::Cuda(0));
    }

    #[test]
    fn test_relu_and_backward() {
        let x = Tensor::from_vec(vec![-1.0, 0.0, 2.0], &[3]).unwrap();
        assert_eq!(x.relu().to_vec(), vec![0.0, 0.0, 2.0]);
        let g = Tensor::ones(&[3]);
        assert_eq!(x.relu_backward(&g).unwrap().to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sum_and_compare() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(a.sum_all().item().unwrap(), 10.0);
        let b = a.map(|v| v + 1e-6);
        assert!(a.allclose(&b, 1e-5));
        assert!(!a.allclose(&a.scale(2.0), 1e-5));
        assert!(!a.allclose(&Tensor::zeros(&[4]), 1.0));
    }

    #[test]
    fn test_like_constructors_keep_device() {
        let a = Tensor::zeros(&[2, 2]).to_device(Device::Cuda(1));
        assert_eq!(Tensor::ones_like(&a).device(), Device::Cuda(1));
        assert_eq!(Tensor::zeros_like(&a).shape(), &[2, 2]);
    }
}
