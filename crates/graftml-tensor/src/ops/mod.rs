//! Tensor Operations - Matrix Kernels
//!
//! Two-dimensional linear algebra used by the linear layer and its
//! gradients. The classification kernels live in [`nn`].
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

pub mod nn;

use graftml_core::{Error, Result};

use crate::tensor::Tensor;

// =============================================================================
// Matrix Operations
// =============================================================================

/// Matrix product of `a` (m, k) and `b` (k, n).
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    a.check_rank("matmul", 2)?;
    b.check_rank("matmul", 2)?;
    a.check_device(b)?;
    let (m, k) = (a.shape()[0], a.shape()[1]);
    let (k2, n) = (b.shape()[0], b.shape()[1]);
    if k != k2 {
        return Err(Error::shape_mismatch(&[k, n], b.shape()));
    }

    let lhs = a.as_slice();
    let rhs = b.as_slice();
    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for p in 0..k {
            let scale = lhs[i * k + p];
            if scale == 0.0 {
                continue;
            }
            let row = &rhs[p * n..(p + 1) * n];
            let dst = &mut out[i * n..(i + 1) * n];
            for (d, r) in dst.iter_mut().zip(row) {
                *d += scale * r;
            }
        }
    }
    Ok(a.with_data(out, &[m, n]))
}

/// Transpose of a matrix.
pub fn transpose(a: &Tensor) -> Result<Tensor> {
    a.check_rank("transpose", 2)?;
    let (rows, cols) = (a.shape()[0], a.shape()[1]);
    let src = a.as_slice();
    let mut out = vec![0.0f32; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            out[j * rows + i] = src[i * cols + j];
        }
    }
    Ok(a.with_data(out, &[cols, rows]))
}

/// Sums a matrix over its rows, producing one value per column.
pub fn sum_rows(a: &Tensor) -> Result<Tensor> {
    a.check_rank("sum_rows", 2)?;
    let (rows, cols) = (a.shape()[0], a.shape()[1]);
    let mut out = vec![0.0f32; cols];
    for row in a.as_slice().chunks(cols.max(1)).take(rows) {
        for (o, v) in out.iter_mut().zip(row) {
            *o += v;
        }
    }
    Ok(a.with_data(out, &[cols]))
}

/// Adds a row vector `b` (n) to every row of `a` (m, n).
pub fn add_row(a: &Tensor, b: &Tensor) -> Result<Tensor> {
    a.check_rank("add_row", 2)?;
    b.check_rank("add_row", 1)?;
    a.check_device(b)?;
    let cols = a.shape()[1];
    if b.shape()[0] != cols {
        return Err(Error::shape_mismatch(&[cols], b.shape()));
    }
    let bias = b.as_slice();
    let data = a
        .as_slice()
        .chunks(cols.max(1))
        .flat_map(|row| row.iter().zip(bias).map(|(x, y)| x + y))
        .collect();
    Ok(a.with_data(data, a.shape()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use graftml_core::Device;

    #[test]
    fn test_matmul() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let b = Tensor::from_vec(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0], &[3, 2]).unwrap();
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[2, 2]);
        assert_eq!(c.to_vec(), vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_rejects_inner_mismatch() {
        let a = Tensor::zeros(&[2, 3]);
        let b = Tensor::zeros(&[2, 3]);
        assert!(matmul(&a, &b).is_err());
    }

    #[test]
    fn test_matmul_rejects_device_mismatch() {
        let a = Tensor::zeros(&[2, 2]);
        let b = Tensor::zeros(&[2, 2]).to_device(Device::Cuda(0));
        assert!(matches!(matmul(&a, &b), Err(Error::DeviceMismatch { .. })));
    }

    #[test]
    fn test_transpose() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
        let t = transpose(&a).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.to_vec(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_sum_rows_and_add_row() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        assert_eq!(sum_rows(&a).unwrap().to_vec(), vec![4.0, 6.0]);
        let b = Tensor::from_vec(vec![10.0, 20.0], &[2]).unwrap();
        assert_eq!(add_row(&a, &b).unwrap().to_vec(), vec![11.0, 22.0, 13.0, 24.0]);
    }
}
