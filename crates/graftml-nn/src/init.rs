//! Weight Initialization - Parameter Initialization Strategies
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_tensor::Tensor;
use rand::Rng;

/// Creates a tensor filled with zeros.
pub fn zeros(shape: &[usize]) -> Tensor {
    graftml_tensor::zeros(shape)
}

/// Creates a tensor with uniform random values in `[low, high)`.
pub fn uniform_range<R: Rng + ?Sized>(rng: &mut R, shape: &[usize], low: f32, high: f32) -> Tensor {
    graftml_tensor::uniform(rng, shape, low, high)
}

/// Kaiming uniform initialization.
///
/// Designed for layers followed by ReLU. Samples from `U(-bound, bound)`
/// where `bound = sqrt(6 / fan_in)`.
pub fn kaiming_uniform<R: Rng + ?Sized>(rng: &mut R, fan_out: usize, fan_in: usize) -> Tensor {
    let bound = (6.0 / fan_in.max(1) as f32).sqrt();
    uniform_range(rng, &[fan_out, fan_in], -bound, bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_kaiming_uniform_bounds() {
        let mut rng = StdRng::seed_from_u64(0);
        let w = kaiming_uniform(&mut rng, 8, 6);
        assert_eq!(w.shape(), &[8, 6]);
        assert!(w.as_slice().iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_kaiming_uniform_is_seeded() {
        let a = kaiming_uniform(&mut StdRng::seed_from_u64(7), 3, 3);
        let b = kaiming_uniform(&mut StdRng::seed_from_u64(7), 3, 3);
        assert_eq!(a, b);
    }
}
