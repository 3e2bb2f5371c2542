//! Device Abstraction - Compute Placement Tags
//!
//! Every tensor carries the device it was placed on. The reference runtime
//! keeps all buffers in host memory, so a device is a placement tag that
//! operations propagate and validate rather than a separate allocator.
//!
//! # Example
//! ```rust
//! use graftml_core::Device;
//!
//! let cpu = Device::Cpu;
//! assert!(cpu.is_cpu());
//! assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use core::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Device Enum
// =============================================================================

/// Represents a compute device where tensors are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// Host CPU.
    Cpu,

    /// CUDA device with device index.
    Cuda(usize),
}

impl Device {
    /// Returns true if this is a CPU device.
    #[must_use]
    pub const fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu)
    }

    /// Returns true if this is a GPU device.
    #[must_use]
    pub const fn is_gpu(self) -> bool {
        !self.is_cpu()
    }

    /// Returns the device index (0 for CPU).
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Cpu => 0,
            Self::Cuda(idx) => idx,
        }
    }

    /// Returns the backend name for this device.
    #[must_use]
    pub const fn backend_name(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda(_) => "cuda",
        }
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{idx}"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device() {
        assert_eq!(Device::default(), Device::Cpu);
    }

    #[test]
    fn test_device_display() {
        assert_eq!(format!("{}", Device::Cpu), "cpu");
        assert_eq!(format!("{}", Device::Cuda(3)), "cuda:3");
    }

    #[test]
    fn test_device_queries() {
        assert!(Device::Cpu.is_cpu());
        assert!(Device::Cuda(0).is_gpu());
        assert_eq!(Device::Cuda(2).index(), 2);
        assert_eq!(Device::Cuda(2).backend_name(), "cuda");
    }
}
