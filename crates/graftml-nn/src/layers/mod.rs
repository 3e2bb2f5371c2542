//! Neural Network Layers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod linear;

pub use linear::Linear;
