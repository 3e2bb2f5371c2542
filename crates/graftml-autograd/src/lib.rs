//! Graftml Autograd - Define-by-Run Automatic Differentiation
//!
//! Provides the host autodiff engine. The graph is recorded while the forward
//! pass runs: every differentiable [`Function`] applied to variables that
//! require gradients becomes a node holding its inputs' edges. `backward`
//! then visits each reachable node exactly once, in reverse creation order,
//! and accumulates gradients into leaf variables.
//!
//! Functions are multi-input and multi-output, and may report "no gradient"
//! for any input by returning `None`. That protocol is what lets an opaque
//! compiled subgraph take part in the graph as a single node.
//!
//! # Example
//!
//! ```rust,ignore
//! use graftml_autograd::{functions, Variable};
//!
//! let x = Variable::new(tensor, false);
//! let w = Variable::new(weights, true);
//!
//! let y = functions::linear(&x, &w, None)?;
//! let loss = functions::sum(&y)?;
//! loss.backward()?;
//!
//! println!("dL/dw = {:?}", w.grad());
//! ```
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod backward;
pub mod error;
pub mod functions;
pub mod grad_fn;
pub mod variable;

pub use backward::backward;
pub use error::{AutogradError, AutogradResult, BoxError};
pub use grad_fn::{apply, Edge, Function, GradAccumulator, GradNode};
pub use variable::Variable;

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::error::{AutogradError, AutogradResult};
    pub use crate::functions;
    pub use crate::grad_fn::{apply, Function};
    pub use crate::variable::Variable;
}
