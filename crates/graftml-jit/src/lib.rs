//! Graftml JIT - Reference Graph Compiler and Runtime
//!
//! Loads interchange documents into a name-based dataflow IR, derives
//! gradient graphs symbolically, and executes graphs with an interpreter.
//! Models are captured into the IR with the [`Tracer`].
//!
//! - Model tracing with path-style or export-style parameter names
//! - Reverse-mode gradient generation over tensors and sequences
//! - Forward/backward splitting with retained intermediates
//! - Fused forward+gradient graphs seeded with ones
//!
//! # Example
//!
//! ```ignore
//! use graftml_jit::{CompileOptions, CompiledGraph, ParamNaming, Tracer, ValueKind};
//!
//! let mut tracer = Tracer::new("square", ParamNaming::Path);
//! let x = tracer.input("input_0", ValueKind::Tensor);
//! let y = tracer.mul(&x, &x);
//! tracer.output("output_0", &y);
//! let graph = tracer.finish();
//!
//! let exe = graph.compile(&CompileOptions::new().enable_backprop(true))?;
//! let outputs = exe.run(&inputs)?;
//! ```
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod compile;
pub mod error;
pub mod exec;
pub mod gradient;
pub mod interchange;
pub mod ir;
pub mod trace;

pub use compile::{CompileOptions, CompiledGraph, Compiler, Executable, GraphCompiler};
pub use error::{JitError, JitResult};
pub use exec::Program;
pub use gradient::{
    grad_in_name, grad_out_name, split_for_backward, with_backprop, GRAD_IN_PREFIX,
    GRAD_OUT_PREFIX,
};
pub use ir::{is_param_name, Graph, Node, Op, Value, ValueInfo, ValueKind};
pub use trace::{ParamNaming, Symbol, Tracer};

#[cfg(test)]
mod tests {
    use super::*;
    use graftml_tensor::Tensor;

    #[test]
    fn test_trace_split_compile() {
        let mut tracer = Tracer::new("mlp", ParamNaming::Path);
        let x = tracer.input("input_0", ValueKind::Tensor);
        let w = tracer.param("/l1/W", &Tensor::zeros(&[4, 3]));
        let h = tracer.gemm(&x, &w, None);
        let h = tracer.relu(&h);
        tracer.output("output_0", &h);
        let graph = tracer.finish();

        let mut wrt = graph.input_names();
        wrt.extend(graph.param_names());
        let (forward, backward) = CompiledGraph::split_for_backward(&graph, &wrt).unwrap();
        assert_eq!(forward.input_names(), graph.input_names());
        assert_eq!(forward.param_names(), graph.param_names());
        assert!(backward.param_names().is_empty());
        assert!(backward.compile(&CompileOptions::new()).is_ok());
    }
}
