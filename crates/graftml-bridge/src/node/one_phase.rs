//! One-Phase Compiled Node
//!
//! Runs a fused executable that computes the declared outputs and every
//! gradient in one pass. Gradients are cached at forward time and handed
//! out unchanged by backward.
//!
//! The fused graph seeds each declared output with ones. Backward does not
//! look at the gradients it receives, so callers must only backpropagate
//! from the node's outputs with unit seeds (for example from a scalar loss
//! output with the default seed). Any other seed gives wrong gradients.

use std::sync::Arc;

use graftml_autograd::{BoxError, Function};
use graftml_jit::Executable;
use graftml_tensor::Tensor;
use tracing::debug;

use super::NodeCall;
use crate::binding::NamedIoTable;
use crate::error::{BridgeError, BridgeResult};

/// Autodiff node backed by one fused forward+gradient executable.
pub struct OnePhaseNode {
    call: NodeCall,
    fused: Arc<dyn Executable>,
    cached: Option<Vec<Option<Tensor>>>,
}

impl OnePhaseNode {
    /// Creates a node for one call.
    pub fn new(call: NodeCall, fused: Arc<dyn Executable>) -> Self {
        Self {
            call,
            fused,
            cached: None,
        }
    }

    fn run_forward(&mut self, args: &[Tensor]) -> BridgeResult<Vec<Tensor>> {
        let assembled = self.call.assemble(args)?;
        let table = self.call.table();
        let n = self.call.num_outputs;
        let declared = table.forward_outputs.get(..n).ok_or(BridgeError::ArityMismatch {
            what: "forward outputs",
            expected: n,
            actual: table.forward_outputs.len(),
        })?;

        let outputs = self.fused.run(&assembled.named)?;
        let values = NamedIoTable::gather(&outputs, declared)?;
        let grads = table.collect_gradients(&outputs, &self.call.input_templates)?;
        debug!(
            outputs = n,
            gradients = grads.iter().filter(|g| g.is_some()).count(),
            device = %assembled.device,
            "one-phase forward"
        );
        self.cached = Some(grads);
        Ok(self.call.emit_outputs(values))
    }

    fn run_backward(&mut self, grads: &[Option<Tensor>]) -> BridgeResult<Vec<Option<Tensor>>> {
        let cached = self
            .cached
            .take()
            .ok_or(BridgeError::NodeConsumed { node: "OnePhase" })?;
        debug!(
            seeds = grads.iter().filter(|g| g.is_some()).count(),
            slots = cached.len(),
            "one-phase backward returns cached gradients"
        );
        Ok(cached)
    }
}

impl Function for OnePhaseNode {
    fn name(&self) -> &'static str {
        "CompiledOnePhase"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        Ok(self.run_forward(inputs)?)
    }

    fn backward(&mut self, grad_outputs: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        Ok(self.run_backward(grad_outputs)?)
    }
}
