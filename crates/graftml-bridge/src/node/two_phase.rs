//! Two-Phase Compiled Node
//!
//! Runs a forward executable at forward time and the paired backward
//! executable at backward time. Values the backward graph needs are
//! returned by the forward graph after the declared outputs and kept in a
//! context that backward consumes.

use std::sync::Arc;

use graftml_autograd::{BoxError, Function};
use graftml_core::{Device, Structure, Template};
use graftml_jit::{Executable, Value};
use graftml_tensor::Tensor;
use tracing::debug;

use super::{common_device, NodeCall};
use crate::binding::NamedIoTable;
use crate::codec::unflatten_exact;
use crate::error::{BridgeError, BridgeResult};

/// State handed from forward to backward.
struct SavedContext {
    retained: Vec<Value>,
    output_template: Template,
    output_shapes: Vec<Vec<usize>>,
    device: Device,
}

/// Autodiff node backed by a forward and a backward executable.
///
/// Outputs that receive no gradient are seeded with zeros before the backward
/// executable runs. An input reaching only such outputs therefore gets a zero
/// gradient rather than none, unlike the same model run eagerly.
pub struct TwoPhaseNode {
    call: NodeCall,
    forward: Arc<dyn Executable>,
    backward: Arc<dyn Executable>,
    saved: Option<SavedContext>,
}

impl TwoPhaseNode {
    /// Creates a node for one call.
    pub fn new(call: NodeCall, forward: Arc<dyn Executable>, backward: Arc<dyn Executable>) -> Self {
        Self {
            call,
            forward,
            backward,
            saved: None,
        }
    }

    fn run_forward(&mut self, args: &[Tensor]) -> BridgeResult<Vec<Tensor>> {
        let assembled = self.call.assemble(args)?;
        let table = self.call.table();
        let n = self.call.num_outputs;
        if table.forward_outputs.len() < n {
            return Err(BridgeError::ArityMismatch {
                what: "forward outputs",
                expected: n,
                actual: table.forward_outputs.len(),
            });
        }

        let outputs = self.forward.run(&assembled.named)?;
        let mut values = NamedIoTable::gather(&outputs, &table.forward_outputs)?;
        let retained = values.split_off(n);
        debug!(
            outputs = n,
            retained = retained.len(),
            device = %assembled.device,
            "two-phase forward"
        );

        let declared = Structure::branch(values.clone());
        let output_shapes = declared.leaves().iter().map(|t| t.shape().to_vec()).collect();
        self.saved = Some(SavedContext {
            retained,
            output_template: declared.template(),
            output_shapes,
            device: assembled.device,
        });
        Ok(self.call.emit_outputs(values))
    }

    fn run_backward(&mut self, grads: &[Option<Tensor>]) -> BridgeResult<Vec<Option<Tensor>>> {
        let saved = self
            .saved
            .take()
            .ok_or(BridgeError::NodeConsumed { node: "TwoPhase" })?;

        if grads.len() != saved.output_shapes.len() {
            return Err(BridgeError::ArityMismatch {
                what: "output gradients",
                expected: saved.output_shapes.len(),
                actual: grads.len(),
            });
        }
        let device = common_device(grads.iter().enumerate().filter_map(|(i, g)| {
            g.as_ref().map(|g| (format!("output gradient {i}"), g))
        }))?;
        if grads.iter().any(Option::is_some) && device != saved.device {
            return Err(BridgeError::DeviceMismatch {
                name: "output gradients".to_string(),
                expected: saved.device,
                actual: device,
            });
        }

        // Outputs that received no gradient are seeded with zeros.
        let seeds: Vec<Tensor> = grads
            .iter()
            .zip(&saved.output_shapes)
            .map(|(g, shape)| match g {
                Some(g) => g.clone(),
                None => Tensor::zeros(shape).to_device(saved.device),
            })
            .collect();
        let seeds = match unflatten_exact(&seeds, &saved.output_template)? {
            Structure::Branch(seeds) => seeds,
            Structure::Leaf(_) => {
                return Err(BridgeError::Inconsistent(
                    "output gradients rebuilt as a single tensor".to_string(),
                ))
            }
        };

        let table = self.call.table();
        let inputs = table.bind_backward(seeds, saved.retained)?;
        let outputs = self.backward.run(&inputs)?;
        let input_grads = table.collect_gradients(&outputs, &self.call.input_templates)?;
        debug!(
            gradients = input_grads.iter().filter(|g| g.is_some()).count(),
            slots = input_grads.len(),
            "two-phase backward"
        );
        Ok(input_grads)
    }
}

impl Function for TwoPhaseNode {
    fn name(&self) -> &'static str {
        "CompiledTwoPhase"
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
        Ok(self.run_forward(inputs)?)
    }

    fn backward(&mut self, grad_outputs: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
        Ok(self.run_backward(grad_outputs)?)
    }
}
