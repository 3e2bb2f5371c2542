//! Compiled Nodes
//!
//! Host autodiff functions that run compiled executables. A node receives
//! the flattened model inputs followed by the parameter values, and
//! returns the flattened declared outputs. The nesting of those outputs is
//! published through an [`OutputLayout`] so the caller can rebuild them.
//!
//! A node is single-use: one forward, then at most one backward. The state
//! forward leaves for backward is taken, not borrowed, by backward.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod one_phase;
pub mod two_phase;

use std::collections::HashMap;
use std::sync::Arc;

use graftml_core::{Device, Structure, Template};
use graftml_jit::Value;
use graftml_tensor::Tensor;
use parking_lot::Mutex;

use crate::binding::NamedIoTable;
use crate::codec::{flatten, unflatten_exact};
use crate::error::{BridgeError, BridgeResult};

pub use one_phase::OnePhaseNode;
pub use two_phase::TwoPhaseNode;

// =============================================================================
// Output Layout
// =============================================================================

/// Slot through which a node publishes the nesting of its outputs.
#[derive(Debug, Clone, Default)]
pub struct OutputLayout(Arc<Mutex<Option<Template>>>);

impl OutputLayout {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, template: Template) {
        *self.0.lock() = Some(template);
    }

    /// Takes the published template.
    pub fn take(&self) -> Option<Template> {
        self.0.lock().take()
    }
}

// =============================================================================
// Node Call
// =============================================================================

/// What a node needs to know about one call.
#[derive(Debug, Clone)]
pub struct NodeCall {
    table: Arc<NamedIoTable>,
    input_templates: Vec<Template>,
    num_outputs: usize,
    layout: OutputLayout,
}

impl NodeCall {
    /// Describes a call with inputs shaped like `input_templates` to a model
    /// with `num_outputs` declared outputs.
    pub fn new(table: Arc<NamedIoTable>, input_templates: Vec<Template>, num_outputs: usize) -> Self {
        Self {
            table,
            input_templates,
            num_outputs,
            layout: OutputLayout::new(),
        }
    }

    /// Handle to the output layout slot.
    pub fn layout(&self) -> OutputLayout {
        self.layout.clone()
    }

    /// Returns the name table.
    pub fn table(&self) -> &NamedIoTable {
        &self.table
    }

    /// Number of flat input slots (leaves of all inputs).
    pub fn num_flat_inputs(&self) -> usize {
        self.input_templates.iter().map(Structure::num_leaves).sum()
    }

    /// Splits the flat argument list and builds the forward input map.
    fn assemble(&self, args: &[Tensor]) -> BridgeResult<Assembled> {
        let num_inputs = self.num_flat_inputs();
        let expected = num_inputs + self.table.params.len();
        if args.len() != expected {
            return Err(BridgeError::ArityMismatch {
                what: "node arguments",
                expected,
                actual: args.len(),
            });
        }
        let device = common_device(args.iter().enumerate().map(|(i, t)| {
            let label = if i < num_inputs {
                format!("input leaf {i}")
            } else {
                format!("parameter {}", self.table.params[i - num_inputs])
            };
            (label, t)
        }))?;

        let template = Structure::branch(self.input_templates.clone());
        let inputs = match unflatten_exact(&args[..num_inputs], &template)? {
            Structure::Branch(inputs) => inputs,
            Structure::Leaf(_) => {
                return Err(BridgeError::Inconsistent(
                    "input list rebuilt as a single tensor".to_string(),
                ))
            }
        };
        let params = args[num_inputs..].to_vec();
        let named = self.table.bind_forward(inputs, params)?;
        Ok(Assembled { named, device })
    }

    /// Publishes the nesting of the declared outputs and flattens them.
    fn emit_outputs(&self, outputs: Vec<Value>) -> Vec<Tensor> {
        let nested = Structure::branch(outputs);
        self.layout.set(nested.template());
        flatten(&nested)
    }
}

struct Assembled {
    named: HashMap<String, Value>,
    device: Device,
}

/// Returns the single device all `tensors` live on (CPU if there are none).
pub(crate) fn common_device<'a, I>(tensors: I) -> BridgeResult<Device>
where
    I: IntoIterator<Item = (String, &'a Tensor)>,
{
    let mut expected: Option<Device> = None;
    for (name, tensor) in tensors {
        match expected {
            None => expected = Some(tensor.device()),
            Some(device) if device != tensor.device() => {
                return Err(BridgeError::DeviceMismatch {
                    name,
                    expected: device,
                    actual: tensor.device(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(expected.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_device() {
        let a = Tensor::zeros(&[1]);
        let b = Tensor::zeros(&[1]).to_device(Device::Cuda(0));
        assert_eq!(common_device(vec![]).unwrap(), Device::Cpu);
        assert_eq!(
            common_device(vec![("b".to_string(), &b)]).unwrap(),
            Device::Cuda(0)
        );
        let err = common_device(vec![("a".to_string(), &a), ("b".to_string(), &b)]).unwrap_err();
        assert!(matches!(err, BridgeError::DeviceMismatch { name, .. } if name == "b"));
    }

    #[test]
    fn test_layout_is_taken_once() {
        let layout = OutputLayout::new();
        layout.set(Structure::leaf(()));
        assert!(layout.take().is_some());
        assert!(layout.take().is_none());
    }

    #[test]
    fn test_num_flat_inputs() {
        let call = NodeCall::new(
            Arc::new(NamedIoTable::default()),
            vec![
                Structure::leaf(()),
                Structure::branch(vec![Structure::leaf(()), Structure::leaf(())]),
            ],
            1,
        );
        assert_eq!(call.num_flat_inputs(), 3);
    }
}
