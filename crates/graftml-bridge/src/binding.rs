//! Named I/O Binding
//!
//! Compiled executables take and return values by name; the host engine
//! works positionally. `NamedIoTable` holds the ordered name lists of one
//! compiled model and converts between the two views.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::collections::HashMap;

use graftml_core::{Structure, Template};
use graftml_jit::Value;
use graftml_tensor::Tensor;

use crate::codec::flatten_against;
use crate::error::{BridgeError, BridgeResult};

pub use graftml_jit::GRAD_OUT_PREFIX;

/// Key under which a compiled graph returns the gradient of `name`.
pub fn grad_name(name: &str) -> String {
    graftml_jit::grad_out_name(name)
}

/// The ordered name lists of one compiled model.
///
/// Order is the only link between a name and its positional slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedIoTable {
    /// Data inputs of the forward graph.
    pub forward_inputs: Vec<String>,
    /// Outputs of the forward graph: declared outputs, then retained values.
    pub forward_outputs: Vec<String>,
    /// Inputs of the backward graph: output gradients, then retained values.
    pub backward_inputs: Vec<String>,
    /// Outputs of the backward graph (`grad_out@*`).
    pub backward_outputs: Vec<String>,
    /// Parameters, shared by all graphs of the model.
    pub params: Vec<String>,
}

impl NamedIoTable {
    /// Pairs `names` with `values` positionally.
    pub fn bind(
        what: &'static str,
        names: &[String],
        values: Vec<Value>,
    ) -> BridgeResult<HashMap<String, Value>> {
        if names.len() != values.len() {
            return Err(BridgeError::ArityMismatch {
                what,
                expected: names.len(),
                actual: values.len(),
            });
        }
        Ok(names.iter().cloned().zip(values).collect())
    }

    /// Builds the forward input map from the (nested) data inputs and the
    /// parameter values.
    pub fn bind_forward(
        &self,
        inputs: Vec<Value>,
        params: Vec<Tensor>,
    ) -> BridgeResult<HashMap<String, Value>> {
        let mut named = Self::bind("forward inputs", &self.forward_inputs, inputs)?;
        let params = params.into_iter().map(Structure::leaf).collect();
        named.extend(Self::bind("parameters", &self.params, params)?);
        Ok(named)
    }

    /// Builds the backward input map from the output gradients and the
    /// retained values.
    pub fn bind_backward(
        &self,
        grads: Vec<Value>,
        retained: Vec<Value>,
    ) -> BridgeResult<HashMap<String, Value>> {
        let mut values = grads;
        values.extend(retained);
        Self::bind("backward inputs", &self.backward_inputs, values)
    }

    /// Takes the values of `names` out of an executable's outputs, in order.
    pub fn gather(outputs: &HashMap<String, Value>, names: &[String]) -> BridgeResult<Vec<Value>> {
        names
            .iter()
            .map(|name| {
                outputs
                    .get(name)
                    .cloned()
                    .ok_or_else(|| BridgeError::MissingOutput { name: name.clone() })
            })
            .collect()
    }

    /// Extracts one flat gradient slot per input leaf and per parameter.
    ///
    /// An input without a `grad_out@` entry yields one `None` per leaf of
    /// its template, a parameter without one yields a single `None`.
    pub fn collect_gradients(
        &self,
        outputs: &HashMap<String, Value>,
        templates: &[Template],
    ) -> BridgeResult<Vec<Option<Tensor>>> {
        if templates.len() != self.forward_inputs.len() {
            return Err(BridgeError::ArityMismatch {
                what: "input templates",
                expected: self.forward_inputs.len(),
                actual: templates.len(),
            });
        }

        let mut grads = Vec::new();
        for (name, template) in self.forward_inputs.iter().zip(templates) {
            let key = grad_name(name);
            match outputs.get(&key) {
                Some(grad) => grads.extend(flatten_against(grad, template, &key)?),
                None => grads.extend(std::iter::repeat_with(|| None).take(template.num_leaves())),
            }
        }
        for name in &self.params {
            let key = grad_name(name);
            match outputs.get(&key) {
                Some(Structure::Leaf(grad)) => grads.push(Some(grad.clone())),
                Some(other) => {
                    return Err(BridgeError::ShapeMismatch {
                        path: key,
                        expected: "*".to_string(),
                        actual: other.outline(),
                    })
                }
                None => grads.push(None),
            }
        }
        Ok(grads)
    }
}

// =============================================================================
// Tests
// =============================================================================
