//! Backward Pass - Gradient Computation
//!
//! Reverse-mode traversal of the recorded graph. Nodes are processed in
//! decreasing creation order, which is a reverse topological order because
//! a node's inputs always come from earlier nodes. Each node that receives
//! at least one gradient is run exactly once, with `None` in the slots of
//! outputs that never received a gradient.
//!
//! @version 0.1.0
//! @author `AutomataNexus` Development Team

use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use graftml_tensor::Tensor;

use crate::error::AutogradResult;
use crate::grad_fn::{accumulate, Edge, GradNode};
use crate::variable::Variable;

// =============================================================================
// Backward Function
// =============================================================================

struct Pending {
    node: Arc<GradNode>,
    grads: Vec<Option<Tensor>>,
}

fn add_into(slot: &mut Option<Tensor>, grad: Tensor) -> AutogradResult<()> {
    *slot = Some(match slot.take() {
        Some(existing) => existing.add(&grad)?,
        None => grad,
    });
    Ok(())
}

/// Computes gradients of `root` for every leaf reachable from it.
///
/// # Arguments
/// * `root` - The output variable (typically the loss)
/// * `seed` - Gradient of the root; ones of the root's shape when `None`
pub fn backward(root: &Variable, seed: Option<Tensor>) -> AutogradResult<()> {
    let seed = seed.unwrap_or_else(|| Tensor::ones_like(&root.data()));

    let (node, output) = match root.edge() {
        Edge::Detached => return Ok(()),
        Edge::Leaf(acc) => return accumulate(&acc, &seed),
        Edge::Node { node, output } => (node, output),
    };

    let mut pending: HashMap<usize, Pending> = HashMap::new();
    let mut queue: BinaryHeap<usize> = BinaryHeap::new();

    let mut grads = vec![None; node.num_outputs()];
    grads[output] = Some(seed);
    queue.push(node.id());
    pending.insert(node.id(), Pending { node, grads });

    while let Some(id) = queue.pop() {
        let Some(Pending { node, grads }) = pending.remove(&id) else {
            continue;
        };
        tracing::trace!(function = node.name(), id, "backward");
        let input_grads = node.run_backward(&grads)?;

        for (edge, grad) in node.edges().iter().zip(input_grads) {
            let Some(grad) = grad else { continue };
            match edge {
                Edge::Detached => {}
                Edge::Leaf(acc) => accumulate(acc, &grad)?,
                Edge::Node { node: next, output } => {
                    let entry = pending.entry(next.id()).or_insert_with(|| {
                        queue.push(next.id());
                        Pending {
                            node: Arc::clone(next),
                            grads: vec![None; next.num_outputs()],
                        }
                    });
                    add_into(&mut entry.grads[*output], grad)?;
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AutogradError, BoxError};
    use crate::grad_fn::{apply, Function};
    use parking_lot::Mutex;

    /// Splits its input into two copies and records how it was called.
    struct Fork {
        calls: Arc<Mutex<Vec<Vec<bool>>>>,
    }

    impl Function for Fork {
        fn name(&self) -> &'static str {
            "Fork"
        }

        fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
            Ok(vec![inputs[0].clone(), inputs[0].clone()])
        }

        fn backward(&mut self, grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
            self.calls.lock().push(grads.iter().map(Option::is_some).collect());
            let mut total: Option<Tensor> = None;
            for g in grads.iter().flatten() {
                add_into(&mut total, g.clone())?;
            }
            Ok(vec![total])
        }
    }

    struct Failing;

    impl Function for Failing {
        fn name(&self) -> &'static str {
            "Failing"
        }

        fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>, BoxError> {
            Ok(vec![inputs[0].clone()])
        }

        fn backward(&mut self, _grads: &[Option<Tensor>]) -> Result<Vec<Option<Tensor>>, BoxError> {
            Err("boom".into())
        }
    }

    #[test]
    fn test_leaf_backward_accumulates_seed() {
        let x = Variable::new(Tensor::ones(&[2]), true);
        x.backward().unwrap();
        x.backward().unwrap();
        assert_eq!(x.grad().unwrap().to_vec(), vec![2.0, 2.0]);
    }

    #[test]
    fn test_missing_output_gradient_is_none() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let x = Variable::new(Tensor::ones(&[3]), true);
        let outs = apply(Fork { calls: Arc::clone(&calls) }, &[x.clone()]).unwrap();
        outs[0].backward().unwrap();
        assert_eq!(*calls.lock(), vec![vec![true, false]]);
        assert_eq!(x.grad().unwrap().to_vec(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_each_node_runs_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let x = Variable::new(Tensor::ones(&[1]), true);
        let outs = apply(Fork { calls: Arc::clone(&calls) }, &[x.clone()]).unwrap();
        let joined = apply(
            crate::functions::basic::AddFunction,
            &[outs[0].clone(), outs[1].clone()],
        )
        .unwrap()
        .remove(0);
        joined.backward().unwrap();
        assert_eq!(*calls.lock(), vec![vec![true, true]]);
        assert_eq!(x.grad().unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn test_function_error_aborts() {
        let x = Variable::new(Tensor::ones(&[1]), true);
        let y = apply(Failing, &[x.clone()]).unwrap().remove(0);
        let err = y.backward().unwrap_err();
        assert!(matches!(err, AutogradError::Function { function: "Failing", .. }));
        assert!(x.grad().is_none());
    }
}
