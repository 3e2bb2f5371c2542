//! Gradient Generation
//!
//! Symbolic reverse-mode differentiation over the IR. Gradient nodes are
//! appended as ordinary graph nodes; the value holding the gradient of `v`
//! with respect to the seeds is exposed as `grad_out@v`.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{JitError, JitResult};
use crate::ir::{defined_names, Graph, Node, Op, ValueKind};

/// Prefix of gradient outputs.
pub const GRAD_OUT_PREFIX: &str = "grad_out@";

/// Prefix of gradient seed inputs.
pub const GRAD_IN_PREFIX: &str = "grad_in@";

/// Name of the gradient output for `name`.
pub fn grad_out_name(name: &str) -> String {
    format!("{GRAD_OUT_PREFIX}{name}")
}

/// Name of the gradient seed for the output `name`.
pub fn grad_in_name(name: &str) -> String {
    format!("{GRAD_IN_PREFIX}{name}")
}

// =============================================================================
// Builder
// =============================================================================

/// Result of differentiating a graph.
#[derive(Debug, Clone, Default)]
pub(crate) struct Gradients {
    /// Gradient nodes, pruned to what the outputs need, in evaluation order.
    pub nodes: Vec<Node>,
    /// `grad_out@*` names for every requested value reached by a gradient.
    pub outputs: Vec<String>,
    /// Forward values the gradient nodes read, in forward definition order.
    pub retained: Vec<String>,
}

struct GradientBuilder {
    nodes: Vec<Node>,
    grads: FxHashMap<String, String>,
    counter: usize,
}

impl GradientBuilder {
    fn fresh(&mut self, target: &str) -> String {
        self.counter += 1;
        format!("grad@{target}.{}", self.counter)
    }

    fn emit(&mut self, op: Op, inputs: &[&str], target: &str) -> String {
        let output = self.fresh(target);
        self.nodes.push(Node {
            op,
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
            output: output.clone(),
        });
        output
    }

    /// Adds `grad` to the gradient accumulated for `target`.
    fn accumulate(&mut self, target: &str, grad: String) {
        match self.grads.get(target).cloned() {
            None => {
                self.grads.insert(target.to_string(), grad);
            }
            Some(previous) => {
                let sum = self.emit(Op::Add, &[&previous, &grad], target);
                self.grads.insert(target.to_string(), sum);
            }
        }
    }

    fn differentiate(&mut self, node: &Node, gy: &str) -> JitResult<()> {
        let inputs = &node.inputs;
        match &node.op {
            Op::Gemm => {
                let gx = self.emit(Op::GemmGradInput, &[gy, &inputs[1]], &inputs[0]);
                self.accumulate(&inputs[0], gx);
                let gw = self.emit(Op::GemmGradWeight, &[gy, &inputs[0]], &inputs[1]);
                self.accumulate(&inputs[1], gw);
                if let Some(bias) = inputs.get(2) {
                    let gb = self.emit(Op::SumRows, &[gy], bias);
                    self.accumulate(bias, gb);
                }
            }
            Op::Relu => {
                let gx = self.emit(Op::ReluGrad, &[gy, &inputs[0]], &inputs[0]);
                self.accumulate(&inputs[0], gx);
            }
            Op::Add => {
                self.accumulate(&inputs[0], gy.to_string());
                self.accumulate(&inputs[1], gy.to_string());
            }
            Op::Mul => {
                let ga = self.emit(Op::Mul, &[gy, &inputs[1]], &inputs[0]);
                self.accumulate(&inputs[0], ga);
                let gb = self.emit(Op::Mul, &[gy, &inputs[0]], &inputs[1]);
                self.accumulate(&inputs[1], gb);
            }
            Op::Scale { alpha } => {
                let gx = self.emit(Op::Scale { alpha: *alpha }, &[gy], &inputs[0]);
                self.accumulate(&inputs[0], gx);
            }
            Op::Sum => {
                let gx = self.emit(Op::Expand, &[gy, &inputs[0]], &inputs[0]);
                self.accumulate(&inputs[0], gx);
            }
            Op::SoftmaxCrossEntropy => {
                let gx = self.emit(
                    Op::SoftmaxCrossEntropyGrad,
                    &[gy, &inputs[0], &inputs[1]],
                    &inputs[0],
                );
                self.accumulate(&inputs[0], gx);
            }
            Op::Accuracy => {}
            Op::Identity => self.accumulate(&inputs[0], gy.to_string()),
            Op::SequenceConstruct => {
                for (index, input) in inputs.iter().enumerate() {
                    let gx = self.emit(Op::SequenceAt { index }, &[gy], input);
                    self.accumulate(input, gx);
                }
            }
            Op::SequenceAt { index } => {
                let gx = self.emit(
                    Op::SequenceGradAt { index: *index },
                    &[gy, &inputs[0]],
                    &inputs[0],
                );
                self.accumulate(&inputs[0], gx);
            }
            op => {
                return Err(JitError::UnsupportedOp(format!(
                    "cannot differentiate {} (node '{}')",
                    op.name(),
                    node.output
                )))
            }
        }
        Ok(())
    }
}

/// Differentiates `graph` given one seed value name per output.
///
/// Seeds must be defined by the caller (as inputs or by extra nodes). Only
/// names in `wrt` that a gradient reaches get a `grad_out@` output.
pub(crate) fn differentiate(
    graph: &Graph,
    seeds: &[(String, String)],
    wrt: &[String],
) -> JitResult<Gradients> {
    let mut builder = GradientBuilder {
        nodes: Vec::new(),
        grads: FxHashMap::default(),
        counter: 0,
    };
    for (output, seed) in seeds {
        builder.accumulate(output, seed.clone());
    }

    for node in graph.nodes().iter().rev() {
        if let Some(gy) = builder.grads.get(&node.output).cloned() {
            builder.differentiate(node, &gy)?;
        }
    }

    let mut outputs = Vec::new();
    for name in wrt {
        if let Some(grad) = builder.grads.get(name).cloned() {
            let output = grad_out_name(name);
            builder.nodes.push(Node {
                op: Op::Identity,
                inputs: vec![grad],
                output: output.clone(),
            });
            outputs.push(output);
        }
    }

    // Keep only what the gradient outputs depend on.
    let mut needed: FxHashSet<String> = outputs.iter().cloned().collect();
    let mut kept = Vec::new();
    for node in builder.nodes.into_iter().rev() {
        if needed.contains(&node.output) {
            needed.extend(node.inputs.iter().cloned());
            kept.push(node);
        }
    }
    kept.reverse();

    let seed_names: FxHashSet<&str> = seeds.iter().map(|(_, s)| s.as_str()).collect();
    let retained = graph
        .inputs()
        .iter()
        .map(|i| i.name.as_str())
        .chain(graph.nodes().iter().map(|n| n.output.as_str()))
        .filter(|name| needed.contains(*name) && !seed_names.contains(name))
        .map(str::to_string)
        .collect();

    Ok(Gradients {
        nodes: kept,
        outputs,
        retained,
    })
}

// =============================================================================
// Graph Transformations
// =============================================================================

/// Splits `graph` into a forward graph and a backward graph computing the
/// gradients of `wrt`.
///
/// The forward graph returns the declared outputs followed by the retained
/// values. The backward graph takes one `grad_in@<output>` seed per declared
/// output followed by the retained values, and returns `grad_out@<name>` for
/// every name in `wrt` a gradient reaches.
pub fn split_for_backward(graph: &Graph, wrt: &[String]) -> JitResult<(Graph, Graph)> {
    let kinds = graph.validate()?;
    let seeds: Vec<(String, String)> = graph
        .outputs()
        .iter()
        .map(|o| (o.clone(), grad_in_name(o)))
        .collect();
    let defined = defined_names(graph);
    if let Some((_, clash)) = seeds.iter().find(|(_, s)| defined.contains(s)) {
        return Err(JitError::InvalidGraph(format!(
            "seed name '{clash}' already used by the graph"
        )));
    }
    let grads = differentiate(graph, &seeds, wrt)?;

    let mut forward = graph.clone();
    forward.set_name(format!("{}_forward", graph.name()));
    let mut forward_outputs = graph.outputs().to_vec();
    forward_outputs.extend(grads.retained.iter().cloned());
    forward.set_outputs(forward_outputs);

    let kind_of = |name: &str| kinds.get(name).copied().unwrap_or(ValueKind::Any);
    let mut backward = Graph::new(format!("{}_backward", graph.name()));
    for (output, seed) in &seeds {
        backward.add_input(seed.clone(), kind_of(output));
    }
    for name in &grads.retained {
        backward.add_input(name.clone(), kind_of(name));
    }
    for (name, value) in graph.initializers() {
        if graph.input(name).is_none() {
            backward.add_initializer(name.clone(), value.clone());
        }
    }
    for node in grads.nodes {
        backward.add_node(node.op, node.inputs, node.output);
    }
    for output in grads.outputs {
        backward.add_output(output);
    }

    debug!(
        graph = graph.name(),
        retained = grads.retained.len(),
        forward_nodes = forward.len(),
        backward_nodes = backward.len(),
        "split graph for backward"
    );
    Ok((forward, backward))
}

/// Builds one graph computing the outputs of `graph` and the gradients of
/// `wrt`, seeding every output with ones.
pub fn with_backprop(graph: &Graph, wrt: &[String]) -> JitResult<Graph> {
    graph.validate()?;
    let defined = defined_names(graph);
    let mut fused = graph.clone();
    fused.set_name(format!("{}_backprop", graph.name()));

    let mut seeds = Vec::with_capacity(graph.outputs().len());
    for output in graph.outputs() {
        let seed = grad_in_name(output);
        if defined.contains(&seed) {
            return Err(JitError::InvalidGraph(format!(
                "seed name '{seed}' already used by the graph"
            )));
        }
        fused.add_node(Op::OnesLike, vec![output.clone()], seed.clone());
        seeds.push((output.clone(), seed));
    }

    let grads = differentiate(graph, &seeds, wrt)?;
    for node in grads.nodes {
        fused.add_node(node.op, node.inputs, node.output);
    }
    for output in grads.outputs {
        fused.add_output(output);
    }
    debug!(graph = graph.name(), nodes = fused.len(), "built backprop graph");
    Ok(fused)
}

// =============================================================================
// Tests
// =============================================================================
