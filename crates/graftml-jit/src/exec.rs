//! Graph Interpreter
//!
//! Executes a graph node by node over named runtime values.

use std::collections::HashMap;

use graftml_core::{Device, Structure};
use graftml_tensor::ops::nn;
use graftml_tensor::Tensor;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::compile::Executable;
use crate::error::{JitError, JitResult};
use crate::ir::{Graph, Op, Value, ValueKind};

/// An executable graph.
#[derive(Debug, Clone)]
pub struct Program {
    graph: Graph,
}

impl Program {
    /// Wraps a graph for execution.
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Returns the executed graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    fn bind_inputs(&self, inputs: &HashMap<String, Value>) -> JitResult<FxHashMap<String, Value>> {
        let device = self
            .graph
            .inputs()
            .iter()
            .find_map(|i| inputs.get(&i.name))
            .and_then(|v| v.leaves().first().map(|t| t.device()))
            .unwrap_or(Device::Cpu);

        let mut env: FxHashMap<String, Value> = self
            .graph
            .initializers()
            .iter()
            .map(|(name, t)| (name.clone(), Structure::leaf(t.to_device(device))))
            .collect();

        for info in self.graph.inputs() {
            let value = match inputs.get(&info.name) {
                Some(value) => value.clone(),
                None if env.contains_key(&info.name) => continue,
                None => return Err(JitError::InputNotFound(info.name.clone())),
            };
            let kind = ValueKind::of(&value);
            if !info.kind.accepts(kind) {
                return Err(JitError::TypeMismatch {
                    expected: format!("{} for input '{}'", info.kind, info.name),
                    found: kind.to_string(),
                });
            }
            env.insert(info.name.clone(), value);
        }
        Ok(env)
    }
}

impl Executable for Program {
    fn run(&self, inputs: &HashMap<String, Value>) -> JitResult<HashMap<String, Value>> {
        let mut env = self.bind_inputs(inputs)?;
        for node in self.graph.nodes() {
            let args = node
                .inputs
                .iter()
                .map(|name| {
                    env.get(name)
                        .ok_or_else(|| JitError::RuntimeError(format!("value '{name}' not computed")))
                })
                .collect::<JitResult<Vec<&Value>>>()?;
            let value = eval(&node.op, &args)?;
            trace!(op = node.op.name(), output = %node.output, "evaluated node");
            env.insert(node.output.clone(), value);
        }

        self.graph
            .outputs()
            .iter()
            .map(|name| {
                env.get(name)
                    .cloned()
                    .map(|v| (name.clone(), v))
                    .ok_or_else(|| JitError::OutputNotFound(name.clone()))
            })
            .collect()
    }
}

// =============================================================================
// Kernels
// =============================================================================

fn tensor<'a>(op: &Op, value: &'a Value) -> JitResult<&'a Tensor> {
    value.as_leaf().ok_or_else(|| JitError::TypeMismatch {
        expected: format!("tensor input to {}", op.name()),
        found: ValueKind::Sequence.to_string(),
    })
}

fn elements<'a>(op: &Op, value: &'a Value) -> JitResult<&'a [Value]> {
    value.children().ok_or_else(|| JitError::TypeMismatch {
        expected: format!("sequence input to {}", op.name()),
        found: ValueKind::Tensor.to_string(),
    })
}

fn add_values(a: &Value, b: &Value) -> JitResult<Value> {
    match (a, b) {
        (Structure::Leaf(x), Structure::Leaf(y)) => Ok(Structure::leaf(x.add(y)?)),
        (Structure::Branch(xs), Structure::Branch(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| add_values(x, y))
            .collect::<JitResult<Vec<_>>>()
            .map(Structure::branch),
        _ => Err(JitError::TypeMismatch {
            expected: format!("operand shaped {}", a.outline()),
            found: b.outline(),
        }),
    }
}

fn eval(op: &Op, args: &[&Value]) -> JitResult<Value> {
    let leaf = |t: Tensor| -> JitResult<Value> { Ok(Structure::leaf(t)) };
    match op {
        Op::Gemm => {
            let bias = args.get(2).map(|b| tensor(op, b)).transpose()?;
            leaf(nn::linear(tensor(op, args[0])?, tensor(op, args[1])?, bias)?)
        }
        Op::Relu => leaf(tensor(op, args[0])?.relu()),
        Op::Add => add_values(args[0], args[1]),
        Op::Mul => leaf(tensor(op, args[0])?.mul(tensor(op, args[1])?)?),
        Op::Scale { alpha } => leaf(tensor(op, args[0])?.scale(*alpha)),
        Op::Sum => leaf(tensor(op, args[0])?.sum_all()),
        Op::SoftmaxCrossEntropy => leaf(nn::softmax_cross_entropy(
            tensor(op, args[0])?,
            tensor(op, args[1])?,
        )?),
        Op::Accuracy => leaf(nn::accuracy(tensor(op, args[0])?, tensor(op, args[1])?)?),
        Op::Identity => Ok(args[0].clone()),
        Op::SequenceConstruct => Ok(Structure::branch(
            args.iter().map(|v| (*v).clone()).collect(),
        )),
        Op::SequenceAt { index } => {
            let items = elements(op, args[0])?;
            items.get(*index).cloned().ok_or_else(|| {
                JitError::RuntimeError(format!(
                    "SequenceAt index {index} out of range for sequence of {}",
                    items.len()
                ))
            })
        }
        Op::ReluGrad => leaf(tensor(op, args[1])?.relu_backward(tensor(op, args[0])?)?),
        Op::GemmGradInput => leaf(nn::linear_grad_input(
            tensor(op, args[0])?,
            tensor(op, args[1])?,
        )?),
        Op::GemmGradWeight => leaf(nn::linear_grad_weight(
            tensor(op, args[0])?,
            tensor(op, args[1])?,
        )?),
        Op::SumRows => leaf(nn::linear_grad_bias(tensor(op, args[0])?)?),
        Op::SoftmaxCrossEntropyGrad => leaf(nn::softmax_cross_entropy_grad(
            tensor(op, args[0])?,
            tensor(op, args[1])?,
            tensor(op, args[2])?,
        )?),
        Op::Expand => {
            let gy = tensor(op, args[0])?.item()?;
            let like = tensor(op, args[1])?;
            leaf(Tensor::full(like.shape(), gy).to_device(like.device()))
        }
        Op::OnesLike => Ok(args[0].map(Tensor::ones_like)),
        Op::ZerosLike => Ok(args[0].map(Tensor::zeros_like)),
        Op::SequenceGradAt { index } => {
            let items = elements(op, args[1])?;
            if *index >= items.len() {
                return Err(JitError::RuntimeError(format!(
                    "SequenceGradAt index {index} out of range for sequence of {}",
                    items.len()
                )));
            }
            Ok(Structure::branch(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        if i == *index {
                            args[0].clone()
                        } else {
                            item.map(Tensor::zeros_like)
                        }
                    })
                    .collect(),
            ))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
