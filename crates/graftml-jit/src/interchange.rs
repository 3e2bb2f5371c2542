//! Interchange Conversion
//!
//! Converts between the IR and the interchange document.

use graftml_onnx::proto::{KIND_ANY, KIND_SEQUENCE, KIND_TENSOR};
use graftml_onnx::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OnnxError, TensorProto, ValueInfoProto,
};
use graftml_tensor::Tensor;

use crate::error::{JitError, JitResult};
use crate::ir::{is_param_name, Graph, Op, ValueInfo, ValueKind};

impl Graph {
    /// Builds a graph from an interchange document.
    ///
    /// Declared inputs that carry an initializer, or whose name is a
    /// `/`-rooted path, become parameters.
    pub fn from_proto(model: &ModelProto) -> JitResult<Self> {
        let proto = model
            .graph
            .as_ref()
            .ok_or_else(|| JitError::InvalidGraph("document has no graph".to_string()))?;

        let mut graph = Graph::new(proto.name.clone());
        for init in &proto.initializer {
            graph.add_initializer(init.name.clone(), tensor_from_proto(init)?);
        }
        for input in &proto.input {
            let has_initializer = graph.initializers().contains_key(&input.name);
            graph.declare(ValueInfo {
                name: input.name.clone(),
                kind: kind_from_proto(input)?,
                param: is_param_name(&input.name, has_initializer),
            });
        }
        for node in &proto.node {
            let output = match node.output.as_slice() {
                [output] => output.clone(),
                outputs => {
                    return Err(JitError::InvalidGraph(format!(
                        "{} node has {} outputs, expected 1",
                        node.op_type,
                        outputs.len()
                    )))
                }
            };
            graph.add_node(op_from_proto(node)?, node.input.clone(), output);
        }
        for output in &proto.output {
            graph.add_output(output.name.clone());
        }
        Ok(graph)
    }

    /// Converts the graph into an interchange document.
    pub fn to_proto(&self) -> ModelProto {
        let mut initializer: Vec<TensorProto> = self
            .initializers()
            .iter()
            .map(|(name, t)| TensorProto::float(name, t.shape(), t.to_vec()))
            .collect();
        initializer.sort_by(|a, b| a.name.cmp(&b.name));

        let graph = GraphProto {
            node: self.nodes().iter().map(|n| op_to_proto(&n.op, &n.inputs, &n.output)).collect(),
            name: self.name().to_string(),
            initializer,
            input: self
                .inputs()
                .iter()
                .map(|i| ValueInfoProto {
                    name: i.name.clone(),
                    kind: kind_to_proto(i.kind),
                })
                .collect(),
            output: self
                .outputs()
                .iter()
                .map(|o| ValueInfoProto::tensor(o))
                .collect(),
        };
        ModelProto::new(graph)
    }
}

fn kind_from_proto(info: &ValueInfoProto) -> JitResult<ValueKind> {
    match info.kind {
        KIND_TENSOR => Ok(ValueKind::Tensor),
        KIND_SEQUENCE => Ok(ValueKind::Sequence),
        KIND_ANY => Ok(ValueKind::Any),
        other => Err(JitError::InvalidGraph(format!(
            "input '{}' has unknown kind {other}",
            info.name
        ))),
    }
}

fn kind_to_proto(kind: ValueKind) -> i32 {
    match kind {
        ValueKind::Tensor => KIND_TENSOR,
        ValueKind::Sequence => KIND_SEQUENCE,
        ValueKind::Any => KIND_ANY,
    }
}

fn tensor_from_proto(proto: &TensorProto) -> JitResult<Tensor> {
    let shape = proto.shape().ok_or_else(|| {
        OnnxError::TensorConversion(format!("initializer '{}' has negative dims", proto.name))
    })?;
    if proto.float_data.len() != proto.numel() {
        return Err(OnnxError::TensorConversion(format!(
            "initializer '{}' has {} values for shape {shape:?}",
            proto.name,
            proto.float_data.len()
        ))
        .into());
    }
    Ok(Tensor::from_vec(proto.float_data.clone(), &shape)?)
}

fn index_attribute(node: &NodeProto) -> JitResult<usize> {
    let index = node.get_int("index").ok_or_else(|| OnnxError::MissingAttribute {
        op_type: node.op_type.clone(),
        attribute: "index".to_string(),
    })?;
    usize::try_from(index)
        .map_err(|_| JitError::InvalidGraph(format!("{} index {index} is negative", node.op_type)))
}

fn op_from_proto(node: &NodeProto) -> JitResult<Op> {
    let op = match node.op_type.as_str() {
        "Gemm" => Op::Gemm,
        "Relu" => Op::Relu,
        "Add" => Op::Add,
        "Mul" => Op::Mul,
        "Scale" => Op::Scale {
            alpha: node.get_float("alpha").ok_or_else(|| OnnxError::MissingAttribute {
                op_type: node.op_type.clone(),
                attribute: "alpha".to_string(),
            })?,
        },
        "Sum" => Op::Sum,
        "SoftmaxCrossEntropy" => Op::SoftmaxCrossEntropy,
        "Accuracy" => Op::Accuracy,
        "Identity" => Op::Identity,
        "SequenceConstruct" => Op::SequenceConstruct,
        "SequenceAt" => Op::SequenceAt {
            index: index_attribute(node)?,
        },
        "ReluGrad" => Op::ReluGrad,
        "GemmGradInput" => Op::GemmGradInput,
        "GemmGradWeight" => Op::GemmGradWeight,
        "SumRows" => Op::SumRows,
        "SoftmaxCrossEntropyGrad" => Op::SoftmaxCrossEntropyGrad,
        "Expand" => Op::Expand,
        "OnesLike" => Op::OnesLike,
        "ZerosLike" => Op::ZerosLike,
        "SequenceGradAt" => Op::SequenceGradAt {
            index: index_attribute(node)?,
        },
        other => return Err(JitError::UnsupportedOp(other.to_string())),
    };
    Ok(op)
}

fn op_to_proto(op: &Op, inputs: &[String], output: &str) -> NodeProto {
    let node = NodeProto::new(op.name(), inputs, output);
    match op {
        Op::Scale { alpha } => node.with_attribute(AttributeProto::float("alpha", *alpha)),
        Op::SequenceAt { index } | Op::SequenceGradAt { index } => {
            node.with_attribute(AttributeProto::int("index", *index as i64))
        }
        _ => node,
    }
}

// =============================================================================
// Tests
// =============================================================================
