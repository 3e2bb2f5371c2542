//! Intermediate Representation
//!
//! Defines the name-based dataflow IR the compiler works on. Every node
//! produces exactly one named value; inputs refer to graph inputs,
//! initializers or earlier node outputs by name.

use std::fmt;
use std::fmt::Write as _;

use graftml_core::Structure;
use graftml_tensor::Tensor;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{JitError, JitResult};

/// A runtime value: a tensor or a (nested) sequence of values.
pub type Value = Structure<Tensor>;

// =============================================================================
// Value Kinds
// =============================================================================

/// Static kind of a named value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Dense tensor.
    Tensor,
    /// Sequence of values.
    Sequence,
    /// Not known statically (an element taken out of a sequence).
    Any,
}

impl ValueKind {
    /// Kind of a runtime value.
    pub fn of(value: &Value) -> Self {
        if value.is_leaf() {
            Self::Tensor
        } else {
            Self::Sequence
        }
    }

    /// Returns true if a value of kind `found` may be used where `self` is required.
    pub fn accepts(self, found: Self) -> bool {
        self == Self::Any || found == Self::Any || self == found
    }
}

impl Default for ValueKind {
    fn default() -> Self {
        Self::Tensor
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tensor => write!(f, "tensor"),
            Self::Sequence => write!(f, "sequence"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// A declared graph input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueInfo {
    /// Value name.
    pub name: String,
    /// Declared kind.
    pub kind: ValueKind,
    /// Whether the value is a trainable parameter.
    pub param: bool,
}

/// Parameter rule for loaded graphs: a value with an initializer, or whose
/// name is a `/`-rooted path, is a parameter.
pub fn is_param_name(name: &str, has_initializer: bool) -> bool {
    has_initializer || name.starts_with('/')
}

// =============================================================================
// Operations
// =============================================================================

/// Graph operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// `x Wᵀ (+ b)`; inputs `[x, W]` or `[x, W, b]`.
    Gemm,
    /// Rectified linear unit.
    Relu,
    /// Element-wise sum; tensors or equally long sequences.
    Add,
    /// Element-wise product.
    Mul,
    /// Multiplication by a constant.
    Scale {
        /// The constant.
        alpha: f32,
    },
    /// Sum of all elements.
    Sum,
    /// Mean softmax cross entropy; inputs `[logits, labels]`.
    SoftmaxCrossEntropy,
    /// Classification accuracy; inputs `[logits, labels]`.
    Accuracy,
    /// Copies its input.
    Identity,
    /// Packs its inputs into a sequence.
    SequenceConstruct,
    /// Takes one element of a sequence.
    SequenceAt {
        /// Element index.
        index: usize,
    },

    /// ReLU gradient; inputs `[gy, x]`.
    ReluGrad,
    /// Gemm gradient for `x`; inputs `[gy, W]`.
    GemmGradInput,
    /// Gemm gradient for `W`; inputs `[gy, x]`.
    GemmGradWeight,
    /// Sum over rows (Gemm gradient for `b`).
    SumRows,
    /// Softmax cross entropy gradient; inputs `[gy, logits, labels]`.
    SoftmaxCrossEntropyGrad,
    /// Broadcasts a scalar to the shape of a value; inputs `[gy, like]`.
    Expand,
    /// Ones shaped like the input (tensor or sequence).
    OnesLike,
    /// Zeros shaped like the input (tensor or sequence).
    ZerosLike,
    /// Sequence shaped like `seq` holding `gy` at `index` and zeros
    /// elsewhere; inputs `[gy, seq]`.
    SequenceGradAt {
        /// Element index.
        index: usize,
    },
}

impl Op {
    /// Operator name as written in interchange documents.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemm => "Gemm",
            Self::Relu => "Relu",
            Self::Add => "Add",
            Self::Mul => "Mul",
            Self::Scale { .. } => "Scale",
            Self::Sum => "Sum",
            Self::SoftmaxCrossEntropy => "SoftmaxCrossEntropy",
            Self::Accuracy => "Accuracy",
            Self::Identity => "Identity",
            Self::SequenceConstruct => "SequenceConstruct",
            Self::SequenceAt { .. } => "SequenceAt",
            Self::ReluGrad => "ReluGrad",
            Self::GemmGradInput => "GemmGradInput",
            Self::GemmGradWeight => "GemmGradWeight",
            Self::SumRows => "SumRows",
            Self::SoftmaxCrossEntropyGrad => "SoftmaxCrossEntropyGrad",
            Self::Expand => "Expand",
            Self::OnesLike => "OnesLike",
            Self::ZerosLike => "ZerosLike",
            Self::SequenceGradAt { .. } => "SequenceGradAt",
        }
    }

    /// Minimum and maximum number of inputs (`None` = unbounded).
    pub fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Self::Gemm => (2, Some(3)),
            Self::SequenceConstruct => (0, None),
            Self::Relu
            | Self::Scale { .. }
            | Self::Sum
            | Self::Identity
            | Self::SequenceAt { .. }
            | Self::SumRows
            | Self::OnesLike
            | Self::ZerosLike => (1, Some(1)),
            Self::SoftmaxCrossEntropyGrad => (3, Some(3)),
            Self::Add
            | Self::Mul
            | Self::SoftmaxCrossEntropy
            | Self::Accuracy
            | Self::ReluGrad
            | Self::GemmGradInput
            | Self::GemmGradWeight
            | Self::Expand
            | Self::SequenceGradAt { .. } => (2, Some(2)),
        }
    }

    /// Returns true for operations only emitted by gradient generation.
    pub fn is_gradient_op(&self) -> bool {
        matches!(
            self,
            Self::ReluGrad
                | Self::GemmGradInput
                | Self::GemmGradWeight
                | Self::SumRows
                | Self::SoftmaxCrossEntropyGrad
                | Self::Expand
                | Self::OnesLike
                | Self::ZerosLike
                | Self::SequenceGradAt { .. }
        )
    }

    fn attributes(&self) -> Option<String> {
        match self {
            Self::Scale { alpha } => Some(format!("alpha={alpha}")),
            Self::SequenceAt { index } | Self::SequenceGradAt { index } => {
                Some(format!("index={index}"))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.attributes() {
            Some(attrs) => write!(f, "{}[{attrs}]", self.name()),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// A node in the computation graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Operation.
    pub op: Op,
    /// Input value names.
    pub inputs: Vec<String>,
    /// Output value name.
    pub output: String,
}

// =============================================================================
// Graph
// =============================================================================

/// Name-based dataflow graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    name: String,
    inputs: Vec<ValueInfo>,
    outputs: Vec<String>,
    nodes: Vec<Node>,
    initializers: FxHashMap<String, Tensor>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declares a data input.
    pub fn add_input(&mut self, name: impl Into<String>, kind: ValueKind) {
        self.declare(ValueInfo {
            name: name.into(),
            kind,
            param: false,
        });
    }

    /// Declares a parameter input.
    pub fn add_param(&mut self, name: impl Into<String>) {
        self.declare(ValueInfo {
            name: name.into(),
            kind: ValueKind::Tensor,
            param: true,
        });
    }

    /// Declares an input.
    pub fn declare(&mut self, info: ValueInfo) {
        self.inputs.push(info);
    }

    /// Stores a default value for an input.
    pub fn add_initializer(&mut self, name: impl Into<String>, value: Tensor) {
        self.initializers.insert(name.into(), value);
    }

    /// Appends a node.
    pub fn add_node(&mut self, op: Op, inputs: Vec<String>, output: impl Into<String>) {
        self.nodes.push(Node {
            op,
            inputs,
            output: output.into(),
        });
    }

    /// Marks a value as a graph output.
    pub fn add_output(&mut self, name: impl Into<String>) {
        self.outputs.push(name.into());
    }

    /// Declared inputs, data and parameters, in declaration order.
    pub fn inputs(&self) -> &[ValueInfo] {
        &self.inputs
    }

    /// Nodes in evaluation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Output names in order.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Initializer values.
    pub fn initializers(&self) -> &FxHashMap<String, Tensor> {
        &self.initializers
    }

    /// Looks up a declared input.
    pub fn input(&self, name: &str) -> Option<&ValueInfo> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Names of data inputs.
    pub fn input_names(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|i| !i.param)
            .map(|i| i.name.clone())
            .collect()
    }

    /// Names of parameter inputs.
    pub fn param_names(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|i| i.param)
            .map(|i| i.name.clone())
            .collect()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn set_outputs(&mut self, outputs: Vec<String>) {
        self.outputs = outputs;
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Checks the graph structurally and infers the kind of every value.
    ///
    /// Every value must be defined exactly once before use, every node must
    /// have a valid number of inputs, and sequence operations must receive
    /// sequences.
    pub fn validate(&self) -> JitResult<FxHashMap<String, ValueKind>> {
        let mut kinds: FxHashMap<String, ValueKind> = FxHashMap::default();
        for info in &self.inputs {
            if kinds.insert(info.name.clone(), info.kind).is_some() {
                return Err(JitError::InvalidGraph(format!(
                    "input '{}' declared twice",
                    info.name
                )));
            }
        }
        for name in self.initializers.keys() {
            kinds.entry(name.clone()).or_insert(ValueKind::Tensor);
        }

        for node in &self.nodes {
            let (min, max) = node.op.arity();
            let n = node.inputs.len();
            if n < min || max.is_some_and(|max| n > max) {
                return Err(JitError::InvalidGraph(format!(
                    "{} node '{}' has {n} inputs",
                    node.op.name(),
                    node.output
                )));
            }
            let mut input_kinds = Vec::with_capacity(n);
            for input in &node.inputs {
                let kind = kinds.get(input).copied().ok_or_else(|| {
                    JitError::InvalidGraph(format!(
                        "{} node '{}' uses undefined value '{input}'",
                        node.op.name(),
                        node.output
                    ))
                })?;
                input_kinds.push(kind);
            }
            let kind = output_kind(&node.op, &input_kinds)?;
            if kinds.insert(node.output.clone(), kind).is_some() {
                return Err(JitError::InvalidGraph(format!(
                    "value '{}' defined twice",
                    node.output
                )));
            }
        }

        for output in &self.outputs {
            if !kinds.contains_key(output) {
                return Err(JitError::OutputNotFound(output.clone()));
            }
        }
        Ok(kinds)
    }

    // =========================================================================
    // Dump
    // =========================================================================

    /// Human-readable listing of the graph.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "graph {} (", self.name);
        for info in &self.inputs {
            let init = if self.initializers.contains_key(&info.name) {
                " = initializer"
            } else {
                ""
            };
            let role = if info.param { " [param]" } else { "" };
            let _ = writeln!(out, "  {}: {}{role}{init}", info.name, info.kind);
        }
        let _ = writeln!(out, ") {{");
        for node in &self.nodes {
            let _ = writeln!(out, "  {} = {}({})", node.output, node.op, node.inputs.join(", "));
        }
        let _ = write!(out, "}} -> ({})", self.outputs.join(", "));
        out
    }
}

fn expect_kind(op: &Op, expected: ValueKind, found: ValueKind) -> JitResult<()> {
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(JitError::TypeMismatch {
            expected: format!("{expected} input to {}", op.name()),
            found: found.to_string(),
        })
    }
}

fn output_kind(op: &Op, inputs: &[ValueKind]) -> JitResult<ValueKind> {
    match op {
        Op::SequenceConstruct => Ok(ValueKind::Sequence),
        Op::SequenceAt { .. } => {
            expect_kind(op, ValueKind::Sequence, inputs[0])?;
            Ok(ValueKind::Any)
        }
        Op::SequenceGradAt { .. } => {
            expect_kind(op, ValueKind::Sequence, inputs[1])?;
            Ok(ValueKind::Sequence)
        }
        Op::Identity | Op::OnesLike | Op::ZerosLike => Ok(inputs[0]),
        Op::Add => {
            expect_kind(op, inputs[0], inputs[1])?;
            Ok(if inputs[0] == ValueKind::Any {
                inputs[1]
            } else {
                inputs[0]
            })
        }
        _ => {
            for kind in inputs {
                expect_kind(op, ValueKind::Tensor, *kind)?;
            }
            Ok(ValueKind::Tensor)
        }
    }
}

/// Names defined anywhere in `graph` (inputs, initializers, node outputs).
pub(crate) fn defined_names(graph: &Graph) -> FxHashSet<String> {
    graph
        .inputs
        .iter()
        .map(|i| i.name.clone())
        .chain(graph.initializers.keys().cloned())
        .chain(graph.nodes.iter().map(|n| n.output.clone()))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
