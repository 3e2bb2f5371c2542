//! Model Tracing
//!
//! Records the operations a model performs into a [`Graph`]. Models drive
//! the tracer explicitly with [`Symbol`]s standing in for tensors.

use graftml_core::{Structure, Template};
use graftml_tensor::Tensor;
use rustc_hash::FxHashSet;

use crate::ir::{Graph, Op, ValueKind};

// =============================================================================
// Parameter Naming
// =============================================================================

/// How parameter paths are turned into graph value names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamNaming {
    /// The host path itself, e.g. `/predictor/l1/W`.
    #[default]
    Path,
    /// Export style, e.g. `param_predictor_l1_W`, with the current value
    /// stored as an initializer.
    Export,
}

impl ParamNaming {
    /// Graph value name for the parameter at `path`.
    pub fn name(self, path: &str) -> String {
        match self {
            Self::Path => path.to_string(),
            Self::Export => format!("param{}", path.replace('/', "_")),
        }
    }
}

// =============================================================================
// Symbols
// =============================================================================

/// A traced value, named after the graph value it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Returns the graph value name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

// =============================================================================
// Tracer
// =============================================================================

/// Builds a graph from explicit operation calls.
#[derive(Debug)]
pub struct Tracer {
    graph: Graph,
    naming: ParamNaming,
    params: FxHashSet<String>,
    counter: usize,
}

impl Tracer {
    /// Creates a tracer for a graph called `name`.
    pub fn new(name: impl Into<String>, naming: ParamNaming) -> Self {
        Self {
            graph: Graph::new(name),
            naming,
            params: FxHashSet::default(),
            counter: 0,
        }
    }

    /// Returns the parameter naming in use.
    pub fn naming(&self) -> ParamNaming {
        self.naming
    }

    fn fresh(&mut self, op: &Op) -> String {
        self.counter += 1;
        format!("{}_{}", op.name().to_lowercase(), self.counter)
    }

    fn emit(&mut self, op: Op, inputs: &[&Symbol]) -> Symbol {
        let output = self.fresh(&op);
        let inputs = inputs.iter().map(|s| s.0.clone()).collect();
        self.graph.add_node(op, inputs, output.clone());
        Symbol(output)
    }

    // =========================================================================
    // Inputs and Parameters
    // =========================================================================

    /// Declares a data input.
    pub fn input(&mut self, name: impl Into<String>, kind: ValueKind) -> Symbol {
        let name = name.into();
        self.graph.add_input(name.clone(), kind);
        Symbol(name)
    }

    /// Declares the parameter at `path`, once.
    pub fn param(&mut self, path: &str, value: &Tensor) -> Symbol {
        let name = self.naming.name(path);
        if self.params.insert(name.clone()) {
            self.graph.add_param(name.clone());
            if self.naming == ParamNaming::Export {
                self.graph.add_initializer(name.clone(), value.clone());
            }
        }
        Symbol(name)
    }

    /// Splits a sequence symbol into a structure shaped like `template`.
    pub fn unpack(&mut self, seq: &Symbol, template: &Template) -> Structure<Symbol> {
        match template.children() {
            None => Structure::leaf(seq.clone()),
            Some(children) => Structure::branch(
                children
                    .iter()
                    .enumerate()
                    .map(|(index, child)| {
                        let element = self.sequence_at(seq, index);
                        self.unpack(&element, child)
                    })
                    .collect(),
            ),
        }
    }

    /// Packs a structure of symbols into a single (sequence) symbol.
    pub fn pack(&mut self, value: &Structure<Symbol>) -> Symbol {
        match value {
            Structure::Leaf(symbol) => symbol.clone(),
            Structure::Branch(children) => {
                let elements: Vec<Symbol> = children.iter().map(|c| self.pack(c)).collect();
                let refs: Vec<&Symbol> = elements.iter().collect();
                self.emit(Op::SequenceConstruct, &refs)
            }
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// `x Wᵀ (+ b)`.
    pub fn gemm(&mut self, x: &Symbol, weight: &Symbol, bias: Option<&Symbol>) -> Symbol {
        match bias {
            Some(b) => self.emit(Op::Gemm, &[x, weight, b]),
            None => self.emit(Op::Gemm, &[x, weight]),
        }
    }

    /// Rectified linear unit.
    pub fn relu(&mut self, x: &Symbol) -> Symbol {
        self.emit(Op::Relu, &[x])
    }

    /// Element-wise sum.
    pub fn add(&mut self, a: &Symbol, b: &Symbol) -> Symbol {
        self.emit(Op::Add, &[a, b])
    }

    /// Element-wise product.
    pub fn mul(&mut self, a: &Symbol, b: &Symbol) -> Symbol {
        self.emit(Op::Mul, &[a, b])
    }

    /// Multiplication by a constant.
    pub fn scale(&mut self, x: &Symbol, alpha: f32) -> Symbol {
        self.emit(Op::Scale { alpha }, &[x])
    }

    /// Sum of all elements.
    pub fn sum(&mut self, x: &Symbol) -> Symbol {
        self.emit(Op::Sum, &[x])
    }

    /// Mean softmax cross entropy.
    pub fn softmax_cross_entropy(&mut self, logits: &Symbol, labels: &Symbol) -> Symbol {
        self.emit(Op::SoftmaxCrossEntropy, &[logits, labels])
    }

    /// Classification accuracy.
    pub fn accuracy(&mut self, logits: &Symbol, labels: &Symbol) -> Symbol {
        self.emit(Op::Accuracy, &[logits, labels])
    }

    /// One element of a sequence.
    pub fn sequence_at(&mut self, seq: &Symbol, index: usize) -> Symbol {
        self.emit(Op::SequenceAt { index }, &[seq])
    }

    /// Packs values into a sequence.
    pub fn sequence_construct(&mut self, elements: &[&Symbol]) -> Symbol {
        self.emit(Op::SequenceConstruct, elements)
    }

    // =========================================================================
    // Outputs
    // =========================================================================

    /// Exposes `value` as the graph output `name`.
    pub fn output(&mut self, name: impl Into<String>, value: &Symbol) {
        let name = name.into();
        self.graph
            .add_node(Op::Identity, vec![value.0.clone()], name.clone());
        self.graph.add_output(name);
    }

    /// Finishes tracing.
    pub fn finish(self) -> Graph {
        self.graph
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_naming() {
        assert_eq!(ParamNaming::Path.name("/predictor/l1/W"), "/predictor/l1/W");
        assert_eq!(
            ParamNaming::Export.name("/predictor/l1/W"),
            "param_predictor_l1_W"
        );
    }

    #[test]
    fn test_trace_linear() {
        let mut tracer = Tracer::new("linear", ParamNaming::Path);
        let x = tracer.input("input_0", ValueKind::Tensor);
        let w = tracer.param("/W", &Tensor::zeros(&[2, 3]));
        let b = tracer.param("/b", &Tensor::zeros(&[2]));
        let y = tracer.gemm(&x, &w, Some(&b));
        let y = tracer.relu(&y);
        tracer.output("output_0", &y);
        let graph = tracer.finish();

        assert_eq!(graph.input_names(), vec!["input_0".to_string()]);
        assert_eq!(graph.param_names(), vec!["/W".to_string(), "/b".to_string()]);
        assert_eq!(graph.outputs(), &["output_0".to_string()]);
        assert!(graph.initializers().is_empty());
        graph.validate().unwrap();
    }

    #[test]
    fn test_export_params_are_initialized_once() {
        let mut tracer = Tracer::new("shared", ParamNaming::Export);
        let x = tracer.input("Input_0", ValueKind::Tensor);
        let w = Tensor::ones(&[3, 3]);
        let p1 = tracer.param("/l/W", &w);
        let p2 = tracer.param("/l/W", &w);
        assert_eq!(p1, p2);
        let h = tracer.gemm(&x, &p1, None);
        let y = tracer.gemm(&h, &p2, None);
        tracer.output("output_0", &y);
        let graph = tracer.finish();

        assert_eq!(graph.param_names(), vec!["param_l_W".to_string()]);
        assert!(graph.initializers().contains_key("param_l_W"));
    }

    #[test]
    fn test_unpack_and_pack() {
        let mut tracer = Tracer::new("seq", ParamNaming::Path);
        let xs = tracer.input("input_0", ValueKind::Sequence);
        let template = Structure::branch(vec![
            Structure::leaf(()),
            Structure::branch(vec![Structure::leaf(()), Structure::leaf(())]),
        ]);
        let parts = tracer.unpack(&xs, &template);
        assert_eq!(parts.template(), template);
        let packed = tracer.pack(&parts);
        tracer.output("output_0", &packed);
        let graph = tracer.finish();
        let kinds = graph.validate().unwrap();
        assert_eq!(kinds["output_0"], ValueKind::Sequence);
    }
}
