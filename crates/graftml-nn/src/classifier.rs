//! Classifier - Loss and Accuracy Wrapper
//!
//! Wraps a predictor and reports softmax cross entropy and accuracy for a
//! batch of inputs and integer class labels. The predictor's parameters
//! live under `/predictor`.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use graftml_autograd::functions;
use graftml_autograd::{AutogradError, AutogradResult, Variable};
use graftml_core::Structure;
use graftml_jit::{JitError, JitResult, Symbol, Tracer};

use crate::module::{leaf_inputs, Model, Module};

const PREDICTOR: &str = "/predictor";

/// Inputs `[x, labels]`, outputs `[loss, accuracy]`.
pub struct Classifier<M> {
    predictor: M,
}

impl<M: Module> Classifier<M> {
    /// Wraps `predictor`.
    pub fn new(predictor: M) -> Self {
        Self { predictor }
    }

    /// Returns the wrapped predictor.
    pub fn predictor(&self) -> &M {
        &self.predictor
    }
}

impl<M: Module> Model for Classifier<M> {
    fn forward(&self, inputs: &[Structure<Variable>]) -> AutogradResult<Vec<Structure<Variable>>> {
        let args = leaf_inputs("Classifier", inputs, 2).map_err(AutogradError::InvalidInput)?;
        let logits = self.predictor.forward(args[0])?;
        let loss = functions::softmax_cross_entropy(&logits, args[1])?;
        let accuracy = functions::accuracy(&logits, args[1])?;
        Ok(vec![Structure::leaf(loss), Structure::leaf(accuracy)])
    }

    fn trace(
        &self,
        tracer: &mut Tracer,
        inputs: &[Structure<Symbol>],
    ) -> JitResult<Vec<Structure<Symbol>>> {
        let args = leaf_inputs("Classifier", inputs, 2).map_err(JitError::InvalidGraph)?;
        let logits = self.predictor.trace(tracer, PREDICTOR, args[0]);
        let loss = tracer.softmax_cross_entropy(&logits, args[1]);
        let accuracy = tracer.accuracy(&logits, args[1]);
        Ok(vec![Structure::leaf(loss), Structure::leaf(accuracy)])
    }

    fn named_parameters(&self) -> Vec<(String, Variable)> {
        self.predictor.named_parameters(PREDICTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mlp;
    use graftml_jit::{ParamNaming, ValueKind};
    use graftml_tensor::Tensor;

    fn batch() -> Vec<Structure<Variable>> {
        let x = Tensor::from_vec(vec![0.5, -1.0, 1.5, 2.0, 0.0, -0.5], &[2, 3]).unwrap();
        let t = Tensor::from_vec(vec![1.0, 0.0], &[2]).unwrap();
        vec![
            Structure::leaf(Variable::constant(x)),
            Structure::leaf(Variable::constant(t)),
        ]
    }

    #[test]
    fn test_classifier_outputs() {
        let model = Classifier::new(Mlp::new(3, 4, 2));
        let outputs = model.forward(&batch()).unwrap();
        assert_eq!(outputs.len(), 2);
        let loss = outputs[0].as_leaf().unwrap();
        assert!(loss.requires_grad());
        assert!(loss.data().item().unwrap() > 0.0);
        let accuracy = outputs[1].as_leaf().unwrap().data().item().unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
    }

    #[test]
    fn test_classifier_backward_reaches_parameters() {
        let model = Classifier::new(Mlp::new(3, 4, 2));
        let outputs = model.forward(&batch()).unwrap();
        outputs[0].as_leaf().unwrap().backward().unwrap();
        for (name, param) in model.named_parameters() {
            assert!(param.grad().is_some(), "no gradient for {name}");
        }
    }

    #[test]
    fn test_classifier_parameter_paths() {
        let model = Classifier::new(Mlp::new(3, 4, 2));
        let names: Vec<String> = model.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names[0], "/predictor/l1/W");
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn test_classifier_trace() {
        let model = Classifier::new(Mlp::new(3, 4, 2));
        let mut tracer = Tracer::new("classifier", ParamNaming::Path);
        let inputs = vec![
            Structure::leaf(tracer.input("input_0", ValueKind::Tensor)),
            Structure::leaf(tracer.input("input_1", ValueKind::Tensor)),
        ];
        let outputs = model.trace(&mut tracer, &inputs).unwrap();
        assert_eq!(outputs.len(), 2);
        let graph = tracer.finish();
        assert_eq!(graph.param_names()[0], "/predictor/l1/W");
    }

    #[test]
    fn test_classifier_input_arity() {
        let model = Classifier::new(Mlp::new(3, 4, 2));
        let err = model.forward(&batch()[..1]).unwrap_err();
        assert!(err.to_string().contains("expects 2 inputs"));
    }
}
