//! Translators
//!
//! Capture a dynamic model into an interchange document. Two formats are
//! supported, differing in how parameters are named and how the document is
//! encoded:
//!
//! | Translator | Inputs      | Parameters              | Encoding |
//! |------------|-------------|-------------------------|----------|
//! | `trace`    | `input_{i}` | `/predictor/l1/W`       | JSON     |
//! | `onnx`     | `Input_{i}` | `param_predictor_l1_W`  | protobuf |
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;
use std::str::FromStr;

use graftml_autograd::Variable;
use graftml_core::Structure;
use graftml_jit::{Graph, ParamNaming, Tracer, ValueKind};
use graftml_nn::Model;
use graftml_onnx::{export_model, Encoding};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};

/// Source format of the compiled graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Translator {
    /// Traced graph with path-named parameters.
    #[default]
    Trace,
    /// Export-style graph with initializers.
    Onnx,
}

impl Translator {
    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Onnx => "onnx",
        }
    }

    /// Parameter naming used in the captured graph.
    pub fn naming(self) -> ParamNaming {
        match self {
            Self::Trace => ParamNaming::Path,
            Self::Onnx => ParamNaming::Export,
        }
    }

    /// Document encoding.
    pub fn encoding(self) -> Encoding {
        match self {
            Self::Trace => Encoding::Json,
            Self::Onnx => Encoding::Protobuf,
        }
    }

    /// Graph name of the `index`-th model input.
    pub fn input_name(self, index: usize) -> String {
        match self {
            Self::Trace => format!("input_{index}"),
            Self::Onnx => format!("Input_{index}"),
        }
    }

    /// Graph name of the parameter at host path `path`.
    pub fn param_name(self, path: &str) -> String {
        self.naming().name(path)
    }

    /// Records `model` applied to inputs shaped like `sample`.
    pub fn capture<M: Model + ?Sized>(
        self,
        model: &M,
        sample: &[Structure<Variable>],
    ) -> BridgeResult<Graph> {
        let mut tracer = Tracer::new("compiled_model", self.naming());
        let inputs: Vec<_> = sample
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let kind = if value.is_leaf() {
                    ValueKind::Tensor
                } else {
                    ValueKind::Sequence
                };
                let symbol = tracer.input(self.input_name(i), kind);
                tracer.unpack(&symbol, &value.template())
            })
            .collect();

        let outputs = model.trace(&mut tracer, &inputs)?;
        for (i, output) in outputs.iter().enumerate() {
            let symbol = tracer.pack(output);
            tracer.output(format!("output_{i}"), &symbol);
        }
        Ok(tracer.finish())
    }

    /// Captures `model` and writes the document to a temporary file.
    ///
    /// The file is deleted when the returned handle is dropped.
    pub fn translate<M: Model + ?Sized>(
        self,
        model: &M,
        sample: &[Structure<Variable>],
    ) -> BridgeResult<NamedTempFile> {
        let graph = self.capture(model, sample)?;
        let file = NamedTempFile::new()?;
        export_model(&graph.to_proto(), file.path(), self.encoding())?;
        let bytes = file.as_file().metadata()?.len();
        debug!(
            translator = self.name(),
            path = %file.path().display(),
            bytes,
            nodes = graph.len(),
            "translated model"
        );
        Ok(file)
    }
}

impl FromStr for Translator {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(Self::Trace),
            "onnx" => Ok(Self::Onnx),
            other => Err(BridgeError::UnsupportedTranslator {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use graftml_jit::{Compiler, GraphCompiler};
    use graftml_nn::{Classifier, Mlp};
    use graftml_tensor::Tensor;

    fn sample() -> Vec<Structure<Variable>> {
        vec![
            Structure::leaf(Variable::constant(Tensor::ones(&[4, 6]))),
            Structure::leaf(Variable::constant(Tensor::zeros(&[4]))),
        ]
    }

    #[test]
    fn test_from_str() {
        assert_eq!("trace".parse::<Translator>().unwrap(), Translator::Trace);
        assert_eq!("onnx".parse::<Translator>().unwrap(), Translator::Onnx);
        let err = "chainer".parse::<Translator>().unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedTranslator { name } if name == "chainer"));
    }

    #[test]
    fn test_param_names() {
        assert_eq!(Translator::Trace.param_name("/predictor/l1/W"), "/predictor/l1/W");
        assert_eq!(
            Translator::Onnx.param_name("/predictor/l1/W"),
            "param_predictor_l1_W"
        );
    }

    #[test]
    fn test_capture_names() {
        let model = Classifier::new(Mlp::new(6, 5, 3));
        for translator in [Translator::Trace, Translator::Onnx] {
            let graph = translator.capture(&model, &sample()).unwrap();
            assert_eq!(
                graph.input_names(),
                vec![translator.input_name(0), translator.input_name(1)]
            );
            assert_eq!(graph.param_names()[0], translator.param_name("/predictor/l1/W"));
            assert_eq!(graph.outputs(), &["output_0".to_string(), "output_1".to_string()]);
        }
    }

    #[test]
    fn test_translate_then_load() {
        let model = Classifier::new(Mlp::new(6, 5, 3));
        for translator in [Translator::Trace, Translator::Onnx] {
            let file = translator.translate(&model, &sample()).unwrap();
            let graph = Compiler::new().load(file.path()).unwrap();
            assert_eq!(graph.param_names().len(), 6);
            assert_eq!(graph.output_names().len(), 2);
            let path = file.path().to_path_buf();
            drop(file);
            assert!(!path.exists());
        }
    }
}
