//! Compile Configuration
//!
//! Options chosen once when a model is wrapped: which translator captures
//! it, which backward strategy runs it, and what gets logged.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::fmt;
use std::str::FromStr;

use graftml_jit::CompileOptions;

use crate::error::BridgeResult;
use crate::translate::Translator;

// =============================================================================
// Strategy
// =============================================================================

/// How gradients of a compiled model are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Separate forward and backward executables; backward runs on demand
    /// with the real output gradients.
    #[default]
    TwoPhase,
    /// One fused executable computes outputs and gradients at forward time,
    /// assuming unit output gradients.
    OnePhase,
}

impl Strategy {
    /// Configuration name.
    pub fn name(self) -> &'static str {
        match self {
            Self::TwoPhase => "two-phase",
            Self::OnePhase => "one-phase",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Config
// =============================================================================

/// Configuration of a [`CompiledModel`](crate::CompiledModel).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileConfig {
    /// Capture format.
    pub translator: Translator,
    /// Backward strategy.
    pub strategy: Strategy,
    /// Log the text dump of every compiled graph.
    pub dump_graphs: bool,
    /// Skip graph validation when compiling executables.
    pub skip_shape_inference: bool,
}

impl CompileConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the translator.
    #[must_use]
    pub fn translator(mut self, translator: Translator) -> Self {
        self.translator = translator;
        self
    }

    /// Builder: set the translator by name (`"trace"` or `"onnx"`).
    pub fn with_translator_name(self, name: &str) -> BridgeResult<Self> {
        Ok(self.translator(Translator::from_str(name)?))
    }

    /// Builder: set the backward strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Builder: shorthand for choosing between the two strategies.
    #[must_use]
    pub fn two_phase(self, enabled: bool) -> Self {
        self.strategy(if enabled {
            Strategy::TwoPhase
        } else {
            Strategy::OnePhase
        })
    }

    /// Builder: dump compiled graphs.
    #[must_use]
    pub fn dump_graphs(mut self, enabled: bool) -> Self {
        self.dump_graphs = enabled;
        self
    }

    /// Builder: skip graph validation.
    #[must_use]
    pub fn skip_shape_inference(mut self, skip: bool) -> Self {
        self.skip_shape_inference = skip;
        self
    }

    /// Executable options for this configuration.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions::new().skip_shape_inference(self.skip_shape_inference)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_compile_config_default() {
        let config = CompileConfig::default();
        assert_eq!(config.translator, Translator::Trace);
        assert_eq!(config.strategy, Strategy::TwoPhase);
        assert!(!config.dump_graphs);
        assert!(!config.skip_shape_inference);
    }

    #[test]
    fn test_compile_config_builder() {
        let config = CompileConfig::new()
            .translator(Translator::Onnx)
            .two_phase(false)
            .dump_graphs(true)
            .skip_shape_inference(true);

        assert_eq!(config.translator, Translator::Onnx);
        assert_eq!(config.strategy, Strategy::OnePhase);
        assert!(config.dump_graphs);
        assert!(config.compile_options().skip_shape_inference);
        assert!(!config.compile_options().enable_backprop);
    }

    #[test]
    fn test_translator_by_name() {
        let config = CompileConfig::new().with_translator_name("onnx").unwrap();
        assert_eq!(config.translator, Translator::Onnx);

        let err = CompileConfig::new().with_translator_name("ch2o").unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedTranslator { name } if name == "ch2o"));
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::TwoPhase.to_string(), "two-phase");
        assert_eq!(Strategy::OnePhase.name(), "one-phase");
    }
}
