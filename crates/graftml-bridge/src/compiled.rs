//! Compiled Model Wrapper
//!
//! `CompiledModel` wraps a dynamic [`Model`] and, after its first call,
//! runs it through compiled executables embedded as single nodes of the
//! host autodiff graph. From the outside it is called like the model
//! itself: same inputs, same outputs, differentiable end to end.
//!
//! # Lifecycle
//!
//! ```text
//! Uncompiled --(first call: run model, translate, load, split, compile)--> Compiled
//! ```
//!
//! The first call returns the dynamic model's own outputs. Every later call
//! goes through a fresh [`TwoPhaseNode`] or [`OnePhaseNode`].
//!
//! Parameters are looked up by name once, on the first compiled call, and
//! the `Variable` handles are kept. Their values are read at each call, so
//! in-place updates through `Variable::set_data` are seen; replacing a
//! parameter object on the model after that first call is not.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use graftml_autograd::{apply, Variable};
use graftml_core::Structure;
use graftml_jit::{CompiledGraph, Compiler, Executable, GraphCompiler};
use graftml_nn::Model;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::binding::NamedIoTable;
use crate::codec::{flatten, unflatten_exact};
use crate::config::{CompileConfig, Strategy};
use crate::error::{BridgeError, BridgeResult};
use crate::node::{NodeCall, OnePhaseNode, TwoPhaseNode};

/// Tracing target of the graph dumps.
pub const DUMP_TARGET: &str = "graftml::dump";

// =============================================================================
// State
// =============================================================================

#[derive(Clone)]
enum Runner {
    TwoPhase {
        forward: Arc<dyn Executable>,
        backward: Arc<dyn Executable>,
    },
    OnePhase {
        fused: Arc<dyn Executable>,
    },
}

/// Everything produced by compilation.
#[derive(Clone)]
struct Compiled {
    table: Arc<NamedIoTable>,
    output_names: Vec<String>,
    runner: Runner,
    params: Option<Vec<Variable>>,
    dumps: Vec<String>,
}

enum State {
    Uncompiled,
    Compiled(Arc<Compiled>),
}

// =============================================================================
// Compiled Model
// =============================================================================

/// A dynamic model that runs through compiled graphs after its first call.
pub struct CompiledModel<M: Model> {
    model: M,
    config: CompileConfig,
    state: Mutex<State>,
}

impl<M: Model> CompiledModel<M> {
    /// Wraps `model`; compilation happens on the first call.
    pub fn new(model: M, config: CompileConfig) -> Self {
        Self {
            model,
            config,
            state: Mutex::new(State::Uncompiled),
        }
    }

    /// Runs the model.
    ///
    /// A single declared output is returned as is; several are returned as
    /// a branch in declaration order.
    pub fn forward(&self, inputs: &[Structure<Variable>]) -> BridgeResult<Structure<Variable>> {
        let mut state = self.state.lock();
        let compiled = match &mut *state {
            State::Uncompiled => {
                let outputs = self.model.forward(inputs)?;
                let compiled = self.build(inputs)?;
                *state = State::Compiled(Arc::new(compiled));
                return Ok(unwrap_outputs(outputs));
            }
            State::Compiled(compiled) => {
                if compiled.params.is_none() {
                    let mut resolved = Compiled::clone(compiled);
                    resolved.params = Some(self.resolve_params(&resolved.table)?);
                    *compiled = Arc::new(resolved);
                }
                Arc::clone(compiled)
            }
        };
        drop(state);
        self.run_compiled(&compiled, inputs)
    }

    /// Compiles for inputs shaped like `sample` without running anything.
    ///
    /// Does nothing if the model is already compiled.
    pub fn compile(&self, sample: &[Structure<Variable>]) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if let State::Uncompiled = *state {
            *state = State::Compiled(Arc::new(self.build(sample)?));
        }
        Ok(())
    }

    /// Returns true once the model has been compiled.
    pub fn is_compiled(&self) -> bool {
        matches!(*self.state.lock(), State::Compiled(_))
    }

    /// Name table of the compiled graphs.
    pub fn table(&self) -> Option<Arc<NamedIoTable>> {
        match &*self.state.lock() {
            State::Compiled(compiled) => Some(Arc::clone(&compiled.table)),
            State::Uncompiled => None,
        }
    }

    /// Declared output names of the compiled graph.
    pub fn output_names(&self) -> Option<Vec<String>> {
        match &*self.state.lock() {
            State::Compiled(compiled) => Some(compiled.output_names.clone()),
            State::Uncompiled => None,
        }
    }

    /// Text dumps of the compiled graphs, when `dump_graphs` is set.
    pub fn graph_dumps(&self) -> Vec<String> {
        match &*self.state.lock() {
            State::Compiled(compiled) => compiled.dumps.clone(),
            State::Uncompiled => Vec::new(),
        }
    }

    /// Returns the wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Clears the gradients of the model's parameters.
    pub fn zero_grad(&self) {
        self.model.zero_grad();
    }

    // -------------------------------------------------------------------------
    // Compilation
    // -------------------------------------------------------------------------

    fn build(&self, sample: &[Structure<Variable>]) -> BridgeResult<Compiled> {
        let translator = self.config.translator;
        let file = translator.translate(&self.model, sample)?;
        let graph = Compiler::new().load(file.path())?;
        file.close()?;

        let options = self.config.compile_options();
        let output_names = graph.output_names();
        let mut dumps = Vec::new();

        let (table, runner) = match self.config.strategy {
            Strategy::TwoPhase => {
                let mut wrt = graph.input_names();
                wrt.extend(graph.param_names());
                let (forward, backward) = graph.split_for_backward(&wrt)?;
                if forward.input_names() != graph.input_names() {
                    return Err(BridgeError::Inconsistent(format!(
                        "forward graph inputs {:?} differ from model inputs {:?}",
                        forward.input_names(),
                        graph.input_names()
                    )));
                }
                if self.config.dump_graphs {
                    dumps.push(dump("forward", forward.as_ref()));
                    dumps.push(dump("backward", backward.as_ref()));
                }

                let table = NamedIoTable {
                    forward_inputs: forward.input_names(),
                    forward_outputs: forward.output_names(),
                    backward_inputs: backward.input_names(),
                    backward_outputs: backward.output_names(),
                    params: forward.param_names(),
                };
                let runner = Runner::TwoPhase {
                    forward: forward.compile(&options)?,
                    backward: backward.compile(&options)?,
                };
                (table, runner)
            }
            Strategy::OnePhase => {
                if self.config.dump_graphs {
                    dumps.push(dump("forward", graph.as_ref()));
                }
                let table = NamedIoTable {
                    forward_inputs: graph.input_names(),
                    forward_outputs: output_names.clone(),
                    backward_inputs: Vec::new(),
                    backward_outputs: Vec::new(),
                    params: graph.param_names(),
                };
                let runner = Runner::OnePhase {
                    fused: graph.compile(&options.enable_backprop(true))?,
                };
                (table, runner)
            }
        };

        info!(
            translator = %translator,
            strategy = %self.config.strategy,
            inputs = table.forward_inputs.len(),
            outputs = output_names.len(),
            params = table.params.len(),
            "compiled model"
        );
        Ok(Compiled {
            table: Arc::new(table),
            output_names,
            runner,
            params: None,
            dumps,
        })
    }

    /// Finds the model parameter behind every graph parameter name.
    fn resolve_params(&self, table: &NamedIoTable) -> BridgeResult<Vec<Variable>> {
        let translator = self.config.translator;
        let by_name: HashMap<String, Variable> = self
            .model
            .named_parameters()
            .into_iter()
            .map(|(path, param)| (translator.param_name(&path), param))
            .collect();

        let params = table
            .params
            .iter()
            .map(|name| {
                by_name
                    .get(name)
                    .cloned()
                    .ok_or_else(|| BridgeError::MissingParameter { name: name.clone() })
            })
            .collect::<BridgeResult<Vec<_>>>()?;
        debug!(params = params.len(), "bound model parameters");
        Ok(params)
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    fn run_compiled(
        &self,
        compiled: &Compiled,
        inputs: &[Structure<Variable>],
    ) -> BridgeResult<Structure<Variable>> {
        let params = compiled.params.as_deref().unwrap_or_default();
        let templates = inputs.iter().map(Structure::template).collect();
        let num_outputs = compiled.output_names.len();
        let call = NodeCall::new(Arc::clone(&compiled.table), templates, num_outputs);
        let layout = call.layout();

        let mut args: Vec<Variable> = inputs.iter().flat_map(flatten).collect();
        args.extend(params.iter().cloned());

        let flat_outputs = match &compiled.runner {
            Runner::TwoPhase { forward, backward } => apply(
                TwoPhaseNode::new(call, Arc::clone(forward), Arc::clone(backward)),
                &args,
            )?,
            Runner::OnePhase { fused } => apply(OnePhaseNode::new(call, Arc::clone(fused)), &args)?,
        };

        let template = layout.take().ok_or_else(|| {
            BridgeError::Inconsistent("compiled node did not publish its output layout".to_string())
        })?;
        let mut outputs = unflatten_exact(&flat_outputs, &template)?
            .into_children()
            .ok_or_else(|| BridgeError::Inconsistent("output list rebuilt as a single tensor".to_string()))?;
        outputs.truncate(num_outputs);
        Ok(unwrap_outputs(outputs))
    }
}

impl<M: Model> fmt::Debug for CompiledModel<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModel")
            .field("config", &self.config)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// Wraps `model` and compiles it for inputs shaped like `sample`.
pub fn compile<M: Model>(
    model: M,
    sample: &[Structure<Variable>],
    config: CompileConfig,
) -> BridgeResult<CompiledModel<M>> {
    let compiled = CompiledModel::new(model, config);
    compiled.compile(sample)?;
    Ok(compiled)
}

fn unwrap_outputs(mut outputs: Vec<Structure<Variable>>) -> Structure<Variable> {
    if outputs.len() == 1 {
        outputs.remove(0)
    } else {
        Structure::branch(outputs)
    }
}

fn dump(phase: &str, graph: &dyn CompiledGraph) -> String {
    let text = format!(
        "=== vvv {phase} vvv ===\n{}\n=== ^^^ {phase} ^^^ ===",
        graph.dump()
    );
    info!(target: DUMP_TARGET, "\n{text}");
    text
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::Translator;
    use graftml_jit::{JitResult, Symbol, Tracer};
    use graftml_nn::Mlp;
    use graftml_tensor::Tensor;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mlp() -> Mlp {
        let mut rng = StdRng::seed_from_u64(7);
        Mlp::with_rng(4, 5, 3, &mut rng)
    }

    fn batch() -> Vec<Structure<Variable>> {
        let mut rng = StdRng::seed_from_u64(11);
        vec![Structure::leaf(Variable::constant(Tensor::uniform(
            &mut rng,
            &[2, 4],
            -1.0,
            1.0,
        )))]
    }

    fn leaf_data(value: &Structure<Variable>) -> Tensor {
        value.as_leaf().unwrap().data()
    }

    #[test]
    fn test_first_call_runs_model_and_compiles() {
        let wrapped = CompiledModel::new(mlp(), CompileConfig::new());
        assert!(!wrapped.is_compiled());
        assert!(wrapped.table().is_none());

        let inputs = batch();
        let eager = wrapped.forward(&inputs).unwrap();
        assert!(wrapped.is_compiled());
        assert_eq!(wrapped.output_names().unwrap(), vec!["output_0".to_string()]);

        let compiled = wrapped.forward(&inputs).unwrap();
        assert!(leaf_data(&eager).allclose(&leaf_data(&compiled), 1e-5));
    }

    #[test]
    fn test_compiled_state_is_shared_between_calls() {
        let wrapped = compile(mlp(), &batch(), CompileConfig::new()).unwrap();
        let state = |w: &CompiledModel<Mlp>| match &*w.state.lock() {
            State::Compiled(compiled) => Arc::clone(compiled),
            State::Uncompiled => panic!("not compiled"),
        };

        wrapped.forward(&batch()).unwrap();
        let first = state(&wrapped);
        assert_eq!(first.params.as_ref().map(Vec::len), Some(6));

        wrapped.forward(&batch()).unwrap();
        assert!(Arc::ptr_eq(&first, &state(&wrapped)));
    }

    #[test]
    fn test_table_lists_params_in_graph_order() {
        let wrapped = compile(mlp(), &batch(), CompileConfig::new()).unwrap();
        let table = wrapped.table().unwrap();
        assert_eq!(table.forward_inputs, vec!["input_0".to_string()]);
        assert_eq!(table.params.len(), 6);
        assert!(table.params.iter().all(|p| p.starts_with('/')));
        assert!(table.forward_outputs.len() > 1);
        assert_eq!(table.forward_outputs[0], "output_0");
        assert!(table.backward_inputs[0].starts_with("grad_in@"));
    }

    #[test]
    fn test_one_phase_table_has_no_backward() {
        let config = CompileConfig::new().strategy(Strategy::OnePhase);
        let wrapped = compile(mlp(), &batch(), config).unwrap();
        let table = wrapped.table().unwrap();
        assert_eq!(table.forward_outputs, vec!["output_0".to_string()]);
        assert!(table.backward_inputs.is_empty());
        assert!(table.backward_outputs.is_empty());
    }

    #[test]
    fn test_graph_dumps() {
        let config = CompileConfig::new().dump_graphs(true);
        let wrapped = compile(mlp(), &batch(), config).unwrap();
        let dumps = wrapped.graph_dumps();
        assert_eq!(dumps.len(), 2);
        assert!(dumps[0].starts_with("=== vvv forward vvv ==="));
        assert!(dumps[0].ends_with("=== ^^^ forward ^^^ ==="));
        assert!(dumps[1].contains("Gemm"));

        let quiet = compile(mlp(), &batch(), CompileConfig::new()).unwrap();
        assert!(quiet.graph_dumps().is_empty());
    }

    #[test]
    fn test_onnx_translator_binds_export_names() {
        let config = CompileConfig::new().translator(Translator::Onnx);
        let wrapped = compile(mlp(), &batch(), config).unwrap();
        let table = wrapped.table().unwrap();
        assert_eq!(table.forward_inputs, vec!["Input_0".to_string()]);
        assert!(table.params.iter().all(|p| p.starts_with("param_")));

        let out = wrapped.forward(&batch()).unwrap();
        assert_eq!(out.as_leaf().unwrap().shape(), vec![2, 3]);
    }

    #[test]
    fn test_gradients_reach_parameters() {
        let model = mlp();
        let wrapped = compile(model, &batch(), CompileConfig::new()).unwrap();
        let out = wrapped.forward(&batch()).unwrap();
        let y = out.into_leaf().unwrap();
        let loss = graftml_autograd::functions::sum(&y).unwrap();
        loss.backward().unwrap();

        for (path, param) in wrapped.model().named_parameters() {
            let grad = param.grad().unwrap_or_else(|| panic!("no gradient for {path}"));
            assert_eq!(grad.shape(), param.data().shape());
        }
    }

    #[test]
    fn test_missing_parameter() {
        // Hides its parameters from name lookup.
        struct Hidden(Mlp);

        impl Model for Hidden {
            fn forward(
                &self,
                inputs: &[Structure<Variable>],
            ) -> graftml_autograd::AutogradResult<Vec<Structure<Variable>>> {
                Model::forward(&self.0, inputs)
            }

            fn trace(
                &self,
                tracer: &mut Tracer,
                inputs: &[Structure<Symbol>],
            ) -> JitResult<Vec<Structure<Symbol>>> {
                Model::trace(&self.0, tracer, inputs)
            }

            fn named_parameters(&self) -> Vec<(String, Variable)> {
                Vec::new()
            }
        }

        let wrapped = compile(Hidden(mlp()), &batch(), CompileConfig::new()).unwrap();
        let err = wrapped.forward(&batch()).unwrap_err();
        assert!(matches!(err, BridgeError::MissingParameter { name } if name == "/l1/W"));
    }
}
