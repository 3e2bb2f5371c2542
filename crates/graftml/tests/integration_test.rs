//! End-to-end tests: a 3-layer classifier compiled through each translator
//! and strategy, checked against the same model run eagerly.

use graftml::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const BATCH: usize = 100;
const FEATURES: usize = 224;
const UNITS: usize = 32;
const CLASSES: usize = 10;
const TOL: f32 = 1e-4;

fn classifier(seed: u64) -> Classifier<Mlp> {
    let mut rng = StdRng::seed_from_u64(seed);
    Classifier::new(Mlp::with_rng(FEATURES, UNITS, CLASSES, &mut rng))
}

fn batch(seed: u64) -> Vec<Structure<Variable>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (x, t) = synthetic_batch(&mut rng, BATCH, FEATURES, CLASSES);
    vec![
        Structure::leaf(Variable::constant(x)),
        Structure::leaf(Variable::constant(t)),
    ]
}

/// Splits `[loss, accuracy]`.
fn loss_and_accuracy(outputs: &Structure<Variable>) -> (Variable, f32) {
    let children = outputs.children().expect("two outputs");
    assert_eq!(children.len(), 2);
    let loss = children[0].as_leaf().unwrap().clone();
    let accuracy = children[1].as_leaf().unwrap().data().item().unwrap();
    (loss, accuracy)
}

fn eager(model: &Classifier<Mlp>, inputs: &[Structure<Variable>]) -> Structure<Variable> {
    Structure::branch(Model::forward(model, inputs).unwrap())
}

/// Gradients of every parameter, in `named_parameters` order.
fn param_grads(model: &Classifier<Mlp>) -> Vec<(String, Tensor)> {
    Model::named_parameters(model)
        .into_iter()
        .map(|(path, p)| {
            let grad = p.grad().unwrap_or_else(|| panic!("{path} has no gradient"));
            (path, grad)
        })
        .collect()
}

fn params(model: &Classifier<Mlp>) -> Vec<Variable> {
    Model::named_parameters(model).into_iter().map(|(_, p)| p).collect()
}

fn assert_grads_close(a: &[(String, Tensor)], b: &[(String, Tensor)]) {
    assert_eq!(a.len(), b.len());
    for ((path, ga), (_, gb)) in a.iter().zip(b) {
        let diff = ga.max_abs_diff(gb).unwrap();
        assert!(diff < TOL, "{path}: gradients differ by {diff}");
    }
}

fn compiled_grads(config: CompileConfig) -> Vec<(String, Tensor)> {
    let inputs = batch(1);
    let model = compile(classifier(0), &inputs, config).unwrap();
    let (loss, _) = loss_and_accuracy(&model.forward(&inputs).unwrap());
    loss.backward().unwrap();
    param_grads(model.model())
}

/// Gradients of `(x, t)` after one compiled backward pass.
fn input_grads(strategy: Strategy) -> (Option<Tensor>, Option<Tensor>) {
    let inputs = batch(1);
    let x = Variable::new(inputs[0].as_leaf().unwrap().data(), true);
    let t = Variable::new(inputs[1].as_leaf().unwrap().data(), true);
    let inputs = vec![Structure::leaf(x.clone()), Structure::leaf(t.clone())];

    let model = compile(classifier(0), &inputs, CompileConfig::new().strategy(strategy)).unwrap();
    let (loss, _) = loss_and_accuracy(&model.forward(&inputs).unwrap());
    loss.backward().unwrap();
    (x.grad(), t.grad())
}

// =============================================================================
// Forward
// =============================================================================

#[test]
fn test_compiled_matches_eager_loss_and_accuracy() {
    for translator in [Translator::Trace, Translator::Onnx] {
        let inputs = batch(1);
        let model = CompiledModel::new(classifier(0), CompileConfig::new().translator(translator));

        // First call runs the model itself and compiles it.
        let (first_loss, first_acc) = loss_and_accuracy(&model.forward(&inputs).unwrap());
        assert!(model.is_compiled());

        let (loss, acc) = loss_and_accuracy(&model.forward(&inputs).unwrap());
        let (ref_loss, ref_acc) = loss_and_accuracy(&eager(model.model(), &inputs));

        let loss = loss.data().item().unwrap();
        let ref_loss = ref_loss.data().item().unwrap();
        assert!((loss - ref_loss).abs() < TOL, "{translator}: {loss} vs {ref_loss}");
        assert!((first_loss.data().item().unwrap() - ref_loss).abs() < TOL);
        assert!((acc - ref_acc).abs() < TOL);
        assert!((first_acc - ref_acc).abs() < TOL);
        assert!((0.0..=1.0).contains(&acc));
    }
}

#[test]
fn test_single_output_is_unwrapped() {
    let mut rng = StdRng::seed_from_u64(5);
    let mlp = Mlp::with_rng(FEATURES, UNITS, CLASSES, &mut rng);
    let inputs = vec![batch(2).remove(0)];
    let model = compile(mlp, &inputs, CompileConfig::new()).unwrap();

    let logits = model.forward(&inputs).unwrap();
    assert!(logits.is_leaf());
    assert_eq!(logits.as_leaf().unwrap().shape(), vec![BATCH, CLASSES]);
}

// =============================================================================
// Backward
// =============================================================================

#[test]
fn test_compiled_gradients_match_eager() {
    let inputs = batch(1);
    let reference = classifier(0);
    let (loss, _) = loss_and_accuracy(&eager(&reference, &inputs));
    loss.backward().unwrap();
    let expected = param_grads(&reference);

    for translator in [Translator::Trace, Translator::Onnx] {
        let grads = compiled_grads(CompileConfig::new().translator(translator));
        assert_grads_close(&grads, &expected);
    }
}

#[test]
fn test_two_phase_and_one_phase_agree() {
    let two = compiled_grads(CompileConfig::new().strategy(Strategy::TwoPhase));
    let one = compiled_grads(CompileConfig::new().strategy(Strategy::OnePhase));
    assert_grads_close(&two, &one);

    let inputs = batch(1);
    let a = compile(classifier(0), &inputs, CompileConfig::new()).unwrap();
    let b = compile(classifier(0), &inputs, CompileConfig::new().two_phase(false)).unwrap();
    let (la, aa) = loss_and_accuracy(&a.forward(&inputs).unwrap());
    let (lb, ab) = loss_and_accuracy(&b.forward(&inputs).unwrap());
    assert!(la.data().allclose(&lb.data(), TOL));
    assert!((aa - ab).abs() < TOL);

    let (x_two, t_two) = input_grads(Strategy::TwoPhase);
    let (x_one, t_one) = input_grads(Strategy::OnePhase);
    let x_two = x_two.expect("two-phase input gradient");
    let x_one = x_one.expect("one-phase input gradient");
    let diff = x_two.max_abs_diff(&x_one).unwrap();
    assert!(diff < TOL, "input gradients differ by {diff}");
    assert!(t_two.is_none());
    assert!(t_one.is_none());
}

#[test]
fn test_input_gradients() {
    let mut inputs = batch(1);
    let x = inputs[0].as_leaf().unwrap().data();
    let t = inputs[1].as_leaf().unwrap().data();
    let x = Variable::new(x, true);
    let t = Variable::new(t, true);
    inputs = vec![Structure::leaf(x.clone()), Structure::leaf(t.clone())];

    let model = compile(classifier(0), &inputs, CompileConfig::new()).unwrap();
    let (loss, _) = loss_and_accuracy(&model.forward(&inputs).unwrap());
    loss.backward().unwrap();

    assert_eq!(x.grad().unwrap().shape(), &[BATCH, FEATURES]);
    // Labels are not differentiable; no gradient, not a zero gradient.
    assert!(t.grad().is_none());
}

#[test]
fn test_second_backward_is_rejected() {
    let inputs = batch(1);
    let model = compile(classifier(0), &inputs, CompileConfig::new()).unwrap();
    let (loss, _) = loss_and_accuracy(&model.forward(&inputs).unwrap());
    loss.backward().unwrap();

    let err = BridgeError::from(loss.backward().unwrap_err());
    assert!(matches!(err, BridgeError::NodeConsumed { .. }), "{err}");
}

// =============================================================================
// Training
// =============================================================================

#[test]
fn test_sgd_through_compiled_model() {
    for strategy in [Strategy::TwoPhase, Strategy::OnePhase] {
        let inputs = batch(3);
        let model = CompiledModel::new(classifier(4), CompileConfig::new().strategy(strategy));
        let sgd = Sgd::new(params(model.model()), 0.1);

        let mut losses = Vec::new();
        for _ in 0..5 {
            sgd.zero_grad();
            let (loss, _) = loss_and_accuracy(&model.forward(&inputs).unwrap());
            losses.push(loss.data().item().unwrap());
            loss.backward().unwrap();
            sgd.step().unwrap();
        }
        assert!(
            losses[4] < losses[0],
            "{strategy}: loss did not decrease: {losses:?}"
        );
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_unsupported_translator() {
    let err = CompileConfig::new().with_translator_name("chainer").unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedTranslator { ref name } if name == "chainer"));
    assert!(err.to_string().contains("chainer"));
}

#[test]
fn test_graph_dumps_are_kept() {
    let inputs = batch(1);
    let config = CompileConfig::new().translator(Translator::Onnx).dump_graphs(true);
    let model = compile(classifier(0), &inputs, config).unwrap();
    let dumps = model.graph_dumps();
    assert_eq!(dumps.len(), 2);
    assert!(dumps[0].contains("=== vvv forward vvv ==="));
    assert!(dumps[1].contains("=== ^^^ backward ^^^ ==="));
    assert!(dumps[1].contains("grad_out@param_predictor_l1_W"));
}
