//! Train MLP Example
//!
//! Trains a 3-layer classifier on synthetic data, either eagerly or through
//! a compiled graph, and reports loss, accuracy and throughput.
//!
//! ```text
//! cargo run --example train_mlp -- --compile --translator onnx --iterations 20
//! RUST_LOG=graftml::dump=info cargo run --example train_mlp -- --compile --dump-graphs
//! ```

use std::time::Instant;

use clap::Parser;
use graftml::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "train_mlp",
    author = "AutomataNexus Development Team",
    version,
    about = "Train a 3-layer classifier eagerly or through a compiled graph"
)]
struct Args {
    /// Run the model through a compiled graph
    #[arg(long)]
    compile: bool,

    /// Compute gradients in the forward pass (fused graph)
    #[arg(long)]
    one_phase: bool,

    /// Translator used to capture the model (trace or onnx)
    #[arg(long, default_value = "trace")]
    translator: String,

    /// Log the compiled graphs
    #[arg(long)]
    dump_graphs: bool,

    /// Samples per batch
    #[arg(short, long, default_value_t = 100)]
    batch_size: usize,

    /// Hidden units per layer
    #[arg(short, long, default_value_t = 1000)]
    units: usize,

    /// Training iterations
    #[arg(short, long, default_value_t = 10)]
    iterations: usize,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Learning rate
    #[arg(long, default_value_t = 0.01)]
    lr: f32,
}

const FEATURES: usize = 224;
const CLASSES: usize = 10;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "train_mlp=info,graftml=info".into()),
        )
        .init();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let model = Classifier::new(Mlp::with_rng(FEATURES, args.units, CLASSES, &mut rng));
    let params: Vec<Variable> = Model::named_parameters(&model)
        .into_iter()
        .map(|(_, p)| p)
        .collect();
    let sgd = Sgd::new(params, args.lr);

    let config = CompileConfig::new()
        .with_translator_name(&args.translator)?
        .two_phase(!args.one_phase)
        .dump_graphs(args.dump_graphs);
    info!(
        compile = args.compile,
        translator = %config.translator,
        strategy = %config.strategy,
        units = args.units,
        batch_size = args.batch_size,
        "starting training"
    );

    let runner = Runner::new(model, config, args.compile);
    let start = Instant::now();
    for iteration in 0..args.iterations {
        let (x, t) = synthetic_batch(&mut rng, args.batch_size, FEATURES, CLASSES);
        let inputs = [
            Structure::leaf(Variable::constant(x)),
            Structure::leaf(Variable::constant(t)),
        ];

        sgd.zero_grad();
        let (loss, accuracy) = runner.forward(&inputs)?;
        loss.backward()?;
        sgd.step()?;

        info!(
            iteration,
            loss = loss.data().item()?,
            accuracy = accuracy.data().item()?,
            "step"
        );
    }

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        elapsed_secs = elapsed,
        samples_per_sec = (args.iterations * args.batch_size) as f64 / elapsed.max(f64::EPSILON),
        "finished"
    );
    Ok(())
}

/// Eager or compiled execution of the same classifier.
enum Runner {
    Eager(Classifier<Mlp>),
    Compiled(CompiledModel<Classifier<Mlp>>),
}

impl Runner {
    fn new(model: Classifier<Mlp>, config: CompileConfig, compile: bool) -> Self {
        if compile {
            Self::Compiled(CompiledModel::new(model, config))
        } else {
            Self::Eager(model)
        }
    }

    fn forward(
        &self,
        inputs: &[Structure<Variable>],
    ) -> Result<(Variable, Variable), Box<dyn std::error::Error>> {
        let outputs = match self {
            Self::Eager(model) => Model::forward(model, inputs)?,
            Self::Compiled(model) => model
                .forward(inputs)?
                .into_children()
                .ok_or("expected [loss, accuracy]")?,
        };
        match <[Structure<Variable>; 2]>::try_from(outputs) {
            Ok([Structure::Leaf(loss), Structure::Leaf(accuracy)]) => Ok((loss, accuracy)),
            _ => Err("expected [loss, accuracy]".into()),
        }
    }
}
