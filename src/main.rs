// ========================================================================================
//
//                            THE COMMAND LINE: BAYESBOUND
//
// ========================================================================================
//
// Thin front end over the bound engine. Each subcommand loads its inputs, builds the
// engine configuration from flags and hands the work to the driver's dispatcher. Results
// land as TOML files in the output directory; a short summary goes to stdout.

#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use bayesbound::classifier::{Classifier, FrequencyClassifier, MajorityClassifier};
use bayesbound::driver::data::{LoadedDataset, load_dataset, resolve_inputs};
use bayesbound::driver::dispatch::{
    DispatchSummary, Progress, RunOptions, dispatch, run_bound_estimation, run_evaluations,
    run_selections, task_rng,
};
use bayesbound::driver::experiment::{ExperimentError, run_transfer_experiment};
use bayesbound::driver::report::append_transfer_line;
use bayesbound::driver::split::SplitConfig;
use bayesbound::driver::synthetic::{SyntheticKind, SyntheticSpec};
use bayesbound::montecarlo::{DEFAULT_FRACTIONS, MonteCarloConfig};
use bayesbound::select::SelectionConfig;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

/// File that collects one line per synthetic transfer experiment.
const TRANSFER_RESULTS_FILE: &str = "transfer_results.tsv";

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser)]
#[command(
    name = "bayesbound",
    version,
    about = "Bayes-optimal accuracy bounds for integer-featured binary classification",
    long_about = "Estimates how well any classifier could possibly do on a dataset by \
                  tabulating its empirical distribution, and compares real models against \
                  that bound."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassifierCli {
    Frequency,
    Majority,
}

impl ClassifierCli {
    fn build(self) -> Box<dyn Classifier> {
        match self {
            Self::Frequency => Box::new(FrequencyClassifier),
            Self::Majority => Box::new(MajorityClassifier),
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Directory receiving the result files
    #[arg(long, default_value = "bayesbound_output")]
    output_dir: PathBuf,

    /// Base seed; every task derives its own stream from it
    #[arg(long)]
    seed: Option<u64>,

    /// Show progress bars on stderr
    #[arg(long)]
    progress: bool,
}

impl CommonArgs {
    fn run_options(&self) -> Result<RunOptions, Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.output_dir)?;
        Ok(RunOptions {
            output_dir: self.output_dir.clone(),
            seed: self.seed,
            progress: Progress::new(self.progress),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Split datasets, compute their bounds and compare classifiers against them
    #[command(about = "Evaluate classifiers against split bounds (outputs: <stem>_<p>_<r>.toml)")]
    Evaluate(EvaluateArgs),

    /// Estimate expected bounds over random splits by resampling
    #[command(about = "Monte-Carlo split bounds (outputs: bounds_<stem>.toml)")]
    Bounds(BoundsArgs),

    /// Greedily select the features that carry the class information
    #[command(about = "Greedy feature selection (outputs: features_<stem>_<r>.toml)")]
    Select(SelectArgs),

    /// Bound a model fitted on one synthetic sample and deployed on another
    #[command(about = "Synthetic transfer bounds (outputs: transfer_results.tsv)")]
    Synthetic(SyntheticArgs),
}

#[derive(Args)]
struct EvaluateArgs {
    /// Dataset files or directories of dataset files
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Train fractions, each in (0, 1)
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_FRACTIONS.to_vec())]
    fractions: Vec<f64>,

    /// Random splits per fraction
    #[arg(long, default_value = "1")]
    repeats: usize,

    /// Also run the in-sample case (train = test = whole dataset)
    #[arg(long)]
    in_sample: bool,

    /// Classifiers to compare against the bound
    #[arg(long = "classifier", value_enum, default_values_t = [ClassifierCli::Frequency, ClassifierCli::Majority])]
    classifiers: Vec<ClassifierCli>,

    /// Redraws allowed for a split with an empty part
    #[arg(long, default_value_t = SplitConfig::default().max_attempts)]
    max_split_attempts: usize,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct BoundsArgs {
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_FRACTIONS.to_vec())]
    fractions: Vec<f64>,

    /// Fixed trial count; picked from the dataset size when omitted
    #[arg(long)]
    trials: Option<usize>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct SelectArgs {
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Candidate features sampled per round
    #[arg(long, default_value_t = SelectionConfig::default().feature_sampling)]
    feature_sampling: usize,

    /// Most features to select
    #[arg(long, default_value_t = SelectionConfig::default().max_features)]
    max_features: usize,

    /// Repeat index, used in the output file name and to vary the seed
    #[arg(long, default_value = "0")]
    repeat: usize,

    #[arg(long = "classifier", value_enum, default_values_t = [ClassifierCli::Frequency, ClassifierCli::Majority])]
    classifiers: Vec<ClassifierCli>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args)]
struct SyntheticArgs {
    /// Family of the input (training) sample: poisson, normal or power
    #[arg(long, required_unless_present = "grid")]
    input_kind: Option<SyntheticKind>,

    #[arg(long, required_unless_present = "grid")]
    input_parameter: Option<f64>,

    /// Probability of a positive label in the input sample
    #[arg(long)]
    input_probability: f64,

    /// Family of the output (deployment) sample
    #[arg(long, required_unless_present = "grid")]
    output_kind: Option<SyntheticKind>,

    #[arg(long, required_unless_present = "grid")]
    output_parameter: Option<f64>,

    #[arg(long)]
    output_probability: f64,

    /// Examples drawn per sample
    #[arg(long, default_value = "10000")]
    size: usize,

    /// Sweep every pair of families and their standard parameters instead
    #[arg(long)]
    grid: bool,

    #[command(flatten)]
    common: CommonArgs,
}

// ========================================================================================
//                                  ENTRY POINT
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();
    let result = match command {
        Some(Commands::Evaluate(args)) => evaluate(args),
        Some(Commands::Bounds(args)) => bounds(args),
        Some(Commands::Select(args)) => select(args),
        Some(Commands::Synthetic(args)) => synthetic(args),
        None => Cli::command().print_help().map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

// ========================================================================================
//                                  SUBCOMMANDS
// ========================================================================================

fn load_all(inputs: &[PathBuf]) -> Result<Vec<LoadedDataset>, Box<dyn std::error::Error>> {
    let files = resolve_inputs(inputs)?;
    if files.is_empty() {
        return Err("no dataset files found in the given inputs".into());
    }
    let mut datasets = Vec::with_capacity(files.len());
    for file in &files {
        let loaded = load_dataset(file)?;
        println!(
            "Loaded {}: {} examples, {} features",
            loaded.name,
            loaded.dataset.len(),
            loaded.feature_count
        );
        datasets.push(loaded);
    }
    Ok(datasets)
}

fn finish(summary: DispatchSummary) -> Result<(), Box<dyn std::error::Error>> {
    println!("{summary}");
    if summary.is_success() {
        Ok(())
    } else {
        Err(format!("{} task(s) failed", summary.failures.len()).into())
    }
}

fn evaluate(args: EvaluateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.common.run_options()?;
    let datasets = load_all(&args.inputs)?;
    let classifiers: Vec<Box<dyn Classifier>> =
        args.classifiers.iter().map(|c| c.build()).collect();

    let mut fractions = args.fractions.clone();
    if args.in_sample && !fractions.contains(&1.0) {
        fractions.push(1.0);
    }
    let split_config = SplitConfig {
        max_attempts: args.max_split_attempts,
    };

    finish(run_evaluations(
        &datasets,
        &fractions,
        args.repeats,
        &classifiers,
        &split_config,
        &options,
    ))
}

fn bounds(args: BoundsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.common.run_options()?;
    let datasets = load_all(&args.inputs)?;
    let config = MonteCarloConfig {
        fractions: args.fractions,
        trials: args.trials,
        ..MonteCarloConfig::default()
    };
    finish(run_bound_estimation(&datasets, &config, &options))
}

fn select(args: SelectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.common.run_options()?;
    let datasets = load_all(&args.inputs)?;
    let classifiers: Vec<Box<dyn Classifier>> =
        args.classifiers.iter().map(|c| c.build()).collect();
    let config = SelectionConfig {
        feature_sampling: args.feature_sampling,
        max_features: args.max_features,
        seed: None,
    };
    finish(run_selections(
        &datasets,
        &classifiers,
        &config,
        args.repeat,
        &options,
    ))
}

struct TransferTask {
    input: SyntheticSpec,
    output: SyntheticSpec,
}

impl fmt::Display for TransferTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -> {}({})",
            self.input.kind, self.input.parameter, self.output.kind, self.output.parameter
        )
    }
}

fn synthetic(args: SyntheticArgs) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.common.run_options()?;
    let specs = |probability: f64| -> Vec<SyntheticSpec> {
        SyntheticKind::ALL
            .iter()
            .flat_map(|&kind| {
                kind.default_parameters()
                    .iter()
                    .map(move |&parameter| SyntheticSpec {
                        kind,
                        parameter,
                        positive_probability: probability,
                    })
            })
            .collect()
    };

    let tasks: Vec<TransferTask> = if args.grid {
        let outputs = specs(args.output_probability);
        specs(args.input_probability)
            .into_iter()
            .flat_map(|input| {
                outputs
                    .iter()
                    .map(move |&output| TransferTask { input, output })
            })
            .collect()
    } else {
        // clap guarantees these when --grid is absent
        match (
            args.input_kind,
            args.input_parameter,
            args.output_kind,
            args.output_parameter,
        ) {
            (Some(input_kind), Some(input_parameter), Some(output_kind), Some(output_parameter)) => {
                vec![TransferTask {
                    input: SyntheticSpec {
                        kind: input_kind,
                        parameter: input_parameter,
                        positive_probability: args.input_probability,
                    },
                    output: SyntheticSpec {
                        kind: output_kind,
                        parameter: output_parameter,
                        positive_probability: args.output_probability,
                    },
                }]
            }
            _ => return Err("input and output distributions are required without --grid".into()),
        }
    };

    let results_path = options.output_dir.join(TRANSFER_RESULTS_FILE);
    let results_lock = Mutex::new(());
    let summary = dispatch(
        &tasks,
        &options.progress,
        "transfer experiments",
        |index, task| -> Result<(), ExperimentError> {
            let mut rng = task_rng(options.seed, index);
            let bounds = run_transfer_experiment(&task.input, &task.output, args.size, &mut rng)?;
            println!(
                "{task}: min_hinge={} max_accuracy={} delta={}",
                bounds.min_hinge, bounds.max_accuracy, bounds.delta
            );
            let _guard = results_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            append_transfer_line(&results_path, &task.input, &task.output, &bounds)?;
            Ok(())
        },
    );
    finish(summary)
}
