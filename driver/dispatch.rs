//! # Task Dispatch
//!
//! Fans independent experiment tasks out over the rayon pool. A task that fails is
//! logged and reported in the summary; its siblings keep running. Every task that
//! needs randomness derives its own generator from the run seed and its task index, so
//! a seeded run is reproducible whatever the thread count.

use super::data::LoadedDataset;
use super::experiment::{
    ExperimentError, estimate_dataset_bounds, evaluate_split, selection_report,
};
use super::report::{
    SplitBoundReport, bounds_path, experiment_path, features_path, save_toml,
};
use super::split::SplitConfig;
use crate::classifier::Classifier;
use crate::montecarlo::MonteCarloConfig;
use crate::progress::{SelectionObserver, SelectionStage};
use crate::select::{SelectionConfig, select_features};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::fmt;
use std::io::IsTerminal;
use std::path::PathBuf;

// ========================================================================================
//                                  Progress reporting
// ========================================================================================

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

/// Shared progress display for one command. Disabled, or not attached to a terminal,
/// it hands out hidden bars.
#[derive(Clone, Default)]
pub struct Progress {
    multi: Option<MultiProgress>,
}

impl Progress {
    pub fn new(enabled: bool) -> Self {
        let multi = (enabled && std::io::stderr().is_terminal())
            .then(|| MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(20)));
        Self { multi }
    }

    pub fn bar(&self, len: u64, message: &str) -> ProgressBar {
        match &self.multi {
            Some(multi) => multi.add(create_progress_bar(len, message)),
            None => ProgressBar::hidden(),
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("enabled", &self.multi.is_some())
            .finish()
    }
}

/// Drives one progress bar per selection stage.
pub struct SelectionProgressBar {
    progress: Progress,
    label: String,
    bar: Option<ProgressBar>,
}

impl SelectionProgressBar {
    pub fn new(progress: Progress, label: impl Into<String>) -> Self {
        Self {
            progress,
            label: label.into(),
            bar: None,
        }
    }
}

impl SelectionObserver for SelectionProgressBar {
    fn on_stage_start(&mut self, stage: SelectionStage, total_rounds: usize) {
        let message = format!("{}: {stage}", self.label);
        self.bar = Some(self.progress.bar(total_rounds as u64, &message));
    }

    fn on_stage_advance(&mut self, _stage: SelectionStage, completed_rounds: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(completed_rounds as u64);
        }
    }

    fn on_stage_finish(&mut self, _stage: SelectionStage) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

// ========================================================================================
//                                  Generic dispatch
// ========================================================================================

/// A task that returned an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub completed: usize,
    pub failures: Vec<TaskFailure>,
}

impl DispatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} task(s) completed, {} failed",
            self.completed,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  {}: {}", failure.task, failure.message)?;
        }
        Ok(())
    }
}

/// Generator for task `index` of a run. Seeded runs are reproducible; unseeded runs draw
/// fresh entropy per task.
pub fn task_rng(seed: Option<u64>, index: usize) -> StdRng {
    match task_seed(seed, index) {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Seed for task `index`, spread so neighbouring tasks get unrelated streams.
pub fn task_seed(seed: Option<u64>, index: usize) -> Option<u64> {
    seed.map(|s| s ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Runs `run` on every task in parallel and collects the failures.
pub fn dispatch<T, E, F>(tasks: &[T], progress: &Progress, message: &str, run: F) -> DispatchSummary
where
    T: fmt::Display + Sync,
    E: fmt::Display,
    F: Fn(usize, &T) -> Result<(), E> + Sync,
{
    let bar = progress.bar(tasks.len() as u64, message);
    let failures: Vec<TaskFailure> = tasks
        .par_iter()
        .enumerate()
        .filter_map(|(index, task)| {
            let result = run(index, task);
            bar.inc(1);
            match result {
                Ok(()) => None,
                Err(e) => {
                    log::error!("Task '{task}' failed: {e}");
                    Some(TaskFailure {
                        task: task.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        })
        .collect();
    bar.finish_and_clear();

    DispatchSummary {
        completed: tasks.len() - failures.len(),
        failures,
    }
}

// ========================================================================================
//                                  Command runners
// ========================================================================================

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
    pub progress: Progress,
}

struct SplitTask<'a> {
    dataset: &'a LoadedDataset,
    fraction: f64,
    repeat: usize,
}

impl fmt::Display for SplitTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} p={} #{}", self.dataset.name, self.fraction, self.repeat)
    }
}

/// Evaluates every (dataset, fraction, repeat) combination and saves one report each.
pub fn run_evaluations(
    datasets: &[LoadedDataset],
    fractions: &[f64],
    repeats: usize,
    classifiers: &[Box<dyn Classifier>],
    split_config: &SplitConfig,
    options: &RunOptions,
) -> DispatchSummary {
    let tasks: Vec<SplitTask<'_>> = datasets
        .iter()
        .flat_map(|dataset| {
            fractions.iter().flat_map(move |&fraction| {
                (0..repeats).map(move |repeat| SplitTask {
                    dataset,
                    fraction,
                    repeat,
                })
            })
        })
        .collect();
    log::info!("Dispatching {} split experiment(s)", tasks.len());

    dispatch(&tasks, &options.progress, "split experiments", |index, task| -> Result<(), ExperimentError> {
        let mut rng = task_rng(options.seed, index);
        let outcome = evaluate_split(
            &task.dataset.dataset,
            task.fraction,
            classifiers,
            &mut rng,
            split_config,
        )?;
        let report = outcome.to_report(&task.dataset.name, task.repeat);
        let path = experiment_path(
            &options.output_dir,
            &task.dataset.name,
            task.fraction,
            task.repeat,
        );
        save_toml(&report, &path)?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    })
}

struct DatasetTask<'a>(&'a LoadedDataset);

impl fmt::Display for DatasetTask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

/// Estimates Monte-Carlo split bounds for every dataset.
pub fn run_bound_estimation(
    datasets: &[LoadedDataset],
    config: &MonteCarloConfig,
    options: &RunOptions,
) -> DispatchSummary {
    let tasks: Vec<DatasetTask<'_>> = datasets.iter().map(DatasetTask).collect();

    dispatch(&tasks, &options.progress, "split bounds", |index, task| -> Result<(), ExperimentError> {
        let config = MonteCarloConfig {
            seed: task_seed(options.seed, index),
            ..config.clone()
        };
        let bounds = estimate_dataset_bounds(&task.0.dataset, &config)?;
        for bound in &bounds {
            log::info!(
                "{}: p={} min_hinge={:.4} max_accuracy={:.4} delta={:.4}",
                task.0.name,
                bound.fraction,
                bound.min_hinge_rate,
                bound.max_accuracy_rate,
                bound.expected_delta
            );
        }
        let report = SplitBoundReport::new(&task.0.name, task.0.dataset.len(), &bounds);
        save_toml(&report, &bounds_path(&options.output_dir, &task.0.name))?;
        Ok(())
    })
}

/// Runs greedy feature selection on every dataset under repeat index `repeat`.
pub fn run_selections(
    datasets: &[LoadedDataset],
    classifiers: &[Box<dyn Classifier>],
    config: &SelectionConfig,
    repeat: usize,
    options: &RunOptions,
) -> DispatchSummary {
    let tasks: Vec<DatasetTask<'_>> = datasets.iter().map(DatasetTask).collect();

    dispatch(&tasks, &options.progress, "feature selection", |index, task| -> Result<(), ExperimentError> {
        let config = SelectionConfig {
            seed: task_seed(options.seed, index + repeat * datasets.len()),
            ..config.clone()
        };
        let mut observer = SelectionProgressBar::new(options.progress.clone(), &task.0.name);
        let outcome =
            select_features(&task.0.dataset, None, classifiers, &config, &mut observer)?;
        let report = selection_report(&task.0.name, repeat, classifiers, &outcome);
        save_toml(
            &report,
            &features_path(&options.output_dir, &task.0.name, repeat),
        )?;
        Ok(())
    })
}
