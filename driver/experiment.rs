//! # Experiments
//!
//! The units of work the driver dispatches: one split evaluation, one Monte-Carlo
//! bound estimation, one feature-selection run and one synthetic transfer experiment.
//! Each is self-contained and shares nothing mutable with its siblings.

use super::report::{ExperimentReport, ModelReport, ReportError, SelectionReport};
use super::split::{SplitConfig, SplitError, random_split};
use super::synthetic::{SyntheticError, SyntheticSpec, generate};
use crate::classifier::{Classifier, OutputKind};
use crate::distribution::{DistributionError, DistributionTable};
use crate::hinge::hinge_accuracy;
use crate::metrics::{MetricError, roc_auc};
use crate::montecarlo::{MonteCarloConfig, MonteCarloError, SplitBound, estimate_split_bounds};
use crate::oracle::{BoundError, TransferBounds, bound_result, min_hinge, oracle_scores, transfer_bounds};
use crate::select::{SelectionError, SelectionOutcome};
use crate::types::{BoundResult, Dataset, Label};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Bound(#[from] BoundError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error(transparent)]
    MonteCarlo(#[from] MonteCarloError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Synthetic(#[from] SyntheticError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// A classifier that could not be fitted or could not predict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierFailure {
    pub name: String,
    pub message: String,
}

/// What one classifier achieved on one split.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEvaluation {
    pub name: String,
    pub output: OutputKind,
    /// Hinge accuracy of its predictions on the train part.
    pub train_hinge: u64,
    /// AUC of its predictions on the test part.
    pub test_auc: f64,
    pub test_predictions: Vec<f64>,
}

/// Everything measured on one split of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentOutcome {
    pub fraction: f64,
    pub bound: BoundResult,
    pub oracle: ModelEvaluation,
    pub models: Vec<ModelEvaluation>,
    pub failures: Vec<ClassifierFailure>,
    pub test_labels: Vec<Label>,
}

/// Splits `dataset`, derives the oracle bounds of the split and evaluates every
/// classifier on it.
///
/// A failing classifier is recorded in `failures`; the bound computations and the
/// other classifiers are unaffected.
pub fn evaluate_split<R: Rng + ?Sized>(
    dataset: &Dataset,
    fraction: f64,
    classifiers: &[Box<dyn Classifier>],
    rng: &mut R,
    split_config: &SplitConfig,
) -> Result<ExperimentOutcome, ExperimentError> {
    let split = random_split(dataset, fraction, rng, split_config)?;
    let table = DistributionTable::from_datasets(&split.train, &split.test)?;
    let bound = bound_result(&table, dataset.len());
    let test_labels = split.test.labels().to_vec();

    let oracle_predictions = oracle_scores(&table, split.test.features())?;
    let oracle = ModelEvaluation {
        name: "optimal".to_string(),
        output: OutputKind::Continuous,
        train_hinge: min_hinge(&table),
        test_auc: roc_auc(&test_labels, &oracle_predictions, 1)?,
        test_predictions: oracle_predictions,
    };

    let mut models = Vec::with_capacity(classifiers.len());
    let mut failures = Vec::new();
    for classifier in classifiers {
        match evaluate_classifier(classifier.as_ref(), &split.train, &split.test) {
            Ok(evaluation) => models.push(evaluation),
            Err(message) => {
                log::warn!("Classifier '{}' failed: {message}", classifier.name());
                failures.push(ClassifierFailure {
                    name: classifier.name().to_string(),
                    message,
                });
            }
        }
    }

    log::info!(
        "p={fraction}: JSD={:.4}, train={}, test={}, delta={}",
        bound.divergence,
        bound.train_size,
        bound.test_size,
        bound.delta
    );

    Ok(ExperimentOutcome {
        fraction,
        bound,
        oracle,
        models,
        failures,
        test_labels,
    })
}

/// Fits and scores one classifier. Any failure, including predictions misaligned with
/// their rows, is the classifier's own and comes back as a message.
fn evaluate_classifier(
    classifier: &dyn Classifier,
    train: &Dataset,
    test: &Dataset,
) -> Result<ModelEvaluation, String> {
    let model = classifier
        .fit(train.features(), train.labels())
        .map_err(|e| e.to_string())?;
    let train_predictions = model.predict(train.features()).map_err(|e| e.to_string())?;
    let test_predictions = model.predict(test.features()).map_err(|e| e.to_string())?;

    let train_hinge = hinge_accuracy(classifier.output(), &train_predictions, train.labels())
        .map_err(|e| e.to_string())?;
    let test_auc = roc_auc(test.labels(), &test_predictions, 1).map_err(|e| e.to_string())?;

    Ok(ModelEvaluation {
        name: classifier.name().to_string(),
        output: classifier.output(),
        train_hinge,
        test_auc,
        test_predictions,
    })
}

/// Monte-Carlo split bounds of a whole dataset.
pub fn estimate_dataset_bounds(
    dataset: &Dataset,
    config: &MonteCarloConfig,
) -> Result<Vec<SplitBound>, ExperimentError> {
    let table = DistributionTable::in_sample(dataset)?;
    Ok(estimate_split_bounds(&table.aggregate(), config)?)
}

/// Draws an input and an output sample and bounds how well a model fitted on the first
/// can do on the second.
pub fn run_transfer_experiment<R: Rng + ?Sized>(
    input: &SyntheticSpec,
    output: &SyntheticSpec,
    size: usize,
    rng: &mut R,
) -> Result<TransferBounds, ExperimentError> {
    let input_data = generate(input, size, rng)?;
    let output_data = generate(output, size, rng)?;
    let table = DistributionTable::from_datasets(&input_data, &output_data)?;
    Ok(transfer_bounds(&table))
}

impl ExperimentOutcome {
    pub fn to_report(&self, source: &str, repeat: usize) -> ExperimentReport {
        let model_report = |m: &ModelEvaluation| ModelReport {
            name: m.name.clone(),
            output: m.output,
            train_hinge: m.train_hinge,
            test_auc: m.test_auc,
            test_predictions: m.test_predictions.clone(),
        };
        ExperimentReport {
            source: source.to_string(),
            fraction: self.fraction,
            repeat,
            failed_models: self
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.name, f.message))
                .collect(),
            test_labels: self.test_labels.clone(),
            bound: self.bound,
            models: std::iter::once(&self.oracle)
                .chain(&self.models)
                .map(model_report)
                .collect(),
        }
    }
}

/// Packs a selection run for persistence.
pub fn selection_report(
    source: &str,
    repeat: usize,
    classifiers: &[Box<dyn Classifier>],
    outcome: &SelectionOutcome,
) -> SelectionReport {
    SelectionReport {
        source: source.to_string(),
        repeat,
        reference_divergence: outcome.reference_divergence,
        selected: outcome.selected.clone(),
        columns: std::iter::once("divergence".to_string())
            .chain(std::iter::once("optimal".to_string()))
            .chain(classifiers.iter().map(|c| c.name().to_string()))
            .collect(),
        records: outcome.rounds.iter().map(|r| r.record()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierError, FittedClassifier, builtin_classifiers};
    use crate::driver::synthetic::SyntheticKind;
    use ndarray::ArrayView2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Broken;

    impl Classifier for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        fn output(&self) -> OutputKind {
            OutputKind::Discrete
        }
        fn fit(
            &self,
            _features: ArrayView2<'_, i64>,
            _labels: &[Label],
        ) -> Result<Box<dyn FittedClassifier>, ClassifierError> {
            Err(ClassifierError::Training("did not converge".to_string()))
        }
    }

    /// Fits fine but scores one row too few.
    struct DropsLastRow;

    impl Classifier for DropsLastRow {
        fn name(&self) -> &str {
            "drops-last-row"
        }
        fn output(&self) -> OutputKind {
            OutputKind::Continuous
        }
        fn fit(
            &self,
            _features: ArrayView2<'_, i64>,
            _labels: &[Label],
        ) -> Result<Box<dyn FittedClassifier>, ClassifierError> {
            Ok(Box::new(DropsLastRow))
        }
    }

    impl FittedClassifier for DropsLastRow {
        fn predict(&self, features: ArrayView2<'_, i64>) -> Result<Vec<f64>, ClassifierError> {
            Ok(vec![0.5; features.nrows().saturating_sub(1)])
        }
    }

    fn noisy_dataset() -> Dataset {
        let rows: Vec<Vec<i64>> = (0..300i64).map(|i| vec![i % 4, i % 3]).collect();
        let labels = (0..300).map(|i| u8::from(i % 4 == 0 || i % 7 == 0)).collect();
        Dataset::from_rows(&rows, labels).unwrap()
    }

    #[test]
    fn in_sample_experiment_reuses_the_dataset() {
        let data = noisy_dataset();
        let mut rng = StdRng::seed_from_u64(4);
        let outcome =
            evaluate_split(&data, 1.0, &builtin_classifiers(), &mut rng, &SplitConfig::default())
                .unwrap();
        assert_eq!(outcome.bound.train_size, 300);
        assert_eq!(outcome.bound.test_size, 300);
        assert_eq!(outcome.bound.delta, 0);
        assert_eq!(outcome.test_labels.len(), 300);
        assert_eq!(outcome.models.len(), 2);
        // The frequency model is the in-sample oracle, so it can do no better.
        assert_eq!(outcome.models[0].train_hinge, outcome.oracle.train_hinge);
    }

    #[test]
    fn held_out_experiment_partitions_the_data() {
        let data = noisy_dataset();
        let mut rng = StdRng::seed_from_u64(8);
        let outcome =
            evaluate_split(&data, 0.6, &builtin_classifiers(), &mut rng, &SplitConfig::default())
                .unwrap();
        assert_eq!(outcome.bound.train_size + outcome.bound.test_size, 300);
        assert_eq!(outcome.oracle.test_predictions.len(), outcome.bound.test_size);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn failing_classifier_does_not_abort() {
        let data = noisy_dataset();
        let mut rng = StdRng::seed_from_u64(8);
        let classifiers: Vec<Box<dyn Classifier>> = vec![Box::new(Broken)];
        let outcome =
            evaluate_split(&data, 0.5, &classifiers, &mut rng, &SplitConfig::default()).unwrap();
        assert!(outcome.models.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "broken");

        let report = outcome.to_report("noisy", 0);
        assert_eq!(report.models.len(), 1);
        assert_eq!(report.failed_models.len(), 1);
    }

    #[test]
    fn misaligned_predictions_are_a_classifier_failure() {
        let data = noisy_dataset();
        let mut rng = StdRng::seed_from_u64(8);
        let mut classifiers = builtin_classifiers();
        classifiers.push(Box::new(DropsLastRow));
        let outcome =
            evaluate_split(&data, 0.5, &classifiers, &mut rng, &SplitConfig::default()).unwrap();

        assert_eq!(outcome.models.len(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].name, "drops-last-row");
        assert!(outcome.failures[0].message.contains("predictions"));
        assert_eq!(outcome.bound.train_size + outcome.bound.test_size, 300);
    }

    #[test]
    fn transfer_between_identical_degenerate_samples() {
        let mut rng = StdRng::seed_from_u64(1);
        let spec = SyntheticSpec {
            kind: SyntheticKind::Poisson,
            parameter: 1.0,
            positive_probability: 1.0,
        };
        let bounds = run_transfer_experiment(&spec, &spec, 500, &mut rng).unwrap();
        assert_eq!(bounds.min_hinge, 0);
        assert_eq!(bounds.max_accuracy, 500);
        assert_eq!(bounds.delta, 0);
    }
}
