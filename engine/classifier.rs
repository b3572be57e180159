//! # The Classifier Slot
//!
//! Any model can be compared against the oracle bounds as long as it can be fitted on
//! integer feature vectors with binary labels and then emit one prediction per row.
//! Whether those predictions are continuous scores or hard labels decides which hinge
//! scorer applies to them.
//!
//! Two lightweight baselines ship with the crate; real model families are supplied by
//! callers through the same traits.

use crate::distribution::{DistributionError, DistributionTable, TRAIN_NEG, TRAIN_POS};
use crate::types::Label;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape of a classifier's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    /// A real-valued score, higher meaning more likely positive.
    Continuous,
    /// A hard `0.0` / `1.0` label.
    Discrete,
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Training failed: {0}")]
    Training(String),
    #[error("Prediction failed: {0}")]
    Prediction(String),
    #[error("Failed to tabulate training data: {0}")]
    Distribution(#[from] DistributionError),
}

/// A model family that can be fitted to data.
///
/// Implementations hold only hyperparameters; `fit` returns an independent fitted
/// model, so one `Classifier` can be shared by many concurrent experiments.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    fn output(&self) -> OutputKind;

    fn fit(
        &self,
        features: ArrayView2<'_, i64>,
        labels: &[Label],
    ) -> Result<Box<dyn FittedClassifier>, ClassifierError>;
}

/// A fitted model. Predictions are aligned index-for-index with the input rows.
pub trait FittedClassifier: Send {
    fn predict(&self, features: ArrayView2<'_, i64>) -> Result<Vec<f64>, ClassifierError>;
}

/// Scores each vector with the positive fraction among its training occurrences, and
/// unseen vectors with the overall training prior.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyClassifier;

struct FittedFrequency {
    table: DistributionTable,
    prior: f64,
}

impl Classifier for FrequencyClassifier {
    fn name(&self) -> &str {
        "frequency"
    }

    fn output(&self) -> OutputKind {
        OutputKind::Continuous
    }

    fn fit(
        &self,
        features: ArrayView2<'_, i64>,
        labels: &[Label],
    ) -> Result<Box<dyn FittedClassifier>, ClassifierError> {
        let table = DistributionTable::from_split(features, labels, None)?;
        let positives = labels.iter().filter(|&&l| l == 1).count();
        let prior = positives as f64 / labels.len() as f64;
        Ok(Box::new(FittedFrequency { table, prior }))
    }
}

impl FittedClassifier for FittedFrequency {
    fn predict(&self, features: ArrayView2<'_, i64>) -> Result<Vec<f64>, ClassifierError> {
        Ok(features
            .rows()
            .into_iter()
            .map(|row| match self.table.bucket_of(row) {
                Some(bucket) => {
                    let counts = self.table.counts(bucket);
                    counts[TRAIN_POS] as f64 / (counts[TRAIN_NEG] + counts[TRAIN_POS]) as f64
                }
                None => self.prior,
            })
            .collect())
    }
}

/// Predicts the majority training label for every row (ties go to the negative class).
#[derive(Debug, Clone, Copy, Default)]
pub struct MajorityClassifier;

struct FittedMajority {
    label: f64,
}

impl Classifier for MajorityClassifier {
    fn name(&self) -> &str {
        "majority"
    }

    fn output(&self) -> OutputKind {
        OutputKind::Discrete
    }

    fn fit(
        &self,
        _features: ArrayView2<'_, i64>,
        labels: &[Label],
    ) -> Result<Box<dyn FittedClassifier>, ClassifierError> {
        if labels.is_empty() {
            return Err(ClassifierError::Training(
                "no training labels were supplied".to_string(),
            ));
        }
        let positives = labels.iter().filter(|&&l| l == 1).count();
        let label = if 2 * positives > labels.len() { 1.0 } else { 0.0 };
        Ok(Box::new(FittedMajority { label }))
    }
}

impl FittedClassifier for FittedMajority {
    fn predict(&self, features: ArrayView2<'_, i64>) -> Result<Vec<f64>, ClassifierError> {
        Ok(vec![self.label; features.nrows()])
    }
}

/// The built-in baselines, in reporting order.
pub fn builtin_classifiers() -> Vec<Box<dyn Classifier>> {
    vec![Box::new(FrequencyClassifier), Box::new(MajorityClassifier)]
}
