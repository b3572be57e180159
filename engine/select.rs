//! # Greedy Divergence-Driven Feature Selection
//!
//! Grows a feature subset one feature per round. Each round draws a random handful of
//! the remaining features, scores every candidate subset (selected + candidate) by its
//! in-sample Jensen–Shannon divergence, and keeps the best one. The search stops as soon
//! as the best subset separates the classes exactly as well as the full feature set
//! does; otherwise it runs until the round cap.
//!
//! Candidates are evaluated in parallel but collected in sampling order, so ties go to
//! the earliest-sampled candidate and a fixed seed reproduces the whole run.

use crate::classifier::Classifier;
use crate::distribution::{DistributionError, DistributionTable};
use crate::divergence::js_divergence;
use crate::metrics::{MetricError, roc_auc};
use crate::oracle::{BoundError, oracle_scores};
use crate::progress::{SelectionObserver, SelectionStage};
use crate::types::{Dataset, DatasetError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("The dataset has no features to select from.")]
    NoFeatures,
    #[error("At least one candidate feature must be sampled per round.")]
    ZeroSampling,
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Bound(#[from] BoundError),
    #[error(transparent)]
    Metric(#[from] MetricError),
}

/// Tuning for [`select_features`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Candidates drawn per round (fewer when fewer features remain).
    pub feature_sampling: usize,
    /// Hard cap on the number of selected features.
    pub max_features: usize,
    /// Seed for candidate sampling; fresh entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            feature_sampling: 10,
            max_features: 50,
            seed: None,
        }
    }
}

/// The in-sample separability of a dataset and the AUC of each model on it.
#[derive(Debug, Clone, PartialEq)]
pub struct InSampleEvaluation {
    pub divergence: f64,
    /// Oracle AUC first, then one entry per classifier (`NaN` for a failed one).
    pub aucs: Vec<f64>,
}

/// One accepted feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRound {
    pub feature: usize,
    pub divergence: f64,
    pub aucs: Vec<f64>,
}

impl SelectionRound {
    /// `[divergence, auc_1, ..., auc_k]`.
    pub fn record(&self) -> Vec<f64> {
        std::iter::once(self.divergence)
            .chain(self.aucs.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionOutcome {
    pub reference_divergence: f64,
    /// Selected feature indices in selection order.
    pub selected: Vec<usize>,
    pub rounds: Vec<SelectionRound>,
}

/// Divergence of the whole dataset against itself.
pub fn in_sample_divergence(dataset: &Dataset) -> Result<f64, SelectionError> {
    Ok(js_divergence(&DistributionTable::in_sample(dataset)?))
}

/// Tabulates `dataset` in-sample and scores the oracle and every classifier on it.
///
/// A classifier that fails to fit or predict, or whose scores do not line up with the
/// rows, is logged and reported as `NaN`; it never aborts the evaluation.
pub fn evaluate_in_sample(
    dataset: &Dataset,
    classifiers: &[Box<dyn Classifier>],
) -> Result<InSampleEvaluation, SelectionError> {
    let table = DistributionTable::in_sample(dataset)?;
    let divergence = js_divergence(&table);
    let labels = dataset.labels();

    let mut aucs = Vec::with_capacity(classifiers.len() + 1);
    let oracle = oracle_scores(&table, dataset.features())?;
    aucs.push(roc_auc(labels, &oracle, 1)?);

    for classifier in classifiers {
        let auc = classifier
            .fit(dataset.features(), labels)
            .and_then(|model| model.predict(dataset.features()))
            .map_err(|e| e.to_string())
            .and_then(|scores| roc_auc(labels, &scores, 1).map_err(|e| e.to_string()));
        match auc {
            Ok(auc) => aucs.push(auc),
            Err(e) => {
                log::warn!("Classifier '{}' failed: {e}", classifier.name());
                aucs.push(f64::NAN);
            }
        }
    }

    Ok(InSampleEvaluation { divergence, aucs })
}

/// Runs the greedy search.
///
/// `reference_divergence` is the stopping target; when `None` it is computed from the
/// full feature set before the first round.
pub fn select_features(
    dataset: &Dataset,
    reference_divergence: Option<f64>,
    classifiers: &[Box<dyn Classifier>],
    config: &SelectionConfig,
    observer: &mut dyn SelectionObserver,
) -> Result<SelectionOutcome, SelectionError> {
    let feature_count = dataset.feature_count();
    if feature_count == 0 {
        return Err(SelectionError::NoFeatures);
    }
    if config.feature_sampling == 0 {
        return Err(SelectionError::ZeroSampling);
    }

    let reference_divergence = match reference_divergence {
        Some(value) => value,
        None => {
            observer.on_stage_start(SelectionStage::Baseline, 1);
            let value = in_sample_divergence(dataset)?;
            observer.on_stage_finish(SelectionStage::Baseline);
            value
        }
    };
    log::info!("Reference divergence over all {feature_count} features: {reference_divergence:.4}");

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut remaining: Vec<usize> = (0..feature_count).collect();
    let mut selected: Vec<usize> = Vec::new();
    let mut rounds = Vec::new();

    let max_rounds = feature_count.min(config.max_features);
    observer.on_stage_start(SelectionStage::Search, max_rounds);

    for round in 0..max_rounds {
        let sample_size = config.feature_sampling.min(remaining.len());
        let candidates: Vec<usize> = index::sample(&mut rng, remaining.len(), sample_size)
            .into_iter()
            .map(|position| remaining[position])
            .collect();

        let evaluations = candidates
            .par_iter()
            .map(|&candidate| {
                let mut subset = selected.clone();
                subset.push(candidate);
                evaluate_in_sample(&dataset.project(&subset)?, classifiers)
            })
            .collect::<Result<Vec<_>, SelectionError>>()?;

        for (candidate, evaluation) in candidates.iter().zip(&evaluations) {
            log::debug!("  candidate {candidate}: JSD={:.4}", evaluation.divergence);
        }

        let best = first_argmax(evaluations.iter().map(|e| e.divergence));
        let feature = candidates[best];
        let InSampleEvaluation { divergence, aucs } = evaluations[best].clone();

        remaining.retain(|&f| f != feature);
        selected.push(feature);
        log::info!(
            "Round {}: selected feature {feature}, JSD={divergence:.4}, AUCs={aucs:.4?}",
            round + 1
        );
        rounds.push(SelectionRound {
            feature,
            divergence,
            aucs,
        });
        observer.on_stage_advance(SelectionStage::Search, round + 1);

        if divergence == reference_divergence {
            log::info!("Selected subset matches the all-feature divergence; stopping.");
            break;
        }
    }
    observer.on_stage_finish(SelectionStage::Search);

    Ok(SelectionOutcome {
        reference_divergence,
        selected,
        rounds,
    })
}

/// Index of the first maximum.
fn first_argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best_index = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, value) in values.enumerate() {
        if value > best_value {
            best_index = i;
            best_value = value;
        }
    }
    best_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{
        ClassifierError, FittedClassifier, FrequencyClassifier, OutputKind, builtin_classifiers,
    };
    use crate::progress::NoopSelectionProgress;
    use crate::types::Label;
    use ndarray::ArrayView2;
    use std::collections::HashSet;

    /// Scores every row but the last.
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

    /// Feature 0 determines the label; features 1 and 2 are noise.
    fn informative_dataset() -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40i64 {
            let label = (i % 2) as u8;
            rows.push(vec![i64::from(label), i % 3, (i / 5) % 2]);
            labels.push(label);
        }
        Dataset::from_rows(&rows, labels).unwrap()
    }

    #[test]
    fn first_argmax_prefers_earliest_tie() {
        assert_eq!(first_argmax([0.2, 0.7, 0.7, 0.1].into_iter()), 1);
        assert_eq!(first_argmax([0.0, 0.0].into_iter()), 0);
    }

    #[test]
    fn finds_the_informative_feature_and_stops() {
        let dataset = informative_dataset();
        let config = SelectionConfig {
            seed: Some(11),
            ..SelectionConfig::default()
        };
        let outcome = select_features(
            &dataset,
            Some(1.0),
            &builtin_classifiers(),
            &config,
            &mut NoopSelectionProgress,
        )
        .unwrap();

        assert_eq!(outcome.selected, vec![0]);
        assert_eq!(outcome.rounds.len(), 1);
        assert_eq!(outcome.rounds[0].divergence, 1.0);
        // oracle + two builtins
        assert_eq!(outcome.rounds[0].record().len(), 4);
        assert_eq!(outcome.rounds[0].aucs[0], 1.0);
    }

    #[test]
    fn misaligned_scores_are_reported_as_nan() {
        let dataset = informative_dataset();
        let classifiers: Vec<Box<dyn Classifier>> =
            vec![Box::new(FrequencyClassifier), Box::new(DropsLastRow)];
        let evaluation = evaluate_in_sample(&dataset, &classifiers).unwrap();
        assert_eq!(evaluation.aucs.len(), 3);
        assert_eq!(evaluation.aucs[0], 1.0);
        assert!(!evaluation.aucs[1].is_nan());
        assert!(evaluation.aucs[2].is_nan());

        let outcome = select_features(
            &dataset,
            Some(1.0),
            &classifiers,
            &SelectionConfig {
                seed: Some(2),
                ..SelectionConfig::default()
            },
            &mut NoopSelectionProgress,
        )
        .unwrap();
        assert!(outcome.rounds.iter().all(|r| r.aucs[2].is_nan()));
    }

    #[test]
    fn computes_the_reference_when_absent() {
        let dataset = informative_dataset().project(&[1]).unwrap();
        let outcome = select_features(
            &dataset,
            None,
            &[],
            &SelectionConfig::default(),
            &mut NoopSelectionProgress,
        )
        .unwrap();
        assert_eq!(outcome.rounds.len(), 1);
        assert_eq!(outcome.reference_divergence, outcome.rounds[0].divergence);
        assert_eq!(
            outcome.reference_divergence,
            in_sample_divergence(&dataset).unwrap()
        );
    }

    #[test]
    fn respects_round_cap_and_never_repeats_features() {
        let dataset = informative_dataset();
        let config = SelectionConfig {
            feature_sampling: 1,
            max_features: 2,
            seed: Some(3),
        };
        // An unreachable reference keeps the search going until the cap.
        let outcome = select_features(
            &dataset,
            Some(2.0),
            &[Box::new(FrequencyClassifier) as Box<dyn Classifier>],
            &config,
            &mut NoopSelectionProgress,
        )
        .unwrap();

        assert_eq!(outcome.selected.len(), 2);
        let unique: HashSet<_> = outcome.selected.iter().collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn exhausts_features_when_reference_is_unreachable() {
        let dataset = informative_dataset();
        let config = SelectionConfig {
            feature_sampling: 2,
            max_features: 50,
            seed: Some(5),
        };
        let outcome =
            select_features(&dataset, Some(2.0), &[], &config, &mut NoopSelectionProgress)
                .unwrap();
        assert_eq!(outcome.rounds.len(), 3);
        let mut sorted = outcome.selected.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2]);
    }

    #[test]
    fn same_seed_same_selection() {
        let dataset = informative_dataset();
        let config = SelectionConfig {
            feature_sampling: 1,
            max_features: 3,
            seed: Some(42),
        };
        let run = || {
            select_features(&dataset, Some(2.0), &[], &config, &mut NoopSelectionProgress)
                .unwrap()
                .selected
        };
        assert_eq!(run(), run());
    }
}
