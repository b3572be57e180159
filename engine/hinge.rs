//! Hinge accuracy of an arbitrary classifier's in-sample output.
//!
//! "Hinge loss" here is the count of examples on the wrong side of a decision
//! threshold. A continuous score is credited with its best threshold; a discrete
//! prediction is taken at face value.

use crate::classifier::OutputKind;
use crate::types::Label;
use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HingeError {
    #[error("{predictions} predictions were supplied for {labels} labels.")]
    LengthMismatch { predictions: usize, labels: usize },
}

/// Dispatches to the scorer matching the classifier's output kind.
pub fn hinge_accuracy(
    kind: OutputKind,
    predictions: &[f64],
    labels: &[Label],
) -> Result<u64, HingeError> {
    match kind {
        OutputKind::Continuous => continuous_hinge(predictions, labels),
        OutputKind::Discrete => discrete_hinge(predictions, labels),
    }
}

/// Minimum number of errors over every threshold that turns `scores` into a decision
/// (scores above the threshold predicted positive).
///
/// The sweep starts with the threshold above every score, where each positive is an
/// error, then lowers it past one distinct score at a time: the negatives at that
/// score become errors and its positives stop being errors.
pub fn continuous_hinge(scores: &[f64], labels: &[Label]) -> Result<u64, HingeError> {
    check_lengths(scores.len(), labels.len())?;

    let mut pairs: Vec<(f64, Label)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut hinge = labels.iter().filter(|&&l| l == 1).count() as i64;
    let mut best = hinge;
    for (_, group) in &pairs.iter().chunk_by(|(score, _)| *score) {
        let (negative, positive) = group.fold((0i64, 0i64), |(n, p), &(_, label)| {
            if label == 1 { (n, p + 1) } else { (n + 1, p) }
        });
        hinge += negative - positive;
        best = best.min(hinge);
    }
    Ok(best as u64)
}

/// Number of predictions that differ from the true label.
pub fn discrete_hinge(predictions: &[f64], labels: &[Label]) -> Result<u64, HingeError> {
    check_lengths(predictions.len(), labels.len())?;
    Ok(predictions
        .iter()
        .zip(labels)
        .filter(|&(&prediction, &label)| prediction != f64::from(label))
        .count() as u64)
}

fn check_lengths(predictions: usize, labels: usize) -> Result<(), HingeError> {
    if predictions != labels {
        return Err(HingeError::LengthMismatch {
            predictions,
            labels,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tied_scores_cost_one_error() {
        assert_eq!(continuous_hinge(&[0.9, 0.9, 0.1], &[1, 0, 0]), Ok(1));
    }

    #[test]
    fn perfectly_ranked_scores_cost_nothing() {
        assert_eq!(continuous_hinge(&[0.8, 0.7, 0.2, 0.1], &[1, 1, 0, 0]), Ok(0));
    }

    #[test]
    fn inverted_ranking_prefers_all_negative_or_all_positive() {
        // Best threshold is above or below everything: two errors either way.
        assert_eq!(continuous_hinge(&[0.1, 0.2, 0.8, 0.9], &[1, 1, 0, 0]), Ok(2));
    }

    #[test]
    fn empty_input_has_no_errors() {
        assert_eq!(continuous_hinge(&[], &[]), Ok(0));
    }

    #[test]
    fn discrete_counts_mismatches() {
        assert_eq!(discrete_hinge(&[1.0, 0.0, 1.0, 0.5], &[1, 1, 0, 0]), Ok(3));
        assert_eq!(
            hinge_accuracy(OutputKind::Discrete, &[1.0], &[1, 0]),
            Err(HingeError::LengthMismatch {
                predictions: 1,
                labels: 2
            })
        );
    }
}
