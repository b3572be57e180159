//! # The Oracle Bound Calculator
//!
//! Bounds derived from a distribution table alone, without any trained model: the
//! unavoidable train error of a per-vector optimal decision, the disagreement between
//! train-implied and test-implied decisions, and the oracle's scores.
//!
//! The oracle scores a held-out vector with the positive fraction of its *test*
//! counts. That is an idealised upper reference, not a deployable predictor: it reads
//! the labels it is evaluated against. Downstream comparisons are calibrated against
//! exactly this definition, so it must not be "corrected" to use train counts.

use crate::distribution::{
    DistributionTable, SplitCounts, TEST_NEG, TEST_POS, TRAIN_NEG, TRAIN_POS,
};
use crate::divergence::js_divergence;
use crate::types::BoundResult;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BoundError {
    #[error("Row {row} holds a feature vector that does not occur in the distribution table.")]
    UnknownVector { row: usize },
}

/// Oracle score for every row of `rows`.
///
/// Split tables score with `test_pos / (test_neg + test_pos)`; in-sample tables, which
/// carry no test slots, with `pos / (neg + pos)` over the whole sample. A bucket with no
/// counts on the scored side scores `0.0`.
pub fn oracle_scores(
    table: &DistributionTable,
    rows: ArrayView2<'_, i64>,
) -> Result<Vec<f64>, BoundError> {
    let (negative_slot, positive_slot) = if table.has_test() {
        (TEST_NEG, TEST_POS)
    } else {
        (TRAIN_NEG, TRAIN_POS)
    };

    rows.rows()
        .into_iter()
        .enumerate()
        .map(|(row, vector)| {
            let bucket = table
                .bucket_of(vector)
                .ok_or(BoundError::UnknownVector { row })?;
            let counts = table.counts(bucket);
            let denominator = counts[negative_slot] + counts[positive_slot];
            Ok(if denominator == 0 {
                0.0
            } else {
                counts[positive_slot] as f64 / denominator as f64
            })
        })
        .collect()
}

/// The fewest train examples any per-vector decision rule can misclassify:
/// `Σ min(train_neg, train_pos)`.
pub fn min_hinge(table: &DistributionTable) -> u64 {
    table
        .buckets()
        .iter()
        .map(|c| c[TRAIN_NEG].min(c[TRAIN_POS]))
        .sum()
}

/// Disagreement between the decisions implied by the train and the test counts:
/// `Σ max(a1, a3) + max(a2, a4) - max(a1 + a2, a3 + a4)`.
pub fn split_delta(table: &DistributionTable) -> u64 {
    table.buckets().iter().map(bucket_delta).sum()
}

#[inline]
fn bucket_delta(c: &SplitCounts) -> u64 {
    let [a1, a2, a3, a4] = *c;
    a1.max(a3) + a2.max(a4) - (a1 + a2).max(a3 + a4)
}

/// The bound record of one (dataset, split) evaluation.
pub fn bound_result(table: &DistributionTable, dataset_size: usize) -> BoundResult {
    BoundResult {
        divergence: js_divergence(table),
        dataset_size,
        train_size: table.train_size(),
        test_size: table.test_size(),
        delta: split_delta(table),
    }
}

/// Bounds for a model fitted on one sample (train slots) and deployed on another
/// (test slots).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferBounds {
    /// `Σ min(a, b)` over the input sample.
    pub min_hinge: u64,
    /// `Σ max(c, d)` over the output sample.
    pub max_accuracy: u64,
    /// `Σ min(|a - b|, |c - d|)` over vectors whose majority label flips between samples.
    pub delta: u64,
}

/// Tabulates [`TransferBounds`] from a table whose train slots hold the input sample
/// and whose test slots hold the output sample. Vectors seen in only one sample add
/// nothing to `delta`.
pub fn transfer_bounds(table: &DistributionTable) -> TransferBounds {
    let mut bounds = TransferBounds {
        min_hinge: 0,
        max_accuracy: 0,
        delta: 0,
    };
    for &[a, b, c, d] in table.buckets() {
        bounds.min_hinge += a.min(b);
        bounds.max_accuracy += c.max(d);
        let input_sign = a.cmp(&b);
        let output_sign = c.cmp(&d);
        if input_sign != output_sign && input_sign.is_ne() && output_sign.is_ne() {
            bounds.delta += a.abs_diff(b).min(c.abs_diff(d));
        }
    }
    bounds
}
