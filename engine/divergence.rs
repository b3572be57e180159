//! Jensen–Shannon separability between the negative and positive class-conditional
//! distributions over distinct feature vectors.

use crate::distribution::DistributionTable;
use crate::types::NUM_CLASSES;

/// Jensen–Shannon divergence (in bits) between the empirical distributions of the
/// negative and the positive train examples over the table's buckets.
///
/// `0.0` means the two classes are spread identically over the feature vectors; the
/// score approaches `1.0` as they stop sharing vectors. Only the train slots are read,
/// so in-sample and split tables are both accepted.
pub fn js_divergence(table: &DistributionTable) -> f64 {
    js_divergence_from_counts(table.train_counts())
}

/// The same score over an arbitrary sequence of `[negative, positive]` counts.
///
/// A class with no examples at all has an undefined conditional distribution; its
/// terms are skipped instead of dividing by zero.
pub fn js_divergence_from_counts<I>(counts: I) -> f64
where
    I: IntoIterator<Item = [u64; NUM_CLASSES]>,
    I::IntoIter: Clone,
{
    let counts = counts.into_iter();
    let (negative_sum, positive_sum) = counts
        .clone()
        .fold((0u64, 0u64), |(n, p), [a, b]| (n + a, p + b));

    let mut js = 0.0;
    for [negative, positive] in counts {
        let p0 = ratio(negative, negative_sum);
        let p1 = ratio(positive, positive_sum);
        let mean = p0 + p1;
        if p0 > 0.0 {
            js += 0.5 * p0 * (2.0 * p0 / mean).log2();
        }
        if p1 > 0.0 {
            js += 0.5 * p1 * (2.0 * p1 / mean).log2();
        }
    }
    js
}

#[inline]
fn ratio(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
