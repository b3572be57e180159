use crate::types::Label;
use itertools::Itertools;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MetricError {
    #[error("{scores} scores were supplied for {labels} labels.")]
    LengthMismatch { scores: usize, labels: usize },
}

/// Area under the ROC curve of `scores` against `labels`, treating `positive_label` as
/// the positive class.
///
/// Equal scores form one step of the curve and contribute a trapezoid, so ties count
/// as half a correct ordering. `NaN` when either class is absent, since the curve is
/// undefined.
pub fn roc_auc(labels: &[Label], scores: &[f64], positive_label: Label) -> Result<f64, MetricError> {
    if labels.len() != scores.len() {
        return Err(MetricError::LengthMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels)
        .map(|(&score, &label)| (score, label == positive_label))
        .collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let positives = pairs.iter().filter(|(_, positive)| *positive).count() as f64;
    let negatives = pairs.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return Ok(f64::NAN);
    }

    let (mut tp, mut fp, mut area) = (0.0f64, 0.0f64, 0.0f64);
    for (_, group) in &pairs.iter().chunk_by(|(score, _)| *score) {
        let (step_tp, step_fp) = group.fold((0.0, 0.0), |(t, f), &(_, positive)| {
            if positive { (t + 1.0, f) } else { (t, f + 1.0) }
        });
        area += step_fp * (2.0 * tp + step_tp) / 2.0;
        tp += step_tp;
        fp += step_fp;
    }
    debug_assert_eq!(fp, negatives);
    Ok(area / (positives * negatives))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn perfect_ranking_scores_one() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9], 1).unwrap();
        assert_abs_diff_eq!(auc, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn reversed_ranking_scores_zero() {
        let auc = roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9], 1).unwrap();
        assert_abs_diff_eq!(auc, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn ties_count_half() {
        // One positive-negative pair tied, one correctly ordered, of two pairs total.
        let auc = roc_auc(&[1, 0, 0], &[0.9, 0.9, 0.1], 1).unwrap();
        assert_abs_diff_eq!(auc, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn positive_label_can_be_flipped() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9], 0).unwrap();
        assert_abs_diff_eq!(auc, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn single_class_is_undefined() {
        assert!(roc_auc(&[1, 1], &[0.3, 0.4], 1).unwrap().is_nan());
        assert!(roc_auc(&[1], &[0.3, 0.4], 1).is_err());
    }
}
