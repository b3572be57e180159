// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// Only types used by more than one module belong here; module-local types stay local.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dense, zero-based binary label. `0` is the negative class, `1` the positive class.
pub type Label = u8;

/// The number of label slots a binary problem occupies in a count tuple.
pub const NUM_CLASSES: usize = 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Feature matrix has {rows} rows but {labels} labels were supplied.")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("Label {label} at row {row} is not a binary label (expected 0 or 1).")]
    NonBinaryLabel { row: usize, label: Label },
    #[error("Feature index {index} is out of range for a dataset with {width} features.")]
    FeatureOutOfRange { index: usize, width: usize },
    #[error("Row {row} has {found} features, but the first row has {expected}.")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// An ordered collection of integer feature vectors paired with binary labels.
///
/// Rows of `features` are the feature vectors; every row has the same width, fixed
/// when the dataset is constructed. The dataset is never mutated after construction;
/// projections and splits produce new datasets.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<i64>,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new(features: Array2<i64>, labels: Vec<Label>) -> Result<Self, DatasetError> {
        if features.nrows() != labels.len() {
            return Err(DatasetError::LengthMismatch {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        if let Some((row, &label)) = labels.iter().enumerate().find(|&(_, &l)| l > 1) {
            return Err(DatasetError::NonBinaryLabel { row, label });
        }
        Ok(Self { features, labels })
    }

    /// Builds a dataset from row vectors. All rows must share the width of the first row.
    pub fn from_rows(rows: &[Vec<i64>], labels: Vec<Label>) -> Result<Self, DatasetError> {
        let width = rows.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(rows.len() * width);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != width {
                return Err(DatasetError::RaggedRow {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            flat.extend_from_slice(values);
        }
        // Shape and buffer length agree by construction.
        let features = Array2::from_shape_vec((rows.len(), width), flat).map_err(|_| {
            DatasetError::LengthMismatch {
                rows: rows.len(),
                labels: labels.len(),
            }
        })?;
        Self::new(features, labels)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn feature_count(&self) -> usize {
        self.features.ncols()
    }

    #[inline]
    pub fn features(&self) -> ArrayView2<'_, i64> {
        self.features.view()
    }

    #[inline]
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of positive examples.
    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Keeps only the listed feature columns, in the listed order.
    pub fn project(&self, feature_subset: &[usize]) -> Result<Self, DatasetError> {
        let width = self.feature_count();
        if let Some(&index) = feature_subset.iter().find(|&&i| i >= width) {
            return Err(DatasetError::FeatureOutOfRange { index, width });
        }
        Ok(Self {
            features: self.features.select(Axis(1), feature_subset),
            labels: self.labels.clone(),
        })
    }

    /// Keeps only the listed rows, in the listed order.
    pub fn subset_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), rows),
            labels: rows.iter().map(|&r| self.labels[r]).collect(),
        }
    }
}

/// The outcome of one (dataset, split) bound evaluation.
///
/// `delta` is the disagreement between the decisions implied by the train counts and
/// those implied by the test counts, summed over distinct feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundResult {
    pub divergence: f64,
    pub dataset_size: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub delta: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_non_binary_labels() {
        let err = Dataset::new(array![[1], [2]], vec![0, 2]).unwrap_err();
        assert_eq!(err, DatasetError::NonBinaryLabel { row: 1, label: 2 });
    }

    #[test]
    fn rejects_ragged_rows() {
        let rows = vec![vec![1, 2], vec![3]];
        assert!(Dataset::from_rows(&rows, vec![0, 1]).is_err());
    }

    #[test]
    fn projection_keeps_requested_column_order() {
        let data = Dataset::new(array![[1, 2, 3], [4, 5, 6]], vec![0, 1]).unwrap();
        let projected = data.project(&[2, 0]).unwrap();
        assert_eq!(projected.features(), array![[3, 1], [6, 4]]);
        assert_eq!(projected.labels(), &[0, 1]);
        assert!(data.project(&[3]).is_err());
    }
}
