//! # Empirical Distribution Tables
//!
//! A distribution table deduplicates feature vectors and tabulates how often each
//! distinct vector occurs with each label, separately for the train and the test part
//! of a split. Every bound in this crate is a function of such a table.
//!
//! Buckets are numbered in first-occurrence order (train rows first, then test rows).
//! Bucket identity is by exact value equality over the whole feature vector; the hash
//! index only accelerates the lookup.

use crate::types::{Dataset, Label, NUM_CLASSES};
use ahash::AHashMap;
use ndarray::{ArrayView1, ArrayView2};
use std::borrow::Cow;
use thiserror::Error;

/// Slot of the train-negative count in a bucket's count tuple.
pub const TRAIN_NEG: usize = 0;
/// Slot of the train-positive count.
pub const TRAIN_POS: usize = 1;
/// Slot of the test-negative count.
pub const TEST_NEG: usize = 2;
/// Slot of the test-positive count.
pub const TEST_POS: usize = 3;

/// `[train_neg, train_pos, test_neg, test_pos]` for one distinct feature vector.
pub type SplitCounts = [u64; 2 * NUM_CLASSES];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DistributionError {
    #[error("The train partition is empty; at least one train example is required.")]
    EmptyTrain,
    #[error("{rows} feature rows were supplied with {labels} labels.")]
    LengthMismatch { rows: usize, labels: usize },
    #[error("Feature width {found} does not match the table's width {expected}.")]
    WidthMismatch { expected: usize, found: usize },
    #[error("Label {0} is not a binary label.")]
    NonBinaryLabel(Label),
}

/// Label counts per distinct feature vector, split by train/test membership.
///
/// Built once per experiment and never updated; a new split or a new feature subset
/// means a new table.
#[derive(Debug, Clone)]
pub struct DistributionTable {
    index: AHashMap<Vec<i64>, usize>,
    vectors: Vec<Vec<i64>>,
    counts: Vec<SplitCounts>,
    width: usize,
    train_size: usize,
    test_size: usize,
    has_test: bool,
}

impl DistributionTable {
    /// Tabulates a train partition and, optionally, a held-out partition.
    pub fn from_split(
        train: ArrayView2<'_, i64>,
        train_labels: &[Label],
        test: Option<(ArrayView2<'_, i64>, &[Label])>,
    ) -> Result<Self, DistributionError> {
        if train.nrows() == 0 {
            return Err(DistributionError::EmptyTrain);
        }
        let mut table = Self {
            index: AHashMap::with_capacity(train.nrows()),
            vectors: Vec::new(),
            counts: Vec::new(),
            width: train.ncols(),
            train_size: 0,
            test_size: 0,
            has_test: test.is_some(),
        };

        table.tally(train, train_labels, TRAIN_NEG)?;
        table.train_size = train.nrows();

        if let Some((test_rows, test_labels)) = test {
            table.tally(test_rows, test_labels, TEST_NEG)?;
            table.test_size = test_rows.nrows();
        }

        Ok(table)
    }

    /// Tabulates a whole dataset with no held-out part (the 2-slot, in-sample table).
    pub fn in_sample(dataset: &Dataset) -> Result<Self, DistributionError> {
        Self::from_split(dataset.features(), dataset.labels(), None)
    }

    /// Tabulates a train dataset against a test dataset.
    pub fn from_datasets(train: &Dataset, test: &Dataset) -> Result<Self, DistributionError> {
        Self::from_split(
            train.features(),
            train.labels(),
            Some((test.features(), test.labels())),
        )
    }

    fn tally(
        &mut self,
        rows: ArrayView2<'_, i64>,
        labels: &[Label],
        offset: usize,
    ) -> Result<(), DistributionError> {
        if rows.nrows() != labels.len() {
            return Err(DistributionError::LengthMismatch {
                rows: rows.nrows(),
                labels: labels.len(),
            });
        }
        if rows.nrows() > 0 && rows.ncols() != self.width {
            return Err(DistributionError::WidthMismatch {
                expected: self.width,
                found: rows.ncols(),
            });
        }

        for (row, &label) in rows.rows().into_iter().zip(labels) {
            if label as usize >= NUM_CLASSES {
                return Err(DistributionError::NonBinaryLabel(label));
            }
            let bucket = self.bucket_or_insert(row);
            self.counts[bucket][offset + label as usize] += 1;
        }
        Ok(())
    }

    fn bucket_or_insert(&mut self, row: ArrayView1<'_, i64>) -> usize {
        let key = row_key(row);
        if let Some(&bucket) = self.index.get(&*key) {
            return bucket;
        }
        let bucket = self.vectors.len();
        let owned = key.into_owned();
        self.index.insert(owned.clone(), bucket);
        self.vectors.push(owned);
        self.counts.push([0; 2 * NUM_CLASSES]);
        bucket
    }

    /// Number of distinct feature vectors.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Whether the table carries held-out counts in slots 2 and 3.
    #[inline]
    pub fn has_test(&self) -> bool {
        self.has_test
    }

    #[inline]
    pub fn train_size(&self) -> usize {
        self.train_size
    }

    #[inline]
    pub fn test_size(&self) -> usize {
        self.test_size
    }

    /// The bucket a feature vector falls into, if it was seen while building.
    pub fn bucket_of(&self, row: ArrayView1<'_, i64>) -> Option<usize> {
        if row.len() != self.width {
            return None;
        }
        self.index.get(&*row_key(row)).copied()
    }

    /// Count tuple for a literal feature vector.
    pub fn counts_for(&self, vector: &[i64]) -> Option<SplitCounts> {
        self.index.get(vector).map(|&b| self.counts[b])
    }

    #[inline]
    pub fn counts(&self, bucket: usize) -> SplitCounts {
        self.counts[bucket]
    }

    /// Distinct feature vectors in first-occurrence order.
    pub fn vectors(&self) -> &[Vec<i64>] {
        &self.vectors
    }

    /// All count tuples in bucket order.
    pub fn buckets(&self) -> &[SplitCounts] {
        &self.counts
    }

    /// `[neg, pos]` train counts per bucket, in bucket order.
    pub fn train_counts(&self) -> impl Iterator<Item = [u64; NUM_CLASSES]> + Clone + '_ {
        self.counts.iter().map(|c| [c[TRAIN_NEG], c[TRAIN_POS]])
    }

    /// Sum of every count in the table.
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Collapses the table into per-vector class totals for split resampling.
    ///
    /// Buckets in which one class never occurs are pooled into two scalar totals; they
    /// contribute nothing to the hinge or delta terms and only need a single pair of
    /// binomial draws per trial.
    pub fn aggregate(&self) -> AggregateCounts {
        let mut aggregate = AggregateCounts::default();
        for c in &self.counts {
            let negative = c[TRAIN_NEG] + c[TEST_NEG];
            let positive = c[TRAIN_POS] + c[TEST_POS];
            aggregate.total += negative + positive;
            match (negative, positive) {
                (0, p) => aggregate.pure_positive += p,
                (n, 0) => aggregate.pure_negative += n,
                (n, p) => aggregate.mixed.push((n, p)),
            }
        }
        aggregate
    }
}

/// Whole-dataset class totals per distinct feature vector, with per-split detail
/// discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateCounts {
    /// `(negative, positive)` for every vector observed with both labels.
    pub mixed: Vec<(u64, u64)>,
    /// Examples whose vector was only ever observed as negative.
    pub pure_negative: u64,
    /// Examples whose vector was only ever observed as positive.
    pub pure_positive: u64,
    /// Total number of examples.
    pub total: u64,
}

fn row_key(row: ArrayView1<'_, i64>) -> Cow<'_, [i64]> {
    match row.to_slice() {
        Some(slice) => Cow::Borrowed(slice),
        None => Cow::Owned(row.to_vec()),
    }
}
