//! # Monte-Carlo Split Bounds
//!
//! Estimates how the oracle bounds behave when the train/test split is drawn at random
//! many times. Rather than re-partitioning the raw examples, each trial resamples the
//! per-vector class totals: for a train fraction `p`, a vector seen `a` times as
//! negative and `b` times as positive keeps `a1 ~ Binomial(a, p)` negatives and
//! `b1 ~ Binomial(b, p)` positives in the train part.
//!
//! Trials are processed in fixed-size chunks on the rayon pool. Each chunk owns an RNG
//! seeded from the base seed, the fraction index and the chunk index, and all
//! accumulators are integers, so a given seed yields identical results on any number
//! of threads.

use crate::distribution::AggregateCounts;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Train fractions evaluated when none are given.
pub const DEFAULT_FRACTIONS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

/// Trials handled by one RNG stream.
const TRIAL_CHUNK: usize = 1024;

#[derive(Error, Debug, PartialEq)]
pub enum MonteCarloError {
    #[error("Train fraction {0} is outside the open interval (0, 1).")]
    InvalidFraction(f64),
    #[error("At least one resampling trial is required.")]
    ZeroTrials,
    #[error("Cannot estimate split bounds for an empty dataset.")]
    EmptyDataset,
}

/// Tuning for [`estimate_split_bounds`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Train fractions to evaluate, each in `(0, 1)`.
    pub fractions: Vec<f64>,
    /// Fixed trial count. When `None` the count is picked from the dataset size.
    pub trials: Option<usize>,
    /// Datasets with more examples than this use `large_dataset_trials`.
    pub large_dataset_threshold: u64,
    pub large_dataset_trials: usize,
    pub small_dataset_trials: usize,
    /// Base seed; a random one is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            fractions: DEFAULT_FRACTIONS.to_vec(),
            trials: None,
            large_dataset_threshold: 10_000,
            large_dataset_trials: 100_000,
            small_dataset_trials: 1_000_000,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    /// Trial count used for a dataset of `dataset_size` examples.
    pub fn trials_for(&self, dataset_size: u64) -> usize {
        match self.trials {
            Some(trials) => trials,
            None if dataset_size > self.large_dataset_threshold => self.large_dataset_trials,
            None => self.small_dataset_trials,
        }
    }
}

/// The resampled bound envelope for one train fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitBound {
    pub fraction: f64,
    /// Total unavoidable train errors over total train examples, across all trials.
    pub min_hinge_rate: f64,
    /// Total best-case test hits over total test examples, across all trials.
    pub max_accuracy_rate: f64,
    /// Mean per-trial decision disagreement, normalised by the dataset size.
    pub expected_delta: f64,
    /// Mean train size divided by mean total size.
    pub train_share: f64,
    pub trials: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    train: u64,
    test: u64,
    min_hinge: u64,
    max_accuracy: u64,
    delta: u64,
}

impl Tally {
    fn merge(self, other: Self) -> Self {
        Self {
            train: self.train + other.train,
            test: self.test + other.test,
            min_hinge: self.min_hinge + other.min_hinge,
            max_accuracy: self.max_accuracy + other.max_accuracy,
            delta: self.delta + other.delta,
        }
    }
}

/// A vector observed with both labels, with its two train-count samplers.
struct MixedBucket {
    negative: u64,
    positive: u64,
    negative_draw: Binomial,
    positive_draw: Binomial,
}

/// Estimates the bound envelope for every configured train fraction.
pub fn estimate_split_bounds(
    aggregate: &AggregateCounts,
    config: &MonteCarloConfig,
) -> Result<Vec<SplitBound>, MonteCarloError> {
    if aggregate.total == 0 {
        return Err(MonteCarloError::EmptyDataset);
    }
    let trials = config.trials_for(aggregate.total);
    if trials == 0 {
        return Err(MonteCarloError::ZeroTrials);
    }
    let base_seed = config.seed.unwrap_or_else(|| rand::thread_rng().next_u64());

    log::info!(
        "Resampling {} examples ({} mixed vectors) with {} trials per fraction",
        aggregate.total,
        aggregate.mixed.len(),
        trials
    );

    config
        .fractions
        .iter()
        .enumerate()
        .map(|(index, &fraction)| {
            let seed = base_seed.wrapping_add((index as u64) << 40);
            let bound = estimate_fraction(aggregate, fraction, trials, seed)?;
            log::debug!(
                "p={fraction}: min hinge {:.6}, max accuracy {:.6}, delta {:.6}",
                bound.min_hinge_rate,
                bound.max_accuracy_rate,
                bound.expected_delta
            );
            Ok(bound)
        })
        .collect()
}

fn estimate_fraction(
    aggregate: &AggregateCounts,
    fraction: f64,
    trials: usize,
    seed: u64,
) -> Result<SplitBound, MonteCarloError> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(MonteCarloError::InvalidFraction(fraction));
    }
    let binomial =
        |n: u64| Binomial::new(n, fraction).map_err(|_| MonteCarloError::InvalidFraction(fraction));

    let mixed = aggregate
        .mixed
        .iter()
        .map(|&(negative, positive)| {
            Ok(MixedBucket {
                negative,
                positive,
                negative_draw: binomial(negative)?,
                positive_draw: binomial(positive)?,
            })
        })
        .collect::<Result<Vec<_>, MonteCarloError>>()?;
    let pure_negative = aggregate.pure_negative;
    let pure_positive = aggregate.pure_positive;
    let pure_negative_draw = binomial(pure_negative)?;
    let pure_positive_draw = binomial(pure_positive)?;

    let num_chunks = trials.div_ceil(TRIAL_CHUNK);
    let tally = (0..num_chunks)
        .into_par_iter()
        .map(|chunk| {
            let chunk_trials = TRIAL_CHUNK.min(trials - chunk * TRIAL_CHUNK);
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(chunk as u64));
            let mut tally = Tally::default();

            for _ in 0..chunk_trials {
                for bucket in &mixed {
                    let a1 = bucket.negative_draw.sample(&mut rng);
                    let b1 = bucket.positive_draw.sample(&mut rng);
                    let a2 = bucket.negative - a1;
                    let b2 = bucket.positive - b1;

                    tally.train += a1 + b1;
                    tally.test += a2 + b2;
                    tally.min_hinge += a1.min(b1);
                    tally.max_accuracy += a2.max(b2);
                    tally.delta += a1.max(b1) + a2.max(b2) - bucket.negative.max(bucket.positive);
                }

                // Single-class vectors never cost a hinge error or a decision flip, and
                // every one of their test examples is a best-case hit.
                let a1 = pure_negative_draw.sample(&mut rng);
                let b1 = pure_positive_draw.sample(&mut rng);
                let held_out = (pure_negative - a1) + (pure_positive - b1);
                tally.train += a1 + b1;
                tally.test += held_out;
                tally.max_accuracy += held_out;
            }
            tally
        })
        .reduce(Tally::default, Tally::merge);

    Ok(SplitBound {
        fraction,
        min_hinge_rate: rate(tally.min_hinge, tally.train),
        max_accuracy_rate: rate(tally.max_accuracy, tally.test),
        expected_delta: tally.delta as f64 / trials as f64 / aggregate.total as f64,
        train_share: rate(tally.train, tally.train + tally.test),
        trials,
    })
}

#[inline]
fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
