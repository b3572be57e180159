use crate::types::Dataset;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("Train fraction {0} must lie in (0, 1), or be exactly 1 for an in-sample run.")]
    InvalidFraction(f64),
    #[error("Cannot split an empty dataset.")]
    EmptyDataset,
    #[error("No split with both parts non-empty was drawn in {attempts} attempts.")]
    Exhausted { attempts: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Redraws allowed before giving up on getting two non-empty parts.
    pub max_attempts: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { max_attempts: 1_000 }
    }
}

/// A train/test partition of one dataset.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
    /// Both parts are the whole dataset.
    pub in_sample: bool,
}

/// Draws a random partition with each example independently sent to train with
/// probability `fraction`.
///
/// `fraction == 1.0` is the in-sample case: no randomness, train and test are both the
/// whole dataset.
pub fn random_split<R: Rng + ?Sized>(
    dataset: &Dataset,
    fraction: f64,
    rng: &mut R,
    config: &SplitConfig,
) -> Result<Split, SplitError> {
    if dataset.is_empty() {
        return Err(SplitError::EmptyDataset);
    }
    if fraction == 1.0 {
        return Ok(Split {
            train: dataset.clone(),
            test: dataset.clone(),
            in_sample: true,
        });
    }
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(SplitError::InvalidFraction(fraction));
    }

    for attempt in 1..=config.max_attempts {
        let (train_rows, test_rows): (Vec<usize>, Vec<usize>) =
            (0..dataset.len()).partition(|_| rng.gen_bool(fraction));
        if !train_rows.is_empty() && !test_rows.is_empty() {
            if attempt > 1 {
                log::debug!("Non-empty split drawn after {attempt} attempts");
            }
            return Ok(Split {
                train: dataset.subset_rows(&train_rows),
                test: dataset.subset_rows(&test_rows),
                in_sample: false,
            });
        }
    }

    log::warn!(
        "Gave up splitting {} examples at fraction {fraction} after {} attempts",
        dataset.len(),
        config.max_attempts
    );
    Err(SplitError::Exhausted {
        attempts: config.max_attempts,
    })
}
