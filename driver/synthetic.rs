//! One-feature synthetic datasets for transfer-bound experiments.

use crate::types::{Dataset, DatasetError};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, Normal, Poisson, Zeta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Mean of the normal family; only its spread is a parameter.
const NORMAL_MEAN: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntheticKind {
    /// Poisson(λ) counts.
    Poisson,
    /// Normal(10, σ), keeping positive draws only, truncated to integers.
    Normal,
    /// Power-law (zeta) draws with exponent `s > 1`.
    Power,
}

impl SyntheticKind {
    pub const ALL: [SyntheticKind; 3] = [Self::Poisson, Self::Normal, Self::Power];

    /// Parameters swept by the `--grid` transfer experiment for this family.
    pub fn default_parameters(self) -> &'static [f64] {
        match self {
            Self::Poisson => &[1.0, 4.0, 10.0],
            Self::Normal => &[1.0, 10.0],
            Self::Power => &[2.0, 4.0],
        }
    }
}

impl fmt::Display for SyntheticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Poisson => "poisson",
            Self::Normal => "normal",
            Self::Power => "power",
        })
    }
}

impl FromStr for SyntheticKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poisson" => Ok(Self::Poisson),
            "normal" => Ok(Self::Normal),
            "power" | "zipf" => Ok(Self::Power),
            other => Err(format!(
                "unknown distribution '{other}' (expected poisson, normal or power)"
            )),
        }
    }
}

/// A synthetic sample: feature distribution plus the probability of a positive label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub kind: SyntheticKind,
    pub parameter: f64,
    pub positive_probability: f64,
}

#[derive(Error, Debug)]
pub enum SyntheticError {
    #[error("Parameter {parameter} is not valid for the {kind} distribution.")]
    InvalidParameter { kind: SyntheticKind, parameter: f64 },
    #[error("Positive-label probability {0} is outside [0, 1].")]
    InvalidProbability(f64),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Draws `size` examples (fewer for the normal family, whose non-positive draws are
/// discarded). Labels are independent of the feature.
pub fn generate<R: Rng + ?Sized>(
    spec: &SyntheticSpec,
    size: usize,
    rng: &mut R,
) -> Result<Dataset, SyntheticError> {
    let invalid = || SyntheticError::InvalidParameter {
        kind: spec.kind,
        parameter: spec.parameter,
    };
    let labels_dist = Bernoulli::new(spec.positive_probability)
        .map_err(|_| SyntheticError::InvalidProbability(spec.positive_probability))?;

    let values: Vec<i64> = match spec.kind {
        SyntheticKind::Poisson => {
            let dist = Poisson::new(spec.parameter).map_err(|_| invalid())?;
            (0..size).map(|_| dist.sample(rng) as i64).collect()
        }
        SyntheticKind::Normal => {
            let dist = Normal::new(NORMAL_MEAN, spec.parameter).map_err(|_| invalid())?;
            (0..size)
                .map(|_| dist.sample(rng))
                .filter(|&x| x > 0.0)
                .map(|x| x as i64)
                .collect()
        }
        SyntheticKind::Power => {
            let dist = Zeta::new(spec.parameter).map_err(|_| invalid())?;
            (0..size).map(|_| dist.sample(rng) as i64).collect()
        }
    };

    let rows: Vec<Vec<i64>> = values.into_iter().map(|v| vec![v]).collect();
    let labels = (0..rows.len())
        .map(|_| u8::from(labels_dist.sample(rng)))
        .collect();
    Ok(Dataset::from_rows(&rows, labels)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parses_family_names() {
        assert_eq!("Poisson".parse::<SyntheticKind>(), Ok(SyntheticKind::Poisson));
        assert_eq!("zipf".parse::<SyntheticKind>(), Ok(SyntheticKind::Power));
        assert!("gamma".parse::<SyntheticKind>().is_err());
    }

    #[test]
    fn generates_requested_size_and_label_rate() {
        let mut rng = StdRng::seed_from_u64(9);
        let spec = SyntheticSpec {
            kind: SyntheticKind::Poisson,
            parameter: 4.0,
            positive_probability: 0.9,
        };
        let data = generate(&spec, 5_000, &mut rng).unwrap();
        assert_eq!(data.len(), 5_000);
        assert_eq!(data.feature_count(), 1);
        let rate = data.positive_count() as f64 / data.len() as f64;
        assert!((rate - 0.9).abs() < 0.03);
    }

    #[test]
    fn normal_draws_are_positive() {
        let mut rng = StdRng::seed_from_u64(2);
        let spec = SyntheticSpec {
            kind: SyntheticKind::Normal,
            parameter: 10.0,
            positive_probability: 0.5,
        };
        let data = generate(&spec, 2_000, &mut rng).unwrap();
        assert!(data.len() < 2_000);
        assert!(data.features().iter().all(|&v| v >= 0));
    }

    #[test]
    fn rejects_invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(2);
        let spec = SyntheticSpec {
            kind: SyntheticKind::Power,
            parameter: 1.0,
            positive_probability: 0.5,
        };
        assert!(matches!(
            generate(&spec, 10, &mut rng),
            Err(SyntheticError::InvalidParameter { .. })
        ));
    }
}
