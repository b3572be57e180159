//! # Result Artifacts
//!
//! Every experiment writes one human-readable TOML file. The structs here are the
//! on-disk format; they are deliberately flat so the files can be read and diffed by
//! hand and loaded back for later analysis.

use super::synthetic::SyntheticSpec;
use crate::classifier::OutputKind;
use crate::montecarlo::SplitBound;
use crate::oracle::TransferBounds;
use crate::types::{BoundResult, Label};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read or write result file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse result file from TOML format: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize results to TOML format: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Predictions and scores of one model on one split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub name: String,
    pub output: OutputKind,
    pub train_hinge: u64,
    pub test_auc: f64,
    pub test_predictions: Vec<f64>,
}

/// One split of one dataset. The oracle is always the first entry of `models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub source: String,
    pub fraction: f64,
    pub repeat: usize,
    pub test_labels: Vec<Label>,
    pub failed_models: Vec<String>,
    pub bound: BoundResult,
    pub models: Vec<ModelReport>,
}

/// Monte-Carlo bounds of one dataset, keyed by train fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitBoundReport {
    pub source: String,
    pub dataset_size: usize,
    pub bounds: BTreeMap<String, SplitBound>,
}

impl SplitBoundReport {
    pub fn new(source: &str, dataset_size: usize, bounds: &[SplitBound]) -> Self {
        Self {
            source: source.to_string(),
            dataset_size,
            bounds: bounds
                .iter()
                .map(|b| (format!("{}", b.fraction), *b))
                .collect(),
        }
    }
}

/// One greedy selection run. Each record is `[divergence, oracle_auc, model_aucs...]`,
/// labelled by `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub source: String,
    pub repeat: usize,
    pub reference_divergence: f64,
    pub selected: Vec<usize>,
    pub columns: Vec<String>,
    pub records: Vec<Vec<f64>>,
}

pub fn save_toml<T: Serialize>(value: &T, path: &Path) -> Result<(), ReportError> {
    let toml_string = toml::to_string_pretty(value)?;
    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(toml_string.as_bytes())?;
    file.flush()?;
    Ok(())
}

pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ReportError> {
    let toml_string = fs::read_to_string(path)?;
    Ok(toml::from_str(&toml_string)?)
}

/// Dataset file name without its extension, used to name artifacts.
pub fn artifact_stem(source: &str) -> &str {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source)
}

pub fn experiment_path(dir: &Path, source: &str, fraction: f64, repeat: usize) -> PathBuf {
    dir.join(format!("{}_{fraction}_{repeat}.toml", artifact_stem(source)))
}

pub fn bounds_path(dir: &Path, source: &str) -> PathBuf {
    dir.join(format!("bounds_{}.toml", artifact_stem(source)))
}

pub fn features_path(dir: &Path, source: &str, repeat: usize) -> PathBuf {
    dir.join(format!("features_{}_{repeat}.toml", artifact_stem(source)))
}

/// Appends one tab-separated line for a transfer experiment:
/// input kind, parameter and probability, the same for the output, then the bounds.
pub fn append_transfer_line(
    path: &Path,
    input: &SyntheticSpec,
    output: &SyntheticSpec,
    bounds: &TransferBounds,
) -> Result<(), ReportError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        input.kind,
        input.parameter,
        input.positive_probability,
        output.kind,
        output.parameter,
        output.positive_probability,
        bounds.min_hinge,
        bounds.max_accuracy,
        bounds.delta
    )?;
    Ok(())
}
