//! # Dataset Loading
//!
//! Reads the plain-text datasets the experiments run on and turns them into a
//! validated [`Dataset`].
//!
//! - Format: one example per line, fields separated by commas when the first line
//!   contains one and by spaces otherwise. Repeated separators are tolerated.
//! - Schema: every field but the last two is an integer feature, the second-to-last is
//!   the raw integer label and the last field is ignored.
//! - Labels: raw labels are densified to `0..class_count` in ascending order of their
//!   raw value. The bound engine is binary, so more than two classes is an error.

use crate::types::{Dataset, DatasetError, Label};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A dataset as loaded from disk, with the bookkeeping reported alongside it.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    /// File name without directories, used to name output artifacts.
    pub name: String,
    pub feature_count: usize,
    pub class_count: usize,
    pub dataset: Dataset,
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Malformed delimited text: {0}")]
    CsvError(#[from] csv::Error),
    #[error("The input file '{0}' contains no examples.")]
    Empty(PathBuf),
    #[error("Line {line} has {found} fields; at least one feature, a label and a trailing field are required.")]
    TooFewFields { line: u64, found: usize },
    #[error("Line {line}, field {field}: '{value}' is not an integer.")]
    InvalidInteger {
        line: u64,
        field: usize,
        value: String,
    },
    #[error("Line {line} has {found} features, but the first example has {expected}.")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("Found {found} distinct labels; only binary classification is supported.")]
    TooManyClasses { found: usize },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Loads and validates one dataset file.
pub fn load_dataset(path: &Path) -> Result<LoadedDataset, DataError> {
    let contents = fs::read_to_string(path)?;
    let delimiter = match contents.lines().next() {
        Some(first) if first.contains(',') => b',',
        Some(_) => b' ',
        None => return Err(DataError::Empty(path.to_path_buf())),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut rows: Vec<Vec<i64>> = Vec::new();
    let mut raw_labels: Vec<i64> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 3 {
            return Err(DataError::TooFewFields {
                line,
                found: fields.len(),
            });
        }

        let parse = |field: usize| -> Result<i64, DataError> {
            fields[field]
                .parse::<i64>()
                .map_err(|_| DataError::InvalidInteger {
                    line,
                    field: field + 1,
                    value: fields[field].to_string(),
                })
        };
        let width = fields.len() - 2;
        let features = (0..width).map(parse).collect::<Result<Vec<_>, _>>()?;
        if let Some(first) = rows.first() {
            if first.len() != width {
                return Err(DataError::RaggedRow {
                    line,
                    expected: first.len(),
                    found: width,
                });
            }
        }
        raw_labels.push(parse(width)?);
        rows.push(features);
    }

    if rows.is_empty() {
        return Err(DataError::Empty(path.to_path_buf()));
    }

    let (class_count, labels) = densify_labels(&raw_labels)?;
    let dataset = Dataset::from_rows(&rows, labels)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    log::debug!(
        "Loaded '{}': {} examples, {} features, {} classes",
        name,
        dataset.len(),
        dataset.feature_count(),
        class_count
    );

    Ok(LoadedDataset {
        name,
        feature_count: dataset.feature_count(),
        class_count,
        dataset,
    })
}

/// Maps raw labels onto `0..class_count`, ordered by raw value.
fn densify_labels(raw: &[i64]) -> Result<(usize, Vec<Label>), DataError> {
    let mut codes: BTreeMap<i64, Label> = BTreeMap::new();
    for &label in raw {
        codes.entry(label).or_insert(0);
    }
    if codes.len() > 2 {
        return Err(DataError::TooManyClasses { found: codes.len() });
    }
    for (code, slot) in codes.values_mut().enumerate() {
        *slot = code as Label;
    }
    Ok((codes.len(), raw.iter().map(|label| codes[label]).collect()))
}

/// Expands the given inputs into dataset files: files are kept as given, directories
/// contribute every regular file they contain, sorted by name.
pub fn resolve_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, DataError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries = fs::read_dir(input)?
                .map(|entry| entry.map(|e| e.path()))
                .collect::<Result<Vec<_>, _>>()?;
            entries.retain(|p| p.is_file());
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_comma_separated_rows() {
        let file = write_temp("1,2,7,x\n3,4,9,x\n1,2,9,x\n");
        let loaded = load_dataset(file.path()).unwrap();
        assert_eq!(loaded.feature_count, 2);
        assert_eq!(loaded.class_count, 2);
        assert_eq!(loaded.dataset.labels(), &[0, 1, 1]);
        assert_eq!(loaded.dataset.features().row(1).to_vec(), vec![3, 4]);
    }

    #[test]
    fn tolerates_repeated_spaces() {
        let file = write_temp("5  6 1 0\n7 8  0 0\n");
        let loaded = load_dataset(file.path()).unwrap();
        assert_eq!(loaded.dataset.len(), 2);
        assert_eq!(loaded.dataset.labels(), &[1, 0]);
    }

    #[test]
    fn rejects_multiclass_and_bad_fields() {
        let file = write_temp("1,0,0\n1,1,0\n1,2,0\n");
        assert!(matches!(
            load_dataset(file.path()),
            Err(DataError::TooManyClasses { found: 3 })
        ));

        let file = write_temp("1,a,0,0\n");
        assert!(matches!(
            load_dataset(file.path()),
            Err(DataError::InvalidInteger { field: 2, .. })
        ));

        let file = write_temp("1,2,0,0\n1,0,0\n");
        assert!(matches!(
            load_dataset(file.path()),
            Err(DataError::RaggedRow { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn densifies_in_ascending_order() {
        let (count, labels) = densify_labels(&[4, -1, 4, 4]).unwrap();
        assert_eq!(count, 2);
        assert_eq!(labels, vec![1, 0, 1, 1]);
    }
}
