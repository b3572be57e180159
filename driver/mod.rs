//! The experiment driver around the bound engine: dataset loading, random splits,
//! synthetic samples, per-task experiments, TOML reports and parallel dispatch.

pub mod data;
pub mod dispatch;
pub mod experiment;
pub mod report;
pub mod split;
pub mod synthetic;
