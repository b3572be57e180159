#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod classifier;
pub mod distribution;
pub mod divergence;
pub mod hinge;
pub mod metrics;
pub mod montecarlo;
pub mod oracle;
pub mod progress;
pub mod select;
pub mod types;

// The experiment driver: loading, splitting, persistence and dispatch.
#[path = "../driver/mod.rs"]
pub mod driver;
