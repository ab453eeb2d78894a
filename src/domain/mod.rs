//! Domain layer: models, errors, and ports for the scoring core.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ScoreError, ScoreResult};
