use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Invalid setup detected before any simulation state is created or mutated.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("time step must be positive and finite, got {0}")]
    NonPositiveDt(f64),
    #[error("unsupported integration order {0} (expected 1, 2 or 4)")]
    UnsupportedOrder(u8),
    #[error("body mass must be finite and non-negative, got {0}")]
    InvalidMass(f64),
    #[error("body position and velocity must be finite")]
    NonFiniteBody,
    #[error("collision radius must be positive and finite, got {0}")]
    InvalidRadius(f64),
    #[error("the chain force law couples every body and cannot use collision targets")]
    CoupledTargets,
    #[error("phase state has {found} values, expected {expected}")]
    StateLength { expected: usize, found: usize },
    #[error("operation requires the chain force law")]
    NotChain,
    #[error("task timeout must be positive and finite, got {0}")]
    InvalidTimeout(f64),
    #[error("invalid probe grid: {0}")]
    InvalidGrid(String),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("numeric degeneracy in {law} force law near ({x}, {y}): bodies must stay apart")]
    NumericDegeneracy { law: &'static str, x: f64, y: f64 },
    #[error("{time_units} time units is not a whole number of {dt} steps")]
    InexactTimeSpan { time_units: f64, dt: f64 },
    #[error("worker task {task} failed: {message}")]
    WorkerFailure { task: u64, message: String },
    #[error("worker tasks did not complete within {0:?}")]
    WorkerTimeout(Duration),
    #[error("failed to start worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
    #[error("simulation has been shut down")]
    ShutDown,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed trajectory data: {0}")]
    Format(String),
}
