//! Error types.

use thiserror::Error;

use crate::backend::Backend;

/// Crate result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Rejected configuration. The solver never starts from an invalid state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("grid must be at least {min}x{min}, got {rows}x{cols}")]
    GridTooSmall { rows: usize, cols: usize, min: usize },

    #[error("{rows}x{cols} grid does not fit in memory")]
    GridTooLarge { rows: usize, cols: usize },

    #[error("wave speed C must be positive and finite, got {0}")]
    InvalidWaveSpeed(f64),

    #[error("damping K must be non-negative and finite, got {0}")]
    InvalidDamping(f64),

    #[error("time step dt must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("bump width must be odd, got {0}")]
    EvenBumpWidth(usize),

    #[error("bump of width {width} at ({row}, {col}) does not fit in a {rows}x{cols} grid")]
    BumpOutOfBounds {
        width: usize,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("grid shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("{rows}x{cols} grid needs {} cells, got {found}", .rows * .cols)]
    LengthMismatch {
        rows: usize,
        cols: usize,
        found: usize,
    },

    #[error("invalid configuration file: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigurationError {
    fn from(e: toml::de::Error) -> Self {
        ConfigurationError::Parse(e.to_string())
    }
}

/// The requested backend cannot run here: not compiled in, or no suitable device.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("backend `{backend}` is unavailable: {reason}")]
pub struct BackendUnavailableError {
    pub backend: Backend,
    pub reason: String,
}

impl BackendUnavailableError {
    pub fn new(backend: Backend, reason: impl Into<String>) -> Self {
        Self {
            backend,
            reason: reason.into(),
        }
    }
}

/// Any failure surfaced by the crate.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    BackendUnavailable(#[from] BackendUnavailableError),

    /// Perturbation outside the grid.
    #[error("cell ({row}, {col}) is outside the {rows}x{cols} grid")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// The GPU failed after it was selected (device lost, readback failure).
    #[error("GPU step failed: {0}")]
    Device(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}
