//! Simulation configuration, loadable from TOML.
//!
//! Every key is optional; missing keys take the values of [`SimulationConfig::default`].
//!
//! ```toml
//! rows = 60
//! cols = 60
//! C = 12.0
//! K = 0.9
//! dt = 0.05
//! baseline_height = 1.0
//! bump_height = 5.0
//! bump_half_width = 31
//! bump_offset = [20, 20]
//! backend = "parallel"
//! fallback_backend = "reference"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::error::{ConfigurationError, Result};
use crate::grid;
use crate::initial::{GaussianBump, InitialCondition};
use crate::params::WaveParams;

/// Smallest grid side a simulation accepts.
pub const MIN_GRID_SIDE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub rows: usize,
    pub cols: usize,
    /// Wave speed `C`.
    #[serde(rename = "C")]
    pub wave_speed: f64,
    /// Damping `K`.
    #[serde(rename = "K")]
    pub damping: f64,
    pub dt: f64,
    pub baseline_height: f64,
    pub bump_height: f64,
    /// Side length of the square bump patch, odd.
    pub bump_half_width: usize,
    /// Top-left corner `(row, col)` of the bump patch.
    pub bump_offset: (usize, usize),
    pub backend: Backend,
    /// Used only when `backend` is unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_backend: Option<Backend>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            rows: 60,
            cols: 60,
            wave_speed: 12.,
            damping: 0.9,
            dt: 0.05,
            baseline_height: 1.,
            bump_height: 5.,
            bump_half_width: 31,
            bump_offset: (20, 20),
            backend: Backend::Reference,
            fallback_backend: None,
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, ConfigurationError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file. Validation is left to the caller, or to
    /// [`crate::SimulationState::from_config`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn params(&self) -> WaveParams {
        WaveParams {
            wave_speed: self.wave_speed,
            damping: self.damping,
            dt: self.dt,
        }
    }

    pub fn initial_condition(&self) -> InitialCondition {
        InitialCondition::flat(self.baseline_height).with_bump(GaussianBump {
            height: self.bump_height,
            width: self.bump_half_width,
            offset: self.bump_offset,
        })
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.rows < MIN_GRID_SIDE || self.cols < MIN_GRID_SIDE {
            return Err(ConfigurationError::GridTooSmall {
                rows: self.rows,
                cols: self.cols,
                min: MIN_GRID_SIDE,
            });
        }
        grid::check_capacity(self.shape())?;
        self.params().validate()?;
        self.initial_condition().validate(self.shape())
    }
}
