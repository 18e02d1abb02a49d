//! Physical parameters of the damped wave equation and the coefficients of
//! the discrete update.
//!
//! The scheme is the central difference in space and time with the damping
//! term averaged over `n - 1` and `n + 1`:
//!
//! ```text
//! (w - 2v + u) / τ² + K (w - u) / 2τ = C² Δv
//! ```
//!
//! which, solved for `w` (step `n + 1`) with unit grid spacing, gives
//!
//! ```text
//! w = ((Cτ)² · Δv · 2 + 4v - u · (2 - Kτ)) / (2 + Kτ)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// `C`, `K` and `dt`, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveParams {
    /// Wave speed `C`.
    pub wave_speed: f64,
    /// Damping coefficient `K`.
    pub damping: f64,
    /// Time step `dt`.
    pub dt: f64,
}

impl WaveParams {
    /// Validated parameters.
    pub fn new(wave_speed: f64, damping: f64, dt: f64) -> Result<Self, ConfigurationError> {
        let params = Self {
            wave_speed,
            damping,
            dt,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.wave_speed.is_finite() && self.wave_speed > 0.) {
            return Err(ConfigurationError::InvalidWaveSpeed(self.wave_speed));
        }
        if !(self.damping.is_finite() && self.damping >= 0.) {
            return Err(ConfigurationError::InvalidDamping(self.damping));
        }
        if !(self.dt.is_finite() && self.dt > 0.) {
            return Err(ConfigurationError::InvalidTimeStep(self.dt));
        }
        Ok(())
    }

    /// `C·dt` for unit grid spacing.
    pub fn courant_number(&self) -> f64 {
        self.wave_speed * self.dt
    }

    /// Whether `C·dt <= 1/√2`, the stability bound of the undamped 2D scheme.
    ///
    /// Unstable parameters are allowed; heights then grow without bound.
    pub fn is_stable(&self) -> bool {
        self.courant_number() <= std::f64::consts::FRAC_1_SQRT_2
    }

    pub fn coefficients(&self) -> Coefficients {
        let cdt = self.wave_speed * self.dt;
        let kdt = self.damping * self.dt;
        Coefficients {
            gain: cdt * cdt * 2.,
            lag: 2. - kdt,
            denom: 2. + kdt,
        }
    }
}

/// Precomputed scalars of the update rule, shared by every backend so that
/// all of them evaluate the same expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    /// `(C·dt)² · 2`
    pub gain: f64,
    /// `2 - K·dt`
    pub lag: f64,
    /// `2 + K·dt`
    pub denom: f64,
}

impl Coefficients {
    /// New height from the Laplacian `lap`, the current height and the previous height.
    #[inline(always)]
    pub fn update(&self, lap: f64, current: f64, previous: f64) -> f64 {
        (self.gain * lap + 4. * current - previous * self.lag) / self.denom
    }
}
