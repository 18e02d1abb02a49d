//! Interchangeable implementations of one step, chosen at configuration time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{BackendUnavailableError, ConfigurationError, Result};
use crate::grid::Grid;
use crate::params::Coefficients;

/// Available step implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Scalar loops, one per cell class.
    #[default]
    Reference,
    /// Row kernel with SIMD over the interior of each row.
    Vectorized,
    /// Row kernel split over the rayon thread pool.
    Parallel,
    /// Compute shader in double precision.
    Gpu,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Reference,
        Backend::Vectorized,
        Backend::Parallel,
        Backend::Gpu,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Reference => "reference",
            Backend::Vectorized => "vectorized",
            Backend::Parallel => "parallel",
            Backend::Gpu => "gpu",
        }
    }

    /// Cargo feature the backend needs, if any.
    pub fn feature(self) -> Option<&'static str> {
        match self {
            Backend::Reference => None,
            Backend::Vectorized => Some("simd"),
            Backend::Parallel => Some("parallel"),
            Backend::Gpu => Some("gpu"),
        }
    }

    /// Whether this build contains the backend. A compiled-in GPU backend may
    /// still fail to find a device.
    pub fn is_compiled(self) -> bool {
        match self {
            Backend::Reference => true,
            Backend::Vectorized => cfg!(feature = "simd"),
            Backend::Parallel => cfg!(feature = "parallel"),
            Backend::Gpu => cfg!(feature = "gpu"),
        }
    }

    /// Creates the stepper for grids of `shape`.
    pub fn instantiate(
        self,
        #[cfg_attr(not(feature = "gpu"), allow(unused_variables))] shape: (usize, usize),
    ) -> std::result::Result<Box<dyn StencilBackend>, BackendUnavailableError> {
        if !self.is_compiled() {
            let feature = self.feature().unwrap_or_default();
            return Err(BackendUnavailableError::new(
                self,
                format!("compiled without the `{}` feature", feature),
            ));
        }
        match self {
            Backend::Reference => Ok(Box::new(ReferenceStencil)),
            #[cfg(feature = "simd")]
            Backend::Vectorized => Ok(Box::new(VectorizedStencil)),
            #[cfg(feature = "parallel")]
            Backend::Parallel => Ok(Box::new(ParallelStencil::new())),
            #[cfg(feature = "gpu")]
            Backend::Gpu => Ok(Box::new(crate::gpu::GpuStencil::new(shape)?)),
            #[allow(unreachable_patterns)]
            _ => unreachable!("backend availability checked above"),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigurationError::Parse(format!("unknown backend `{}`", s)))
    }
}

/// Instantiates `preferred`, or `fallback` when one is given and `preferred`
/// is unavailable.
///
/// Without a fallback, unavailability of `preferred` is returned as is.
pub fn select(
    preferred: Backend,
    fallback: Option<Backend>,
    shape: (usize, usize),
) -> std::result::Result<Box<dyn StencilBackend>, BackendUnavailableError> {
    match preferred.instantiate(shape) {
        Ok(stencil) => {
            info!(backend = %preferred, rows = shape.0, cols = shape.1, "stencil backend ready");
            Ok(stencil)
        }
        Err(e) => match fallback {
            Some(fallback) if fallback != preferred => {
                warn!("{}, falling back to `{}`", e, fallback);
                let stencil = fallback.instantiate(shape)?;
                info!(backend = %fallback, rows = shape.0, cols = shape.1, "stencil backend ready");
                Ok(stencil)
            }
            _ => Err(e),
        },
    }
}

/// One step of the scheme: writes `next` from `previous` and `current`.
///
/// Callers guarantee that the three grids have the same shape, and that it is
/// [`StencilBackend::shape`] when the backend reports one.
pub trait StencilBackend: Send {
    fn kind(&self) -> Backend;

    /// Grid shape the backend was created for, `None` if it steps any shape.
    fn shape(&self) -> Option<(usize, usize)> {
        None
    }

    fn step(
        &mut self,
        previous: &Grid,
        current: &Grid,
        next: &mut Grid,
        co: &Coefficients,
    ) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceStencil;

impl StencilBackend for ReferenceStencil {
    fn kind(&self) -> Backend {
        Backend::Reference
    }

    fn step(&mut self, previous: &Grid, current: &Grid, next: &mut Grid, co: &Coefficients) -> Result<()> {
        let dim = current.shape();
        crate::wave_step(previous.as_slice(), current.as_slice(), next.as_slice_mut(), dim, co);
        Ok(())
    }
}

#[cfg(feature = "simd")]
#[derive(Debug, Default, Clone, Copy)]
pub struct VectorizedStencil;

#[cfg(feature = "simd")]
impl StencilBackend for VectorizedStencil {
    fn kind(&self) -> Backend {
        Backend::Vectorized
    }

    fn step(&mut self, previous: &Grid, current: &Grid, next: &mut Grid, co: &Coefficients) -> Result<()> {
        let dim = current.shape();
        crate::vector::wave_step_vectorized(
            previous.as_slice(),
            current.as_slice(),
            next.as_slice_mut(),
            dim,
            co,
        );
        Ok(())
    }
}

#[cfg(feature = "parallel")]
#[derive(Debug, Clone, Copy)]
pub struct ParallelStencil {
    min_cells_per_task: usize,
}

#[cfg(feature = "parallel")]
impl ParallelStencil {
    pub fn new() -> Self {
        Self::with_min_cells_per_task(crate::vector::DEFAULT_CELLS_PER_TASK)
    }

    /// Smaller values split finer; useful to exercise the split on small grids.
    pub fn with_min_cells_per_task(min_cells_per_task: usize) -> Self {
        ParallelStencil { min_cells_per_task }
    }
}

#[cfg(feature = "parallel")]
impl Default for ParallelStencil {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "parallel")]
impl StencilBackend for ParallelStencil {
    fn kind(&self) -> Backend {
        Backend::Parallel
    }

    fn step(&mut self, previous: &Grid, current: &Grid, next: &mut Grid, co: &Coefficients) -> Result<()> {
        let dim = current.shape();
        crate::vector::wave_step_parallel(
            previous.as_slice(),
            current.as_slice(),
            next.as_slice_mut(),
            dim,
            co,
            self.min_cells_per_task,
        );
        Ok(())
    }
}
