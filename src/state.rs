//! Simulation state: three grids, the parameters and the chosen backend.

use std::fmt;
use std::mem;

use ndarray::ArrayView2;
use tracing::{info, trace, warn};

use crate::backend::{self, Backend, StencilBackend};
use crate::config::{SimulationConfig, MIN_GRID_SIDE};
use crate::error::{ConfigurationError, Error, Result};
use crate::grid::Grid;
use crate::params::{Coefficients, WaveParams};

/// Height a click adds to a cell.
pub const DEFAULT_IMPULSE: f64 = 10.;

/// `previous` and `current` are consecutive snapshots; `next` is scratch that
/// only the backend writes.
pub struct SimulationState {
    previous: Grid,
    current: Grid,
    next: Grid,
    params: WaveParams,
    coefficients: Coefficients,
    backend: Box<dyn StencilBackend>,
    steps: u64,
}

impl SimulationState {
    /// Validates `config`, builds the initial field with zero velocity and
    /// selects the backend, falling back only if the config names a fallback.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let shape = config.shape();
        let current = config.initial_condition().build(shape)?;
        let stencil = backend::select(config.backend, config.fallback_backend, shape)?;
        Self::with_stencil(current.clone(), current, config.params(), stencil)
    }

    /// Starts from `current` at rest (`previous == current`).
    pub fn new(current: Grid, params: WaveParams, backend: Backend) -> Result<Self> {
        Self::with_history(current.clone(), current, params, backend)
    }

    /// Starts from two given snapshots.
    pub fn with_history(previous: Grid, current: Grid, params: WaveParams, backend: Backend) -> Result<Self> {
        let stencil = backend.instantiate(current.shape())?;
        Self::with_stencil(previous, current, params, stencil)
    }

    /// Starts from two given snapshots with an already created backend.
    pub fn with_stencil(
        previous: Grid,
        current: Grid,
        params: WaveParams,
        backend: Box<dyn StencilBackend>,
    ) -> Result<Self> {
        params.validate()?;
        let (rows, cols) = current.shape();
        if rows < MIN_GRID_SIDE || cols < MIN_GRID_SIDE {
            return Err(ConfigurationError::GridTooSmall {
                rows,
                cols,
                min: MIN_GRID_SIDE,
            }
            .into());
        }
        if let Some(expected) = backend.shape() {
            if expected != current.shape() {
                return Err(ConfigurationError::ShapeMismatch {
                    expected,
                    found: current.shape(),
                }
                .into());
            }
        }
        if previous.shape() != current.shape() {
            return Err(ConfigurationError::ShapeMismatch {
                expected: current.shape(),
                found: previous.shape(),
            }
            .into());
        }
        if !current.is_finite() {
            return Err(ConfigurationError::NonFinite {
                name: "current",
                value: first_non_finite(&current),
            }
            .into());
        }
        if !previous.is_finite() {
            return Err(ConfigurationError::NonFinite {
                name: "previous",
                value: first_non_finite(&previous),
            }
            .into());
        }

        info!(
            rows,
            cols,
            backend = %backend.kind(),
            courant = params.courant_number(),
            "simulation state created"
        );
        if !params.is_stable() {
            warn!(
                "C·dt = {} exceeds the 2D stability bound 1/√2, heights will grow without bound",
                params.courant_number()
            );
        }

        let next = Grid::filled(current.shape(), 0.);
        Ok(SimulationState {
            previous,
            current,
            next,
            coefficients: params.coefficients(),
            params,
            backend,
            steps: 0,
        })
    }

    /// Computes the next snapshot and rotates the grids:
    /// `previous <- current`, `current <- next`; the old `previous` storage
    /// becomes the new scratch.
    ///
    /// On error the snapshots are left as they were.
    pub fn advance(&mut self) -> Result<()> {
        self.backend
            .step(&self.previous, &self.current, &mut self.next, &self.coefficients)?;
        mem::swap(&mut self.previous, &mut self.current);
        mem::swap(&mut self.current, &mut self.next);
        self.steps += 1;
        trace!(step = self.steps, "advanced");
        Ok(())
    }

    pub fn advance_by(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.advance()?;
        }
        Ok(())
    }

    /// Adds `amount` to `current[row][col]` and returns the new height.
    pub fn perturb(&mut self, row: usize, col: usize, amount: f64) -> Result<f64> {
        let (rows, cols) = self.current.shape();
        let cell = self
            .current
            .get_mut(row, col)
            .ok_or(Error::OutOfBounds { row, col, rows, cols })?;
        *cell += amount;
        Ok(*cell)
    }

    pub fn current(&self) -> &Grid {
        &self.current
    }

    pub fn previous(&self) -> &Grid {
        &self.previous
    }

    /// Read-only view of `current` for renderers.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.current.view()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.current.shape()
    }

    pub fn params(&self) -> &WaveParams {
        &self.params
    }

    pub fn backend(&self) -> Backend {
        self.backend.kind()
    }

    /// Number of completed `advance` calls.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn is_finite(&self) -> bool {
        self.current.is_finite() && self.previous.is_finite()
    }

    /// Discrete energy between `previous` and `current`:
    ///
    /// ```text
    /// E = Σ ((current - previous) / dt)² + C² Σ_edges (current_a - current_b)(previous_a - previous_b)
    /// ```
    ///
    /// summed over cells and over pairs of orthogonal neighbors. The scheme
    /// conserves it for `K = 0` and never increases it for `K > 0`.
    pub fn energy(&self) -> f64 {
        let dt = self.params.dt;
        let c2 = self.params.wave_speed * self.params.wave_speed;
        let cur = self.current.view();
        let prev = self.previous.view();
        let (rows, cols) = cur.dim();

        let kinetic: f64 = cur
            .iter()
            .zip(prev.iter())
            .map(|(c, p)| {
                let d = (c - p) / dt;
                d * d
            })
            .sum();

        let mut potential = 0.;
        for i in 0..rows {
            for j in 0..cols {
                if j + 1 < cols {
                    potential += (cur[(i, j)] - cur[(i, j + 1)]) * (prev[(i, j)] - prev[(i, j + 1)]);
                }
                if i + 1 < rows {
                    potential += (cur[(i, j)] - cur[(i + 1, j)]) * (prev[(i, j)] - prev[(i + 1, j)]);
                }
            }
        }
        kinetic + c2 * potential
    }
}

fn first_non_finite(grid: &Grid) -> f64 {
    grid.as_slice()
        .iter()
        .copied()
        .find(|h| !h.is_finite())
        .unwrap_or(f64::NAN)
}

impl fmt::Debug for SimulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationState")
            .field("shape", &self.shape())
            .field("params", &self.params)
            .field("backend", &self.backend.kind())
            .field("steps", &self.steps)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spike() -> Grid {
        let mut g = Grid::filled((5, 5), 1.);
        *g.get_mut(2, 2).unwrap() = 2.;
        g
    }

    #[test]
    fn single_spike_step() {
        let params = WaveParams::new(1., 0., 0.1).unwrap();
        let mut state = SimulationState::new(spike(), params, Backend::Reference).unwrap();
        state.advance().unwrap();

        let cur = state.current();
        assert!((cur.get(2, 2).unwrap() - 1.96).abs() < 1e-12);
        for (i, j) in [(1, 2), (3, 2), (2, 1), (2, 3)] {
            assert!((cur.get(i, j).unwrap() - 1.01).abs() < 1e-12);
        }
        for i in 0..5 {
            for j in 0..5 {
                let touched = (i, j) == (2, 2) || (i as i64 - 2).abs() + (j as i64 - 2).abs() == 1;
                if !touched {
                    assert_eq!(cur.get(i, j), Some(1.), "({}, {})", i, j);
                }
            }
        }
        assert_eq!(state.previous(), &spike());
        assert_eq!(state.step_count(), 1);
    }

    #[test]
    fn rotation_reuses_storage() {
        let params = WaveParams::new(1., 0.3, 0.1).unwrap();
        let mut state = SimulationState::new(spike(), params, Backend::Reference).unwrap();
        let ptrs = |s: &SimulationState| {
            [
                s.previous.as_slice().as_ptr(),
                s.current.as_slice().as_ptr(),
                s.next.as_slice().as_ptr(),
            ]
        };
        let [p0, c0, n0] = ptrs(&state);
        state.advance().unwrap();
        assert_eq!(ptrs(&state), [c0, n0, p0]);

        let before = state.current().clone();
        state.advance().unwrap();
        assert_eq!(state.previous(), &before);
        assert_eq!(ptrs(&state), [n0, p0, c0]);
    }

    #[test]
    fn perturb_is_bounds_checked() {
        let params = WaveParams::new(1., 0., 0.1).unwrap();
        let mut state = SimulationState::new(Grid::filled((4, 6), 1.), params, Backend::Reference).unwrap();
        assert_eq!(state.perturb(3, 5, DEFAULT_IMPULSE).unwrap(), 11.);
        assert_eq!(state.perturb(3, 5, -1.).unwrap(), 10.);
        assert!(matches!(
            state.perturb(4, 0, 1.),
            Err(Error::OutOfBounds { row: 4, col: 0, rows: 4, cols: 6 })
        ));
        assert!(matches!(state.perturb(0, 6, 1.), Err(Error::OutOfBounds { .. })));
        // previous is untouched, so the click shows up as a velocity
        assert_eq!(state.previous().get(3, 5), Some(1.));
    }

    #[test]
    fn rejects_invalid_states() {
        let params = WaveParams::new(1., 0., 0.1).unwrap();
        let tiny = SimulationState::new(Grid::filled((2, 5), 0.), params, Backend::Reference);
        assert!(matches!(
            tiny,
            Err(Error::Configuration(ConfigurationError::GridTooSmall { .. }))
        ));

        let mismatch = SimulationState::with_history(
            Grid::filled((4, 4), 0.),
            Grid::filled((4, 5), 0.),
            params,
            Backend::Reference,
        );
        assert!(matches!(
            mismatch,
            Err(Error::Configuration(ConfigurationError::ShapeMismatch { .. }))
        ));

        let mut nan = Grid::filled((3, 3), 0.);
        *nan.get_mut(1, 1).unwrap() = f64::NAN;
        assert!(matches!(
            SimulationState::new(nan, params, Backend::Reference),
            Err(Error::Configuration(ConfigurationError::NonFinite { name: "current", .. }))
        ));

        let bad = WaveParams {
            wave_speed: 1.,
            damping: 0.,
            dt: 0.,
        };
        assert!(SimulationState::new(Grid::filled((3, 3), 0.), bad, Backend::Reference).is_err());
    }

    /// Stands in for a backend with buffers sized at creation.
    struct FixedShape((usize, usize));

    impl StencilBackend for FixedShape {
        fn kind(&self) -> Backend {
            Backend::Gpu
        }

        fn shape(&self) -> Option<(usize, usize)> {
            Some(self.0)
        }

        fn step(&mut self, _: &Grid, current: &Grid, next: &mut Grid, _: &Coefficients) -> Result<()> {
            assert_eq!(current.shape(), self.0);
            next.as_slice_mut().copy_from_slice(current.as_slice());
            Ok(())
        }
    }

    #[test]
    fn stencil_shape_must_match_grids() {
        let params = WaveParams::new(1., 0., 0.1).unwrap();
        let mismatched = SimulationState::with_stencil(
            spike(),
            spike(),
            params,
            Box::new(FixedShape((8, 8))),
        );
        assert!(matches!(
            mismatched,
            Err(Error::Configuration(ConfigurationError::ShapeMismatch {
                expected: (8, 8),
                found: (5, 5),
            }))
        ));

        let mut matched =
            SimulationState::with_stencil(spike(), spike(), params, Box::new(FixedShape((5, 5)))).unwrap();
        matched.advance().unwrap();
        assert_eq!(matched.current(), &spike());
    }

    #[test]
    fn unstable_parameters_are_allowed() {
        let params = WaveParams::new(20., 0., 0.1).unwrap();
        let mut state = SimulationState::new(spike(), params, Backend::Reference).unwrap();
        state.advance_by(200).unwrap();
        assert_eq!(state.step_count(), 200);
        assert!(state.current().max_abs_deviation(1.) > 1e3 || !state.is_finite());
    }

    #[test]
    fn default_config_runs() {
        let mut state = SimulationState::from_config(&SimulationConfig::default()).unwrap();
        assert_eq!(state.shape(), (60, 60));
        assert_eq!(state.backend(), Backend::Reference);
        // at rest all the energy is potential
        assert!(state.energy() > 0.);
        let e0 = state.energy();
        state.advance_by(10).unwrap();
        assert!(state.is_finite());
        assert!(state.energy() <= e0);
        assert!(state.current().max_abs_deviation(1.) < 6.);
    }
}
