//! Finite difference method for the damped wave equation on a height field.
//!
//! A [`SimulationState`] owns three grids (`previous`, `current`, `next`) and
//! advances them with the central second order scheme
//!
//! ```text
//! next = ((C·dt)² · P · 2 + 4·current - previous · (2 - K·dt)) / (2 + K·dt)
//! ```
//!
//! where `P` is the discrete Laplacian over the neighbors that exist: four in
//! the interior, three on an edge, two in a corner (zero Neumann data).
//!
//! The same step is available as plain slice kernels:
//!
//! - [`wave_step`]: reference implementation, one loop per cell class,
//! - [`wave_step_vectorized`]: row kernel, SIMD over the interior of each row,
//! - [`wave_step_parallel`]: the row kernel split over a thread pool,
//!
//! and through the [`backend::StencilBackend`] implementations, including a
//! compute-shader one behind the `gpu` feature.
//!
//! ```
//! use fdm_surface::{SimulationConfig, SimulationState};
//!
//! let config = SimulationConfig::default();
//! let mut state = SimulationState::from_config(&config)?;
//! for _ in 0..10 {
//!     state.advance()?;
//! }
//! assert!(state.current().is_finite());
//! # Ok::<(), fdm_surface::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod grid;
pub mod initial;
pub mod params;
mod simd_utils;
pub mod state;
pub mod vector;

pub use backend::{Backend, StencilBackend};
pub use config::SimulationConfig;
pub use driver::{Driver, Renderer};
pub use error::{BackendUnavailableError, ConfigurationError, Error, Result};
pub use grid::{CellClass, Grid};
pub use initial::{GaussianBump, InitialCondition};
pub use params::{Coefficients, WaveParams};
pub use state::{SimulationState, DEFAULT_IMPULSE};
#[cfg(feature = "parallel")]
pub use vector::wave_step_parallel;
pub use vector::wave_step_vectorized;

/// Laplacian at `(i, j)` over whichever orthogonal neighbors exist.
#[inline]
fn neighbor_laplacian(v: &[f64], dim: (usize, usize), i: usize, j: usize) -> f64 {
    let (_, nx) = dim;
    let mut sum = 0.;
    let mut count = 0.;
    for (r, c) in grid::neighbors(dim, i, j) {
        sum += v[r * nx + c];
        count += 1.;
    }
    sum - count * v[i * nx + j]
}

/// Performs one step of the damped scheme with zero Neumann boundary data.
///
/// Interior cells use the 4-point Laplacian, edge cells the 3-point one and
/// corners the 2-point one.
///
/// - `u`: value at step `n - 1`
/// - `v`: value at step `n`
/// - `w`: computed value at step `n + 1`
/// - `dim`: format `(ny, nx)` so that memory layout for `u`, `v` and `w` is `[[f64 ; nx]; ny]`
/// - `co`: coefficients from [`WaveParams::coefficients`]
pub fn wave_step(u: &[f64], v: &[f64], w: &mut [f64], dim: (usize, usize), co: &Coefficients) {
    let (ny, nx) = dim;
    let n = nx * ny;
    assert!(n > 0, "empty grid");
    assert_eq!(u.len(), n);
    assert_eq!(v.len(), n);
    assert_eq!(w.len(), n);

    // a single row or column has no separate edge and corner classes
    if ny < 2 || nx < 2 {
        for i in 0..ny {
            for j in 0..nx {
                let s = i * nx + j;
                w[s] = co.update(neighbor_laplacian(v, dim, i, j), v[s], u[s]);
            }
        }
        return;
    }

    // interior
    for i in 1..ny - 1 {
        for j in 1..nx - 1 {
            let s = i * nx + j;
            let lap = v[s - nx] + v[s + nx] + v[s - 1] + v[s + 1] - 4. * v[s];
            w[s] = co.update(lap, v[s], u[s]);
        }
    }

    // left and right edges
    for i in 1..ny - 1 {
        let s = i * nx;
        let lap = v[s - nx] + v[s + nx] + v[s + 1] - 3. * v[s];
        w[s] = co.update(lap, v[s], u[s]);

        let s = i * nx + nx - 1;
        let lap = v[s - nx] + v[s + nx] + v[s - 1] - 3. * v[s];
        w[s] = co.update(lap, v[s], u[s]);
    }

    // top and bottom edges
    for j in 1..nx - 1 {
        let s = j;
        let lap = v[s + nx] + v[s - 1] + v[s + 1] - 3. * v[s];
        w[s] = co.update(lap, v[s], u[s]);

        let s = (ny - 1) * nx + j;
        let lap = v[s - nx] + v[s - 1] + v[s + 1] - 3. * v[s];
        w[s] = co.update(lap, v[s], u[s]);
    }

    // corners: (cell, vertical neighbor, horizontal neighbor)
    let last = (ny - 1) * nx;
    let corners = [
        (0, nx, 1),
        (nx - 1, 2 * nx - 1, nx - 2),
        (last, last - nx, last + 1),
        (last + nx - 1, last - 1, last + nx - 2),
    ];
    for (s, vertical, horizontal) in corners {
        let lap = v[vertical] + v[horizontal] - 2. * v[s];
        w[s] = co.update(lap, v[s], u[s]);
    }
}
