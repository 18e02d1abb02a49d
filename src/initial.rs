//! Initial height field: flat baseline plus an optional Gaussian bump.

use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::grid::{self, Grid};

/// `height · exp(-5 (x² + y²))` sampled on a `width × width` patch with
/// `x, y ∈ linspace(-1, 1, width)`, added at `offset = (row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianBump {
    pub height: f64,
    /// Side length of the patch in cells, odd so that the peak sits on a cell.
    pub width: usize,
    /// Top-left corner of the patch.
    pub offset: (usize, usize),
}

impl GaussianBump {
    pub fn patch(&self) -> Array2<f64> {
        gaussian_patch(self.width, self.height)
    }
}

/// The bump profile on its own, `x` varying along rows and `y` along columns.
pub fn gaussian_patch(width: usize, height: f64) -> Array2<f64> {
    let z = Array1::<f64>::linspace(-1., 1., width);
    Array2::from_shape_fn((width, width), |(i, j)| {
        let (x, y) = (z[i], z[j]);
        height * (-5. * (x * x + y * y)).exp()
    })
}

/// Builds the starting `current` grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialCondition {
    pub baseline: f64,
    pub bump: Option<GaussianBump>,
}

impl InitialCondition {
    pub fn flat(baseline: f64) -> Self {
        InitialCondition {
            baseline,
            bump: None,
        }
    }

    pub fn with_bump(mut self, bump: GaussianBump) -> Self {
        self.bump = Some(bump);
        self
    }

    /// Checks that the heights are finite and that the bump is odd and fits.
    pub fn validate(&self, shape: (usize, usize)) -> Result<(), ConfigurationError> {
        grid::check_capacity(shape)?;
        if !self.baseline.is_finite() {
            return Err(ConfigurationError::NonFinite {
                name: "baseline_height",
                value: self.baseline,
            });
        }
        let Some(bump) = self.bump else {
            return Ok(());
        };
        if !bump.height.is_finite() {
            return Err(ConfigurationError::NonFinite {
                name: "bump_height",
                value: bump.height,
            });
        }
        if bump.width % 2 == 0 {
            return Err(ConfigurationError::EvenBumpWidth(bump.width));
        }
        let (rows, cols) = shape;
        let (row, col) = bump.offset;
        let fits = |start: usize, len: usize| start.checked_add(bump.width).map_or(false, |end| end <= len);
        if !(fits(row, rows) && fits(col, cols)) {
            return Err(ConfigurationError::BumpOutOfBounds {
                width: bump.width,
                row,
                col,
                rows,
                cols,
            });
        }
        Ok(())
    }

    pub fn build(&self, shape: (usize, usize)) -> Result<Grid, ConfigurationError> {
        self.validate(shape)?;
        let mut heights = Array2::from_elem(shape, self.baseline);
        if let Some(bump) = self.bump {
            let (row, col) = bump.offset;
            let mut target = heights.slice_mut(s![row..row + bump.width, col..col + bump.width]);
            target += &bump.patch();
        }
        Ok(Grid::from(heights))
    }
}
