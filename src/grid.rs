//! Height grids and stencil geometry.

use ndarray::{Array2, ArrayView2};

use crate::error::ConfigurationError;

/// Dense row-major grid of heights.
///
/// Storage is always in standard layout, so the step kernels can work on the
/// flat slice with `dim = (rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    cells: Array2<f64>,
}

impl Grid {
    pub fn filled(shape: (usize, usize), value: f64) -> Self {
        Grid {
            cells: Array2::from_elem(shape, value),
        }
    }

    pub fn from_vec(shape: (usize, usize), data: Vec<f64>) -> Result<Self, ConfigurationError> {
        let found = data.len();
        Array2::from_shape_vec(shape, data)
            .map(|cells| Grid { cells })
            .map_err(|_| ConfigurationError::LengthMismatch {
                rows: shape.0,
                cols: shape.1,
                found,
            })
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn rows(&self) -> usize {
        self.cells.nrows()
    }

    pub fn cols(&self) -> usize {
        self.cells.ncols()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read-only snapshot for renderers.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.cells.view()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get((row, col)).copied()
    }

    pub(crate) fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut f64> {
        self.cells.get_mut((row, col))
    }

    pub fn as_slice(&self) -> &[f64] {
        self.cells
            .as_slice()
            .expect("grid storage is kept in standard layout")
    }

    pub fn as_slice_mut(&mut self) -> &mut [f64] {
        self.cells
            .as_slice_mut()
            .expect("grid storage is kept in standard layout")
    }

    pub fn into_array(self) -> Array2<f64> {
        self.cells
    }

    /// `false` once the simulation has produced NaN or infinities.
    pub fn is_finite(&self) -> bool {
        self.cells.iter().all(|h| h.is_finite())
    }

    /// Σ (h - baseline)²
    pub fn deviation_energy(&self, baseline: f64) -> f64 {
        self.cells.iter().map(|h| (h - baseline) * (h - baseline)).sum()
    }

    /// max |h - baseline|
    pub fn max_abs_deviation(&self, baseline: f64) -> f64 {
        self.cells
            .iter()
            .fold(0., |m: f64, h| m.max((h - baseline).abs()))
    }
}

impl From<Array2<f64>> for Grid {
    fn from(cells: Array2<f64>) -> Self {
        let cells = if cells.is_standard_layout() {
            cells
        } else {
            cells.as_standard_layout().into_owned()
        };
        Grid { cells }
    }
}

/// Rejects shapes whose cell count or byte size cannot be allocated.
pub fn check_capacity(shape: (usize, usize)) -> Result<(), ConfigurationError> {
    let (rows, cols) = shape;
    let fits = rows
        .checked_mul(cols)
        .and_then(|n| n.checked_mul(std::mem::size_of::<f64>()))
        .map_or(false, |bytes| bytes <= isize::MAX as usize);
    if fits {
        Ok(())
    } else {
        Err(ConfigurationError::GridTooLarge { rows, cols })
    }
}

/// Which update rule a cell falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellClass {
    Interior,
    Edge,
    Corner,
}

impl CellClass {
    pub fn of(dim: (usize, usize), row: usize, col: usize) -> CellClass {
        let (ny, nx) = dim;
        let on_row_edge = row == 0 || row + 1 == ny;
        let on_col_edge = col == 0 || col + 1 == nx;
        match (on_row_edge, on_col_edge) {
            (true, true) => CellClass::Corner,
            (false, false) => CellClass::Interior,
            _ => CellClass::Edge,
        }
    }

    /// Neighbor count on grids of at least 2x2.
    pub fn neighbor_count(self) -> usize {
        match self {
            CellClass::Interior => 4,
            CellClass::Edge => 3,
            CellClass::Corner => 2,
        }
    }
}

/// In-bounds orthogonal neighbors of `(row, col)`, in the order up, down, left, right.
pub fn neighbors(
    dim: (usize, usize),
    row: usize,
    col: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let (ny, nx) = dim;
    let up = row.checked_sub(1).map(|r| (r, col));
    let down = Some(row + 1).filter(|&r| r < ny).map(|r| (r, col));
    let left = col.checked_sub(1).map(|c| (row, c));
    let right = Some(col + 1).filter(|&c| c < nx).map(|c| (row, c));
    [up, down, left, right].into_iter().flatten()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classes_on_5x5() {
        let dim = (5, 5);
        assert_eq!(CellClass::of(dim, 0, 0), CellClass::Corner);
        assert_eq!(CellClass::of(dim, 4, 0), CellClass::Corner);
        assert_eq!(CellClass::of(dim, 0, 4), CellClass::Corner);
        assert_eq!(CellClass::of(dim, 4, 4), CellClass::Corner);
        assert_eq!(CellClass::of(dim, 0, 2), CellClass::Edge);
        assert_eq!(CellClass::of(dim, 3, 4), CellClass::Edge);
        assert_eq!(CellClass::of(dim, 2, 2), CellClass::Interior);

        for i in 0..5 {
            for j in 0..5 {
                let class = CellClass::of(dim, i, j);
                assert_eq!(neighbors(dim, i, j).count(), class.neighbor_count());
            }
        }
    }

    #[test]
    fn neighbor_sets() {
        let dim = (5, 5);
        let corner: Vec<_> = neighbors(dim, 0, 0).collect();
        assert_eq!(corner, vec![(1, 0), (0, 1)]);
        let edge: Vec<_> = neighbors(dim, 0, 2).collect();
        assert_eq!(edge, vec![(1, 2), (0, 1), (0, 3)]);
        let interior: Vec<_> = neighbors(dim, 2, 2).collect();
        assert_eq!(interior, vec![(1, 2), (3, 2), (2, 1), (2, 3)]);
    }

    #[test]
    fn degenerate_neighbors() {
        assert_eq!(neighbors((1, 1), 0, 0).count(), 0);
        assert_eq!(neighbors((1, 4), 0, 0).count(), 1);
        assert_eq!(neighbors((1, 4), 0, 2).count(), 2);
    }

    #[test]
    fn capacity() {
        assert_eq!(check_capacity((60, 60)), Ok(()));
        assert_eq!(
            check_capacity((usize::MAX / 2, 4)),
            Err(ConfigurationError::GridTooLarge {
                rows: usize::MAX / 2,
                cols: 4
            })
        );
        // the cell count fits but not the bytes
        assert!(check_capacity((usize::MAX / 8, 2)).is_err());
    }

    #[test]
    fn from_vec_checks_shape() {
        assert!(Grid::from_vec((2, 3), vec![0.; 6]).is_ok());
        assert!(Grid::from_vec((2, 3), vec![0.; 5]).is_err());
    }

    #[test]
    fn transposed_array_is_made_contiguous() {
        let a = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f64);
        let g = Grid::from(a.t().to_owned());
        assert_eq!(g.shape(), (4, 3));
        assert_eq!(g.as_slice().len(), 12);
        let g = Grid::from(a.reversed_axes());
        assert_eq!(g.as_slice()[1], 4.);
    }

    #[test]
    fn diagnostics() {
        let mut g = Grid::filled((3, 3), 1.);
        *g.get_mut(1, 1).unwrap() = 3.;
        assert_eq!(g.deviation_energy(1.), 4.);
        assert_eq!(g.max_abs_deviation(1.), 2.);
        assert!(g.is_finite());
        *g.get_mut(0, 0).unwrap() = f64::NAN;
        assert!(!g.is_finite());
    }
}
