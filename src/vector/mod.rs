//! Row kernel: one row at a time, with the interior of each row handed to the
//! SIMD span and the two end cells done with clamped indices.
//!
//! Clamping a missing neighbor to the cell itself makes it contribute
//! `c - c = 0` to the Laplacian, so `up + down + left + right - 4c` with
//! clamped indices equals the 3-point edge and 2-point corner Laplacians.

use std::cmp::min;

use crate::params::Coefficients;
use crate::simd_utils::{InteriorSpan, Vectorizer};

/// Grid cells below which [`wave_step_parallel`] stops splitting.
pub const DEFAULT_CELLS_PER_TASK: usize = 200 * 1024;

#[inline(always)]
fn clamped_cell(v: &[f64], u: &[f64], dim: (usize, usize), i: usize, j: usize, co: &Coefficients) -> f64 {
    let (ny, nx) = dim;
    let s = i * nx + j;
    let up = v[i.saturating_sub(1) * nx + j];
    let down = v[min(i + 1, ny - 1) * nx + j];
    let left = v[i * nx + j.saturating_sub(1)];
    let right = v[i * nx + min(j + 1, nx - 1)];
    let lap = up + down + left + right - 4. * v[s];
    co.update(lap, v[s], u[s])
}

/// Computes rows `rows.0..rows.1` of the step into `w`, which holds only
/// those rows.
fn wave_step_sub(
    u: &[f64],
    v: &[f64],
    w: &mut [f64],
    dim: (usize, usize),
    rows: (usize, usize),
    co: &Coefficients,
    vectorizer: Vectorizer,
) {
    let (ny, nx) = dim;
    let (rs, re) = rows;
    let n = nx * ny;
    debug_assert!(rs < re);
    debug_assert!(re <= ny);
    debug_assert_eq!(u.len(), n);
    debug_assert_eq!(v.len(), n);
    debug_assert_eq!(w.len(), (re - rs) * nx);

    let w_offset = rs * nx;

    for i in rs..re {
        let s0 = nx * i.saturating_sub(1);
        let s1 = nx * i;
        let s2 = nx * min(i + 1, ny - 1);

        if nx < 3 {
            for j in 0..nx {
                w[s1 + j - w_offset] = clamped_cell(v, u, dim, i, j, co);
            }
            continue;
        }

        w[s1 - w_offset] = clamped_cell(v, u, dim, i, 0, co);
        vectorizer.run(InteriorSpan {
            up: &v[s0 + 1..s0 + nx - 1],
            down: &v[s2 + 1..s2 + nx - 1],
            left: &v[s1..s1 + nx - 2],
            right: &v[s1 + 2..s1 + nx],
            center: &v[s1 + 1..s1 + nx - 1],
            previous: &u[s1 + 1..s1 + nx - 1],
            out: &mut w[s1 + 1 - w_offset..s1 + nx - 1 - w_offset],
            co: *co,
        });
        w[s1 + nx - 1 - w_offset] = clamped_cell(v, u, dim, i, nx - 1, co);
    }
}

/// Same as [`crate::wave_step`], computed row by row with the interior of
/// each row vectorized.
pub fn wave_step_vectorized(
    u: &[f64],
    v: &[f64],
    w: &mut [f64],
    dim: (usize, usize),
    co: &Coefficients,
) {
    let (ny, nx) = dim;
    let n = nx * ny;
    assert!(n > 0, "empty grid");
    assert_eq!(u.len(), n);
    assert_eq!(v.len(), n);
    assert_eq!(w.len(), n);

    wave_step_sub(u, v, w, dim, (0, ny), co, Vectorizer::detect());
}

/// Same as [`wave_step_vectorized`], with the rows split in halves over the
/// rayon pool until a part has at most `min_cells_per_task` cells.
///
/// Every output cell is written by exactly one task, and all tasks only read
/// `u` and `v`.
#[cfg(feature = "parallel")]
pub fn wave_step_parallel(
    u: &[f64],
    v: &[f64],
    w: &mut [f64],
    dim: (usize, usize),
    co: &Coefficients,
    min_cells_per_task: usize,
) {
    let (ny, nx) = dim;
    let n = nx * ny;
    assert!(n > 0, "empty grid");
    assert_eq!(u.len(), n);
    assert_eq!(v.len(), n);
    assert_eq!(w.len(), n);

    struct Step<'a> {
        u: &'a [f64],
        v: &'a [f64],
        dim: (usize, usize),
        co: Coefficients,
        min_cells: usize,
        vectorizer: Vectorizer,
    }

    impl Step<'_> {
        fn rows(&self, w: &mut [f64], rows: (usize, usize)) {
            let (row_start, row_end) = rows;
            if row_end - row_start > 1 && w.len() > self.min_cells {
                let (_, nx) = self.dim;
                let mid = (row_start + row_end) / 2;
                let (top, bottom) = w.split_at_mut((mid - row_start) * nx);
                rayon::join(
                    || self.rows(top, (row_start, mid)),
                    || self.rows(bottom, (mid, row_end)),
                );
            } else {
                wave_step_sub(self.u, self.v, w, self.dim, rows, &self.co, self.vectorizer);
            }
        }
    }

    let step = Step {
        u,
        v,
        dim,
        co: *co,
        min_cells: min_cells_per_task.max(1),
        vectorizer: Vectorizer::detect(),
    };
    step.rows(w, (0, ny));
}
