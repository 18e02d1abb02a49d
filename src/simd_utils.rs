//! Interior stencil along one row, vectorized with runtime instruction set
//! selection when the `simd` feature is on.

#[cfg(feature = "simd")]
use pulp::{Arch, Simd, WithSimd};

use crate::params::Coefficients;

/// The interior of one row, as equally long slices: the cell `center[k]` has
/// neighbors `up[k]`, `down[k]`, `left[k]` and `right[k]`.
pub struct InteriorSpan<'a> {
    pub up: &'a [f64],
    pub down: &'a [f64],
    pub left: &'a [f64],
    pub right: &'a [f64],
    pub center: &'a [f64],
    pub previous: &'a [f64],
    pub out: &'a mut [f64],
    pub co: Coefficients,
}

impl InteriorSpan<'_> {
    #[inline(always)]
    pub fn run_scalar(self) {
        let n = self.out.len();
        debug_assert!(self.up.len() == n && self.down.len() == n);
        debug_assert!(self.left.len() == n && self.right.len() == n);
        debug_assert!(self.center.len() == n && self.previous.len() == n);

        for k in 0..n {
            let c = self.center[k];
            let lap = self.up[k] + self.down[k] + self.left[k] + self.right[k] - 4. * c;
            self.out[k] = self.co.update(lap, c, self.previous[k]);
        }
    }
}

#[cfg(feature = "simd")]
impl WithSimd for InteriorSpan<'_> {
    type Output = ();

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let InteriorSpan {
            up,
            down,
            left,
            right,
            center,
            previous,
            out,
            co,
        } = self;

        // all slices have the same length, so the heads and tails line up
        let (up_head, up_tail) = S::f64s_as_simd(up);
        let (down_head, down_tail) = S::f64s_as_simd(down);
        let (left_head, left_tail) = S::f64s_as_simd(left);
        let (right_head, right_tail) = S::f64s_as_simd(right);
        let (center_head, center_tail) = S::f64s_as_simd(center);
        let (previous_head, previous_tail) = S::f64s_as_simd(previous);
        let (out_head, out_tail) = S::f64s_as_mut_simd(out);

        let gain = simd.f64s_splat(co.gain);
        let lag = simd.f64s_splat(co.lag);
        let denom = simd.f64s_splat(co.denom);
        let four = simd.f64s_splat(4.);

        // same operation order as `Coefficients::update`, no fused multiply-add
        for (k, w) in out_head.iter_mut().enumerate() {
            let c = center_head[k];
            let sum = simd.f64s_add(
                simd.f64s_add(simd.f64s_add(up_head[k], down_head[k]), left_head[k]),
                right_head[k],
            );
            let lap = simd.f64s_sub(sum, simd.f64s_mul(four, c));
            let num = simd.f64s_sub(
                simd.f64s_add(simd.f64s_mul(gain, lap), simd.f64s_mul(four, c)),
                simd.f64s_mul(previous_head[k], lag),
            );
            *w = simd.f64s_div(num, denom);
        }

        InteriorSpan {
            up: up_tail,
            down: down_tail,
            left: left_tail,
            right: right_tail,
            center: center_tail,
            previous: previous_tail,
            out: out_tail,
            co,
        }
        .run_scalar();
    }
}

/// Runs interior spans with the widest instruction set detected at startup,
/// or with the scalar loop when built without `simd`.
#[derive(Clone, Copy)]
pub struct Vectorizer {
    #[cfg(feature = "simd")]
    arch: Arch,
}

impl Vectorizer {
    pub fn detect() -> Self {
        Vectorizer {
            #[cfg(feature = "simd")]
            arch: Arch::new(),
        }
    }

    #[inline]
    pub fn run(self, span: InteriorSpan<'_>) {
        #[cfg(feature = "simd")]
        self.arch.dispatch(span);
        #[cfg(not(feature = "simd"))]
        span.run_scalar();
    }
}
