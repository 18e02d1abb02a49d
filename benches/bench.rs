use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fdm_surface::*;

const SIZES: [usize; 3] = [128, 512, 2048];

macro_rules! bench_step {
    ($fn_name:ident, $group:expr, |$u:ident, $v:ident, $w:ident, $dim:ident, $co:ident| $step:expr) => {
        fn $fn_name(c: &mut Criterion) {
            let mut group = c.benchmark_group($group);
            let $co = WaveParams::new(12., 0.9, 0.05).unwrap().coefficients();
            for n in SIZES {
                let $dim = (n, n);
                let l = n * n;
                let $u = vec![1.; l];
                let $v = vec![2.; l];
                let mut w = black_box(vec![1.; l]);

                group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
                    b.iter(|| {
                        let $w = &mut w;
                        $step
                    });
                });
            }
            group.finish();
        }
    };
}

bench_step!(reference, "reference", |u, v, w, dim, co| wave_step(&u, &v, w, dim, &co));

bench_step!(vectorized, "vectorized", |u, v, w, dim, co| {
    wave_step_vectorized(&u, &v, w, dim, &co)
});

#[cfg(feature = "parallel")]
bench_step!(parallel, "parallel", |u, v, w, dim, co| {
    wave_step_parallel(&u, &v, w, dim, &co, vector::DEFAULT_CELLS_PER_TASK)
});

/// Full `advance`, including buffer rotation, through each compiled backend.
fn advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("advance");
    for backend in Backend::ALL {
        for n in SIZES {
            let params = WaveParams::new(12., 0.9, 0.05).unwrap();
            let current = Grid::filled((n, n), 1.);
            let Ok(mut state) = SimulationState::new(current, params, backend) else {
                continue;
            };
            group.bench_with_input(BenchmarkId::new(backend.name(), n), &n, |b, _| {
                b.iter(|| state.advance().unwrap());
            });
        }
    }
    group.finish();
}

#[cfg(feature = "parallel")]
criterion_group!(benches, reference, vectorized, parallel, advance);
#[cfg(not(feature = "parallel"))]
criterion_group!(benches, reference, vectorized, advance);
criterion_main!(benches);
