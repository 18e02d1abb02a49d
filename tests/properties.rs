//! Invariants of the scheme over random grids and parameters:
//! - grids keep their shape
//! - flat fields at rest stay flat
//! - total height is conserved from rest
//! - the discrete energy never grows under damping and is conserved without it

use fdm_surface::{Backend, Grid, SimulationConfig, SimulationState, WaveParams};
use proptest::prelude::*;

const STEPS: usize = 5;

fn params() -> impl Strategy<Value = WaveParams> {
    (0.1f64..5., 0f64..2., 0.01f64..0.1).prop_map(|(wave_speed, damping, dt)| WaveParams {
        wave_speed,
        damping,
        dt,
    })
}

fn grid() -> impl Strategy<Value = Grid> {
    (3usize..24, 3usize..24).prop_flat_map(|(rows, cols)| {
        prop::collection::vec(-1f64..1., rows * cols)
            .prop_map(move |cells| Grid::from_vec((rows, cols), cells).unwrap())
    })
}

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn shape_is_preserved(current in grid(), params in params()) {
        let shape = current.shape();
        let mut state = SimulationState::new(current, params, Backend::Reference).unwrap();
        state.advance_by(STEPS).unwrap();
        prop_assert_eq!(state.shape(), shape);
        prop_assert_eq!(state.current().shape(), shape);
        prop_assert_eq!(state.previous().shape(), shape);
    }

    #[test]
    fn flat_field_at_rest_stays_flat(
        rows in 3usize..24,
        cols in 3usize..24,
        baseline in -10f64..10.,
        params in params(),
    ) {
        let flat = Grid::filled((rows, cols), baseline);
        let mut state = SimulationState::new(flat, params, Backend::Reference).unwrap();
        state.advance_by(STEPS).unwrap();
        for &h in state.current().as_slice() {
            prop_assert!(close(h, baseline, 1e-12), "{} drifted to {}", baseline, h);
        }
    }

    #[test]
    fn total_height_is_conserved_from_rest(current in grid(), params in params()) {
        let before: f64 = current.as_slice().iter().sum();
        let mut state = SimulationState::new(current, params, Backend::Reference).unwrap();
        state.advance_by(STEPS).unwrap();
        let after: f64 = state.current().as_slice().iter().sum();
        prop_assert!((before - after).abs() < 1e-9 * state.current().len() as f64,
            "{} became {}", before, after);
    }

    #[test]
    fn damped_energy_never_increases(
        previous in grid(),
        params in params(),
        damping in 0.05f64..2.,
    ) {
        let params = WaveParams { damping, ..params };
        let current = Grid::from(previous.view().mapv(|h| 0.9 * h + 0.05));
        let mut state = SimulationState::with_history(previous, current, params, Backend::Reference).unwrap();
        let mut energy = state.energy();
        for _ in 0..20 {
            state.advance().unwrap();
            let e = state.energy();
            prop_assert!(e <= energy + 1e-9 * energy.abs().max(1.), "energy grew from {} to {}", energy, e);
            energy = e;
        }
    }

    #[test]
    fn undamped_energy_is_conserved(current in grid(), params in params()) {
        let params = WaveParams { damping: 0., ..params };
        let mut state = SimulationState::new(current, params, Backend::Reference).unwrap();
        let e0 = state.energy();
        for _ in 0..20 {
            state.advance().unwrap();
            prop_assert!(close(state.energy(), e0, 1e-9), "{} vs {}", state.energy(), e0);
        }
    }
}

#[test]
fn bump_decays_under_damping() {
    let config = SimulationConfig::default();
    let mut state = SimulationState::from_config(&config).unwrap();
    let baseline = config.baseline_height;
    let cells = state.current().len() as f64;
    let mean = state.current().as_slice().iter().sum::<f64>() / cells;

    let initial = state.current().deviation_energy(baseline);
    let window = |state: &mut SimulationState| -> f64 {
        let mut peak: f64 = 0.;
        for _ in 0..50 {
            state.advance().unwrap();
            peak = peak.max(state.current().deviation_energy(mean));
        }
        peak
    };

    let first = window(&mut state);
    for _ in 0..6 {
        window(&mut state);
    }
    let last = window(&mut state);

    assert!(state.is_finite());
    assert!(last < 0.1 * first, "oscillation did not decay: {} -> {}", first, last);
    // the bump spreads into a raised plateau of the same volume
    assert!(state.current().deviation_energy(baseline) < initial);
}
