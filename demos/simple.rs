//! Headless run: ten steps of the default surface, or of the TOML config
//! given as the first argument, printing the largest deviation per frame.
//!
//! ```text
//! RUST_LOG=debug cargo run --example simple -- surface.toml
//! ```

use std::ops::ControlFlow;

use fdm_surface::{Driver, SimulationConfig, SimulationState, DEFAULT_IMPULSE};
use ndarray::ArrayView2;
use tracing_subscriber::EnvFilter;

const STEPS: usize = 10;

fn main() -> fdm_surface::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    let baseline = config.baseline_height;
    let state = SimulationState::from_config(&config)?;

    let mut driver = Driver::new(state, move |step: u64, frame: ArrayView2<'_, f64>| {
        let peak = frame.iter().fold(0., |m: f64, h| m.max((h - baseline).abs()));
        println!("step {:3}: max |h - {}| = {:.6}", step, baseline, peak);
        ControlFlow::Continue(())
    });
    driver.run(STEPS)?;

    // click the corner, then keep going
    let h = driver.state_mut().perturb(0, 0, DEFAULT_IMPULSE)?;
    println!("clicked (0, 0), height now {:.3}", h);
    driver.run(STEPS)?;

    println!("energy after {} steps: {:.6}", driver.state().step_count(), driver.state().energy());
    Ok(())
}
