//! Headless animation loop: advance, then hand the new frame to a renderer.

use std::ops::ControlFlow;

use ndarray::ArrayView2;
use tracing::debug;

use crate::error::Result;
use crate::state::SimulationState;

/// Receives a read-only view of `current` after each step.
pub trait Renderer {
    /// `step` is the number of completed steps; the initial frame is step 0.
    /// Returning `ControlFlow::Break` stops the driver.
    fn render(&mut self, step: u64, frame: ArrayView2<'_, f64>) -> ControlFlow<()>;
}

impl<F> Renderer for F
where
    F: FnMut(u64, ArrayView2<'_, f64>) -> ControlFlow<()>,
{
    fn render(&mut self, step: u64, frame: ArrayView2<'_, f64>) -> ControlFlow<()> {
        self(step, frame)
    }
}

pub struct Driver<R> {
    state: SimulationState,
    renderer: R,
    shown_initial: bool,
}

impl<R: Renderer> Driver<R> {
    pub fn new(state: SimulationState, renderer: R) -> Self {
        Driver {
            state,
            renderer,
            shown_initial: false,
        }
    }

    /// Advances up to `steps` times, rendering after each step. The first
    /// call also renders the initial frame before stepping.
    ///
    /// Returns the number of steps taken, fewer than `steps` if the renderer
    /// asked to stop.
    pub fn run(&mut self, steps: usize) -> Result<usize> {
        if !self.shown_initial {
            self.shown_initial = true;
            let step = self.state.step_count();
            if self.renderer.render(step, self.state.view()).is_break() {
                return Ok(0);
            }
        }

        for taken in 1..=steps {
            self.state.advance()?;
            let step = self.state.step_count();
            if self.renderer.render(step, self.state.view()).is_break() {
                debug!(step, "renderer stopped the driver");
                return Ok(taken);
            }
        }
        debug!(step = self.state.step_count(), "driver finished {} steps", steps);
        Ok(steps)
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// For perturbations between runs.
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    pub fn into_parts(self) -> (SimulationState, R) {
        (self.state, self.renderer)
    }
}
