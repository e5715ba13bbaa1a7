//! Interface to whatever consumes the simulation frame by frame.

use crate::model::{Agent, Compartments};
use std::ops::ControlFlow;

/// Snapshot of the simulation after a reconciled step.
pub struct Frame<'a> {
    /// Index of the step just completed.
    pub step: usize,
    /// All live agents (position and category).
    pub agents: &'a [Agent],
    /// Compartment values after reconciliation.
    pub compartments: &'a Compartments,
    /// Infected value the integrator produced before it was overwritten.
    pub estimated_infected: f64,
}

/// Callbacks invoked by [`Engine`][crate::engine::Engine] while it runs.
///
/// Returning [`ControlFlow::Break`] from `on_frame` asks the engine to stop
/// after the current step.
pub trait Observer {
    fn on_frame(&mut self, _frame: &Frame) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Called once, when the engine stops.
    fn on_finished(&mut self, _final_step: usize) {}
}

/// An [`Observer`] that does nothing.
pub struct NoopObserver;

impl Observer for NoopObserver {}

impl<A: Observer, B: Observer> Observer for (A, B) {
    fn on_frame(&mut self, frame: &Frame) -> ControlFlow<()> {
        let a = self.0.on_frame(frame);
        let b = self.1.on_frame(frame);
        if a.is_break() || b.is_break() {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn on_finished(&mut self, final_step: usize) {
        self.0.on_finished(final_step);
        self.1.on_finished(final_step);
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_frame(&mut self, frame: &Frame) -> ControlFlow<()> {
        (**self).on_frame(frame)
    }

    fn on_finished(&mut self, final_step: usize) {
        (**self).on_finished(final_step);
    }
}
