//! Per-iteration callbacks invoked by [`crate::solver::Solver::minimize`].
//!
//! Replaces the teacher's proc-macro-generated `build_option_enum!` with
//! `enum_dispatch`, since the configurable/runtime-validated parameter
//! system (§4.1) has no equivalent to the teacher's compile-time options.

use enum_dispatch::enum_dispatch;

use crate::solver::SolverState;

/// Hook invoked once per solver iteration for logging, monitoring, or early stopping.
#[enum_dispatch]
pub trait Callback {
    /// Called at the end of each iteration with the current solver state.
    fn call(&mut self, state: &SolverState);
}

/// A callback that does nothing. Use when no per-iteration output is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback {}

impl Callback for NoOpCallback {
    fn call(&mut self, _state: &SolverState) {}
}

/// Prints iteration count, step, and best value to stdout each iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvergenceOutput {}

impl Callback for ConvergenceOutput {
    fn call(&mut self, state: &SolverState) {
        println!(
            "| {:4} | f={:<12.6e} | f*={:<12.6e} | status={:?} |",
            state.nit, state.f, state.f_best, state.status
        );
    }
}

/// The closed set of built-in callbacks, dispatched without virtual calls.
#[enum_dispatch(Callback)]
#[derive(Clone)]
pub enum Callbacks {
    NoOpCallback,
    ConvergenceOutput,
}
