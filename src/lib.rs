//! Numerical optimization core: unconstrained, bound-, equality- and
//! inequality-constrained solvers over real vectors.
//!
//! The crate is layered leaf-first: [`core`] holds the parameter system,
//! the function/constraint abstraction, dense linear algebra, and the
//! solver registry; [`linesearch`] pairs an initial-step estimator with an
//! acceptance rule; [`solver`] is the line-search, bundle, gradient-sampling,
//! penalty, and interior-point solver hierarchy; [`program`] adds linear and
//! quadratic program bookkeeping on top.

pub type E = f64;

pub mod callback;
pub mod core;
pub mod linesearch;
pub mod penalty;
pub mod program;
pub mod solver;
pub mod terminators;

pub use crate::core::configurable::{Configurable, Version};
pub use crate::core::constraint::Constraint;
pub use crate::core::function::Function;
pub use crate::core::parameter::{Domain, ParamValue, Parameter};
pub use crate::core::registry::registry;
pub use crate::solver::{Solver, SolverHooks, SolverState, Status};
