//! Error kinds for the optimization core.
//!
//! Every fallible operation returns `Result<T, Problem>`; the enums here are
//! attached to the underlying `Result` via `problemo`'s `.via(..)` extension,
//! the same pattern the linear-algebra layer uses for factorization errors.

use derive_more::{Display, Error};

/// Parameter/configurable domain errors (§4.1).
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum ParameterError {
    #[display("parameter '{name}' is already registered")]
    Duplicate { name: String },

    #[display("parameter '{name}' not found")]
    NotFound { name: String },

    #[display("value for parameter '{name}' is out of domain")]
    InvalidValue { name: String },

    #[display("enum value '{value}' is not a valid variant of '{name}'")]
    InvalidEnumValue { name: String, value: String },

    #[display("type mismatch for parameter '{name}'")]
    TypeMismatch { name: String },

    #[display("serialized stream is truncated or malformed")]
    MalformedStream,

    #[display("cannot read configurable serialized with incompatible major version {found} (library is {expected})")]
    IncompatibleVersion { found: i32, expected: i32 },
}

/// Registry/factory errors (§9 "Registry").
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum RegistryError {
    #[display("no object registered with id '{id}'")]
    NotFound { id: String },

    #[display("an object with id '{id}' is already registered")]
    Duplicate { id: String },
}

/// Constraint-system errors (§4.2 normalization).
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum ConstraintError {
    #[display("constraint system is inconsistent: zero row with non-zero right-hand side")]
    Inconsistent,

    #[display("vector size {found} does not match expected dimension {expected}")]
    SizeMismatch { found: usize, expected: usize },
}

/// Dense linear-algebra errors (LDLT factorization, §3).
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum LinearSolverError {
    #[display("matrix is not square")]
    NotSquare,

    #[display("LDLT factorization lost rank (reciprocal condition number below threshold)")]
    RankDeficient,

    #[display("solver has not been factorized yet")]
    Uninitialized,
}

/// Line-search acceptance/estimation errors (§4.5-4.6).
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum LineSearchError {
    #[display("initial direction is not a descent direction")]
    NotADescentDirection,

    #[display("step size dropped below the minimum allowed step")]
    StepTooSmall,

    #[display("maximum number of line-search trials exhausted without acceptance")]
    MaxIterationsExceeded,

    #[display("function returned a non-finite value")]
    NonFiniteValue,
}

/// Solver-level errors (§7).
#[derive(Debug, Display, Error, PartialEq, Clone)]
pub enum SolverError {
    #[display("solver does not support the given constraint set")]
    IncompatibleProblem,

    #[display("input vector has size {found}, expected {expected}")]
    InvalidSize { found: usize, expected: usize },

    #[display("inner solver minimization failed")]
    InnerSolverFailed,

    #[display("numerical failure: {reason}")]
    NumericalFailure { reason: String },
}
