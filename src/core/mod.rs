//! L0/L1 foundation: parameters, configurables, the solver registry, dense
//! linear algebra, the function abstraction, and its constraint system.

pub mod configurable;
pub mod constraint;
pub mod error;
pub mod function;
pub mod linalg;
pub mod parameter;
pub mod registry;
