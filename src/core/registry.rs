//! Read-only, one-shot-initialized factory registry of named solver
//! prototypes (§5, §6, "Solver registry"). Grounded on
//! `original_source/include/nano/core/factory.h`'s `factory_t<tobject>`
//! (`add`, `has`, `get`, `ids`, `size`) and the teacher's `dyn_clone`-based
//! `OptionTrait` cloning pattern in `src/lib.rs`.
//!
//! Each builtin identifier maps to a plain factory function rather than a
//! clone-on-demand prototype instance: the concrete solver types in this
//! crate are parameterized over strategy traits (step size, line search,
//! proximity update...) which cannot be erased into a single `Box<dyn
//! Solver>` and then cloned without first picking concrete type arguments —
//! a factory function performs that choice once, at registration time,
//! which is functionally equivalent to cloning a prototype.

use std::collections::HashMap;
use std::sync::OnceLock;

use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::RegistryError;
use crate::solver::Solver;

/// Constructs a fresh, default-configured solver instance.
pub type SolverFactory = fn() -> Box<dyn Solver>;

/// The read-only registry of `id → factory` mappings, populated once via
/// [`registry`].
pub struct SolverRegistry {
    factories: HashMap<&'static str, SolverFactory>,
}

impl SolverRegistry {
    fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub(crate) fn add(&mut self, id: &'static str, factory: SolverFactory) -> Result<(), Problem> {
        if self.factories.contains_key(id) {
            return Err(()).via(RegistryError::Duplicate { id: id.to_string() });
        }
        self.factories.insert(id, factory);
        Ok(())
    }

    pub fn has(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Constructs a fresh solver instance for `id`.
    pub fn get(&self, id: &str) -> Result<Box<dyn Solver>, Problem> {
        self.factories
            .get(id)
            .map(|f| f())
            .ok_or(())
            .via(RegistryError::NotFound { id: id.to_string() })
    }

    pub fn ids(&self) -> Vec<&'static str> {
        let mut v: Vec<&'static str> = self.factories.keys().copied().collect();
        v.sort_unstable();
        v
    }

    pub fn size(&self) -> usize {
        self.factories.len()
    }
}

static REGISTRY: OnceLock<SolverRegistry> = OnceLock::new();

/// Returns the process-wide solver registry, populating it with every
/// builtin identifier from §6 on first use.
pub fn registry() -> &'static SolverRegistry {
    REGISTRY.get_or_init(|| {
        let mut r = SolverRegistry::empty();
        crate::solver::register_builtins(&mut r).expect("builtin solver ids must be unique");
        r
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_gd_and_lbfgs() {
        let r = registry();
        assert!(r.has("gd"));
        assert!(r.has("lbfgs"));
        assert!(r.size() >= 10);
    }

    #[test]
    fn unknown_id_fails() {
        let r = registry();
        assert!(r.get("not-a-real-solver").is_err());
    }
}
