//! Gradient descent: `d = −g`, line search, terminate on gradient/value test
//! (§4.8).

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::function::Function;
use crate::core::registry::SolverRegistry;
use crate::linesearch::initial::Lsearch0Variant;
use crate::linesearch::acceptance::LsearchkVariant;
use crate::solver::descent::{DescentDirection, minimize_descent};
use crate::solver::{SolverBase, SolverHooks, SolverState, Solver};

struct GdDirection;

impl DescentDirection for GdDirection {
    fn next_direction(&mut self, g: &Col<f64>) -> Col<f64> {
        let mut d = Col::<f64>::zeros(g.nrows());
        for i in 0..g.nrows() {
            d[i] = -g[i];
        }
        d
    }

    fn after_step(&mut self, _s: &Col<f64>, _y: &Col<f64>) {}
}

#[derive(Debug, Clone)]
pub struct GradientDescent {
    config: Configurable,
    base: SolverBase,
    lsearch0: Lsearch0Variant,
    lsearchk: LsearchkVariant,
}

impl GradientDescent {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("gd default params are in-domain");
        super::register_lsearch_params(&mut config).expect("gd default params are in-domain");
        Self {
            config,
            base,
            lsearch0: Lsearch0Variant::default(),
            lsearchk: LsearchkVariant::default(),
        }
    }
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for GradientDescent {
    fn id(&self) -> &'static str {
        "gd"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        self.lsearch0 = super::lsearch0_from_config(&self.config, self.lsearch0.clone());
        self.lsearchk = super::lsearchk_from_config(&self.config, self.lsearchk.clone());
        let mut direction = GdDirection;
        minimize_descent(f, x0, hooks, &mut self.base, &mut self.lsearch0, &mut self.lsearchk, &mut direction)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

pub(crate) fn register(r: &mut SolverRegistry) -> Result<(), Problem> {
    r.add("gd", || Box::new(GradientDescent::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 2.0, 3.0]);
        let mut solver = GradientDescent::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-6);
    }
}
