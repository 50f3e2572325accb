//! PBA: pure proximal bundle method, scaled-identity metric (§4.13).

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::parameter::{Domain, Parameter};
use crate::core::registry::SolverRegistry;
use crate::solver::bundle::curve_search::{CurveSearchParams, Outcome};
use crate::solver::bundle::proximity::{Proximity, ProximityStrategy};
use crate::solver::bundle::{BundleModel, Metric, converged, proximal_trial};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

#[derive(Debug, Clone)]
pub struct Pba {
    config: Configurable,
    base: SolverBase,
    cap: usize,
    tau0: f64,
    curve_params: CurveSearchParams,
}

impl Pba {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::super::register_base_params(&mut config, &base).expect("pba default params are in-domain");
        config
            .register(Parameter::int("cap", 50, Domain::int_range(1, 10_000)).unwrap())
            .expect("pba default params are in-domain");
        config
            .register(Parameter::float("tau0", 1.0, Domain::positive_float(1e6)).unwrap())
            .expect("pba default params are in-domain");
        Self { config, base, cap: 50, tau0: 1.0, curve_params: CurveSearchParams::default() }
    }

    fn cap(&self) -> usize {
        match self.config.get("cap").ok() {
            Some(crate::core::parameter::ParamValue::Int(c)) => *c as usize,
            _ => self.cap,
        }
    }

    fn tau0(&self) -> f64 {
        match self.config.get("tau0").ok() {
            Some(crate::core::parameter::ParamValue::Float(t)) => *t,
            _ => self.tau0,
        }
    }
}

impl Default for Pba {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Pba {
    fn id(&self) -> &'static str {
        "pba"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::super::sync_base_from_config(&mut self.base, &self.config);
        use problemo::ProblemResult;

        if !f.constraints().is_empty() {
            return Err(()).via(SolverError::IncompatibleProblem);
        }
        if x0.nrows() != f.size() {
            return Err(()).via(SolverError::InvalidSize { found: x0.nrows(), expected: f.size() });
        }

        let mut xc = x0.clone();
        let mut gc = Col::<f64>::zeros(f.size());
        let mut fc = f.eval(&xc, Some(&mut gc), None);
        let mut state = SolverState::new(xc.clone(), fc, gc.clone());

        let mut model = BundleModel::new(self.cap());
        model.add_cut(gc.clone(), fc, xc.clone());
        let mut prox = Proximity::new(ProximityStrategy::Pbm1, self.tau0());

        hooks.terminator.initialize();

        loop {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                break;
            }
            if f.fcalls() >= self.base.max_evals {
                state.status = Status::MaxIters;
                break;
            }

            let (outcome, dual) =
                proximal_trial(f, &xc, fc, &gc, &model, &Metric::Identity, prox.tau, &self.curve_params, 200)?;

            if converged(dual.e_hat, &dual.g_hat, f.size(), self.base.epsilon) {
                state.status = Status::Converged;
                break;
            }

            let model_fy = fc - dual.e_hat;
            match outcome {
                Outcome::Descent { y, fy, gy } | Outcome::CuttingPlane { y, fy, gy } => {
                    model.add_cut(gy.clone(), fy, y.clone());
                    prox.update(1.0, fc, fy, model_fy, &gy, &gc, &y, &xc, true);
                    xc = y;
                    fc = fy;
                    gc = gy;
                    state.nit += 1;
                    state.x = xc.clone();
                    state.f = fc;
                    state.g = gc.clone();
                    state.update_if_better(&xc, fc, &gc);
                    hooks.callback.call(&state);
                }
                Outcome::Null { y, fy, gy } => {
                    prox.update(1.0, fc, fy, model_fy, &gy, &gc, &y, &xc, false);
                    model.add_cut(gy, fy, y);
                    state.nit += 1;
                }
            }

            // the newest cut has no dual weight yet; give it the benefit of
            // the doubt so `enforce_cap` never evicts it on its first pass.
            // Index 0 anchors the original cut as the retained "center" cut.
            let mut weights = dual.weights;
            weights.push(1.0);
            model.enforce_cap(&weights, Some(0));
        }

        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

pub(crate) fn register(r: &mut SolverRegistry) -> Result<(), Problem> {
    r.add("pba", || Box::new(Pba::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, -2.0]);
        let mut solver = Pba::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-2);
    }
}
