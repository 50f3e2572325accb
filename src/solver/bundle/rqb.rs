//! RQB: proximal bundle with the scalar `τ` replaced by the SR1
//! quasi-Newton metric `M` (§4.13). Descent direction is `M⁻¹ĝ`.

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::parameter::{Domain, Parameter};
use crate::core::registry::SolverRegistry;
use crate::solver::bundle::curve_search::{CurveSearchParams, Outcome};
use crate::solver::bundle::proximity::QuasiNewtonMetric;
use crate::solver::bundle::{BundleModel, Metric, converged, proximal_trial};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

#[derive(Debug, Clone)]
pub struct Rqb {
    config: Configurable,
    base: SolverBase,
    cap: usize,
    tau: f64,
    curve_params: CurveSearchParams,
}

impl Rqb {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::super::register_base_params(&mut config, &base).expect("rqb default params are in-domain");
        config
            .register(Parameter::int("cap", 50, Domain::int_range(1, 10_000)).unwrap())
            .expect("rqb default params are in-domain");
        Self { config, base, cap: 50, tau: 1.0, curve_params: CurveSearchParams::default() }
    }

    fn cap(&self) -> usize {
        match self.config.get("cap").ok() {
            Some(crate::core::parameter::ParamValue::Int(c)) => *c as usize,
            _ => self.cap,
        }
    }
}

impl Default for Rqb {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Rqb {
    fn id(&self) -> &'static str {
        "rqb"
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

        let n = f.size();
        let mut xc = x0.clone();
        let mut gc = Col::<f64>::zeros(n);
        let mut fc = f.eval(&xc, Some(&mut gc), None);
        let mut state = SolverState::new(xc.clone(), fc, gc.clone());

        let mut model = BundleModel::new(self.cap());
        model.add_cut(gc.clone(), fc, xc.clone());
        let mut metric = QuasiNewtonMetric::identity(n);

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

            let (outcome, dual) = proximal_trial(
                f,
                &xc,
                fc,
                &gc,
                &model,
                &Metric::Matrix(metric.m.clone()),
                self.tau,
                &self.curve_params,
                200,
            )?;

            if converged(dual.e_hat, &dual.g_hat, n, self.base.epsilon) {
                state.status = Status::Converged;
                break;
            }

            match outcome {
                Outcome::Descent { y, fy, gy } | Outcome::CuttingPlane { y, fy, gy } => {
                    let mut e = Col::<f64>::zeros(n);
                    let mut v = Col::<f64>::zeros(n);
                    for i in 0..n {
                        e[i] = y[i] - xc[i];
                        v[i] = gy[i] - gc[i];
                    }
                    metric.update_sr1(&e, &v);
                    model.add_cut(gy.clone(), fy, y.clone());
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
                    model.add_cut(gy, fy, y);
                    state.nit += 1;
                }
            }

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
    r.add("rqb", || Box::new(Rqb::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![0.5, 1.5]);
        let mut solver = Rqb::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-2);
    }
}
