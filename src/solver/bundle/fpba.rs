//! FPBA-1/FPBA-2: proximal bundle with a Nesterov-accelerated sequence
//! layered on top of the proximal iterate (§4.13). Grounded on
//! `original_source/include/nano/solver/nesterov.h`'s
//! `nesterov_sequence1_t`/`nesterov_sequence2_t` two-sequence acceleration.

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Fpba1,
    Fpba2,
}

/// `λ_{k+1} = ½(1 + √(1+4λ_k²))`, `α_k = (λ_k−1)/λ_{k+1}`. Shared by both
/// FPBA variants; `β_k` is the only point of divergence (see
/// [`NesterovSequence1`] / [`NesterovSequence2`]).
#[derive(Debug, Clone, Copy)]
pub struct NesterovState {
    pub lambda: f64,
}

impl NesterovState {
    pub fn new() -> Self {
        Self { lambda: 1.0 }
    }

    fn next_lambda(&self) -> f64 {
        0.5 * (1.0 + (1.0 + 4.0 * self.lambda * self.lambda).sqrt())
    }

    fn alpha(&self, lambda_next: f64) -> f64 {
        (self.lambda - 1.0) / lambda_next
    }
}

impl Default for NesterovState {
    fn default() -> Self {
        Self::new()
    }
}

/// The momentum-coefficient sequence distinguishing FPBA-1 from FPBA-2.
trait NesterovSequence {
    fn beta(lambda: f64, lambda_next: f64) -> f64;
}

/// `β_k = 0`.
pub struct NesterovSequence1;
impl NesterovSequence for NesterovSequence1 {
    fn beta(_lambda: f64, _lambda_next: f64) -> f64 {
        0.0
    }
}

/// `β_k = λ_k / λ_{k+1}`.
pub struct NesterovSequence2;
impl NesterovSequence for NesterovSequence2 {
    fn beta(lambda: f64, lambda_next: f64) -> f64 {
        lambda / lambda_next
    }
}

fn beta(variant: Variant, lambda: f64, lambda_next: f64) -> f64 {
    match variant {
        Variant::Fpba1 => NesterovSequence1::beta(lambda, lambda_next),
        Variant::Fpba2 => NesterovSequence2::beta(lambda, lambda_next),
    }
}

#[derive(Debug, Clone)]
pub struct Fpba {
    variant: Variant,
    config: Configurable,
    base: SolverBase,
    cap: usize,
    tau0: f64,
    curve_params: CurveSearchParams,
}

impl Fpba {
    pub fn new(variant: Variant) -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::super::register_base_params(&mut config, &base).expect("fpba default params are in-domain");
        config
            .register(Parameter::int("cap", 50, Domain::int_range(1, 10_000)).unwrap())
            .expect("fpba default params are in-domain");
        config
            .register(Parameter::float("tau0", 1.0, Domain::positive_float(1e6)).unwrap())
            .expect("fpba default params are in-domain");
        Self { variant, config, base, cap: 50, tau0: 1.0, curve_params: CurveSearchParams::default() }
    }

    fn id_str(&self) -> &'static str {
        match self.variant {
            Variant::Fpba1 => "fpba1",
            Variant::Fpba2 => "fpba2",
        }
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

impl Solver for Fpba {
    fn id(&self) -> &'static str {
        self.id_str()
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
        // `xk` is the proximal-point sequence; `yk` is the accelerated
        // lookahead the bundle actually linearizes/searches around.
        let mut xk = x0.clone();
        let mut gxk = Col::<f64>::zeros(n);
        let mut fxk = f.eval(&xk, Some(&mut gxk), None);
        let mut yk = xk.clone();
        let mut gyk = gxk.clone();
        let mut fyk = fxk;

        let mut state = SolverState::new(xk.clone(), fxk, gxk.clone());

        let mut model = BundleModel::new(self.cap());
        model.add_cut(gxk.clone(), fxk, xk.clone());
        let mut prox = Proximity::new(ProximityStrategy::Pbm1, self.tau0());
        let mut nesterov = NesterovState::new();

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
                proximal_trial(f, &yk, fyk, &gyk, &model, &Metric::Identity, prox.tau, &self.curve_params, 200)?;

            if converged(dual.e_hat, &dual.g_hat, n, self.base.epsilon) {
                state.status = Status::Converged;
                break;
            }

            let model_fy = fyk - dual.e_hat;
            let z = match outcome {
                Outcome::Descent { y, fy, gy } | Outcome::CuttingPlane { y, fy, gy } => {
                    model.add_cut(gy.clone(), fy, y.clone());
                    prox.update(1.0, fyk, fy, model_fy, &gy, &gyk, &y, &yk, true);
                    Some((y, fy, gy))
                }
                Outcome::Null { y, fy, gy } => {
                    prox.update(1.0, fyk, fy, model_fy, &gy, &gyk, &y, &yk, false);
                    model.add_cut(gy, fy, y);
                    None
                }
            };

            let mut weights = dual.weights;
            weights.push(1.0);
            model.enforce_cap(&weights, Some(0));

            if let Some((z, fz, gz)) = z {
                let lambda_next = nesterov.next_lambda();
                let alpha = nesterov.alpha(lambda_next);
                let b = beta(self.variant, nesterov.lambda, lambda_next);

                let mut y_next = Col::<f64>::zeros(n);
                for i in 0..n {
                    y_next[i] = z[i] + alpha * (z[i] - yk[i]) + b * (z[i] - xk[i]);
                }

                let improved = fz < state.f_best;
                nesterov.lambda = if improved { lambda_next } else { 1.0 };

                xk = z.clone();
                fxk = fz;
                gxk = gz.clone();
                yk = y_next;
                let mut gy_next = Col::<f64>::zeros(n);
                fyk = f.eval(&yk, Some(&mut gy_next), None);
                gyk = gy_next;

                state.nit += 1;
                state.x = xk.clone();
                state.f = fxk;
                state.g = gxk.clone();
                state.update_if_better(&xk, fxk, &gxk);
                hooks.callback.call(&state);
            } else {
                state.nit += 1;
            }
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
    r.add("fpba1", || Box::new(Fpba::new(Variant::Fpba1)))?;
    r.add("fpba2", || Box::new(Fpba::new(Variant::Fpba2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn fpba2_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 1.0, 1.0]);
        let mut solver = Fpba::new(Variant::Fpba2);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-2);
    }
}
