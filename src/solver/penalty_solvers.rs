//! Penalty-method outer loops wrapping an unconstrained inner solver (§4.15).
//! Grounded on `original_source/include/nano/solver/penalty.h`'s
//! `solver_penalty_t` outer-loop shape (increase `ρ` by `η`, re-minimize from
//! the previous iterate); the augmented-Lagrangian multiplier update
//! `λ ← λ + 2ρc(x)` lives in [`crate::penalty::PenaltyFunction::update_multipliers`].

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::function::Function;
use crate::core::parameter::{Domain, ParamValue, Parameter};
use crate::core::registry::SolverRegistry;
use crate::penalty::{PenaltyFunction, PenaltyKind};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

const INNER_IDS: &[&str] = &[
    "gd",
    "lbfgs",
    "quasi-sr1",
    "quasi-dfp",
    "quasi-bfgs",
    "quasi-hoshino",
    "quasi-fletcher",
    "cgd-hs",
    "cgd-fr",
    "cgd-prp",
    "cgd-cd",
    "cgd-ls",
    "cgd-dy",
    "cgd-n",
    "cgd-dycd",
    "cgd-dyhs",
];

#[derive(Debug, Clone)]
pub struct PenaltySolver {
    id: &'static str,
    kind: PenaltyKind,
    config: Configurable,
    base: SolverBase,
}

impl PenaltySolver {
    pub fn new(id: &'static str, kind: PenaltyKind) -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("penalty default params are in-domain");
        config
            .register(Parameter::enum_value("inner", "lbfgs", INNER_IDS).unwrap())
            .expect("penalty default params are in-domain");
        config
            .register(Parameter::float("rho0", 1.0, Domain::positive_float(1e12)).unwrap())
            .expect("penalty default params are in-domain");
        config
            .register(Parameter::float("eta", 10.0, Domain::float_range(1.0 + 1e-9, 1e6)).unwrap())
            .expect("penalty default params are in-domain");
        config
            .register(Parameter::int("outer_max_iters", 50, Domain::int_range(1, 10_000)).unwrap())
            .expect("penalty default params are in-domain");
        Self { id, kind, config, base }
    }

    fn inner_id(&self) -> String {
        match self.config.get("inner").ok() {
            Some(ParamValue::Enum(v)) => v.clone(),
            _ => "lbfgs".to_string(),
        }
    }

    fn rho0(&self) -> f64 {
        match self.config.get("rho0").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 1.0,
        }
    }

    fn eta(&self) -> f64 {
        match self.config.get("eta").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 10.0,
        }
    }

    fn outer_max_iters(&self) -> usize {
        match self.config.get("outer_max_iters").ok() {
            Some(ParamValue::Int(v)) => *v as usize,
            _ => 50,
        }
    }
}

impl Solver for PenaltySolver {
    fn id(&self) -> &'static str {
        self.id
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let mut inner = crate::core::registry::registry().get(&self.inner_id())?;
        let eta = self.eta();
        let outer_max_iters = self.outer_max_iters();

        let mut x = x0.clone();
        let mut rho = self.rho0();
        let mut state: Option<SolverState> = None;

        hooks.terminator.initialize();

        for outer_iter in 0..outer_max_iters {
            if let Some(status) = hooks.terminator.terminate() {
                let n = x.nrows();
                let mut s = state
                    .unwrap_or_else(|| SolverState::new(x.clone(), f.eval(&x, None, None), Col::<f64>::zeros(n)));
                s.status = status;
                return Ok(s);
            }

            let mut pf = PenaltyFunction::new(f, self.kind, rho);
            if self.kind == PenaltyKind::AugmentedLagrangian {
                if let Some(prev) = &state {
                    pf.lambda = prev_lambda(prev, pf.lambda.len());
                }
            }

            let mut inner_hooks = SolverHooks::noop();
            let inner_state = inner.minimize(&mut pf, &x, &mut inner_hooks)?;

            if self.kind == PenaltyKind::AugmentedLagrangian {
                pf.update_multipliers(&inner_state.x_best);
            }
            let lambda = pf.lambda.clone();

            x = inner_state.x_best.clone();
            let violation = f.constraints().iter().fold(0.0_f64, |acc, c| acc.max(c.violation(&x)));

            let mut fg = Col::<f64>::zeros(x.nrows());
            let fx = f.eval(&x, Some(&mut fg), None);
            let mut next_state = SolverState::new(x.clone(), fx, fg.clone());
            next_state.nit = outer_iter + 1;
            next_state.update_if_better(&x, fx, &fg);
            next_state.y = if lambda.is_empty() { None } else { Some(Col::from_fn(lambda.len(), |i| lambda[i])) };

            let converged = violation < self.base.epsilon
                && (self.kind != PenaltyKind::Quadratic || rho >= 1.0 / self.base.epsilon);
            if converged {
                next_state.status = Status::Converged;
                hooks.callback.call(&next_state);
                return Ok(next_state);
            }

            hooks.callback.call(&next_state);
            state = Some(next_state);
            rho *= eta;
        }

        let mut s = state.expect("at least one outer iteration ran");
        s.status = Status::MaxIters;
        Ok(s)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

fn prev_lambda(state: &SolverState, n: usize) -> Vec<f64> {
    match &state.y {
        Some(y) if y.nrows() == n => (0..n).map(|i| y[i]).collect(),
        _ => vec![0.0; n],
    }
}

pub(crate) fn register(r: &mut SolverRegistry) -> Result<(), Problem> {
    r.add("linear-penalty", || Box::new(PenaltySolver::new("linear-penalty", PenaltyKind::Linear)))?;
    r.add("quadratic-penalty", || Box::new(PenaltySolver::new("quadratic-penalty", PenaltyKind::Quadratic)))?;
    r.add("augmented-lagrangian", || {
        Box::new(PenaltySolver::new("augmented-lagrangian", PenaltyKind::AugmentedLagrangian))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::{BoundSide, Constraint};
    use crate::core::function::SumSquares;

    #[test]
    fn quadratic_penalty_converges_toward_the_bound() {
        let mut f = SumSquares::new(faer::col![2.0, 2.0]);
        f.append(Constraint::Bound { i: 0, side: BoundSide::Upper, v: 1.0 });

        let mut solver = PenaltySolver::new("quadratic-penalty", PenaltyKind::Quadratic);
        solver.config_mut().set("outer_max_iters", ParamValue::Int(30)).unwrap();
        let mut hooks = SolverHooks::noop();
        let x0 = faer::col![2.0, 2.0];
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.x_best[0] <= 1.0 + 1e-2);
    }

    #[test]
    fn augmented_lagrangian_converges_toward_the_bound() {
        let mut f = SumSquares::new(faer::col![2.0, 2.0]);
        f.append(Constraint::Bound { i: 0, side: BoundSide::Upper, v: 1.0 });

        let mut solver = PenaltySolver::new("augmented-lagrangian", PenaltyKind::AugmentedLagrangian);
        let mut hooks = SolverHooks::noop();
        let x0 = faer::col![2.0, 2.0];
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.x_best[0] <= 1.0 + 1e-4);
    }
}
