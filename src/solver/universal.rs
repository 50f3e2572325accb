//! Universal gradient methods (§4 "Solver registry" supplement): small,
//! self-contained unconstrained solvers that round out the registry's
//! identifier list beyond the algorithmic sections spec.md details directly.
//! Functional and linear constraints are ignored, matching
//! `original_source/include/nano/solver/universal.h`'s note that these
//! methods "were designed to minimize a structured convex problem but here
//! are applied to a (sub-)differentiable convex function directly."
//!
//! Grounded on `original_source/src/solver/asgm.cpp` (adaptive step-length
//! ratio), `original_source/src/solver/cocob.cpp` (coin-betting, Orabona &
//! Pal 2016), and `original_source/src/solver/fgm.cpp` (Nesterov's 2013
//! universal fast gradient method, whose backtracking Lipschitz search is
//! shared here by [`ProximalGradientMethod`] and [`DualGradientMethod`]).

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::function::Function;
use crate::core::linalg::{dot, norm2};
use crate::core::parameter::{Domain, ParamValue, Parameter};
use crate::core::registry::SolverRegistry;
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

fn grad_at(f: &mut dyn Function, x: &Col<f64>) -> (f64, Col<f64>) {
    let mut g = Col::<f64>::zeros(x.nrows());
    let fx = f.eval(x, Some(&mut g), None);
    (fx, g)
}

/// Backtracking search for the smallest `M = L * 2^k` (`k = 0..max_doublings`)
/// satisfying the descent-lemma-with-slack inequality Nesterov's universal
/// scheme relies on: `f(y) <= f(x) + g.(y-x) + M/2 ||y-x||^2 + eps/2`. Shared
/// by [`ProximalGradientMethod`] and [`DualGradientMethod`]; [`FastGradientMethod`]
/// inlines its own accelerated variant (it additionally needs `tau`).
fn backtracking_step(
    f: &mut dyn Function,
    x: &Col<f64>,
    fx: f64,
    g: &Col<f64>,
    l: f64,
    eps: f64,
    candidate: impl Fn(f64) -> Col<f64>,
    max_doublings: usize,
) -> Option<(f64, Col<f64>, f64, Col<f64>)> {
    for k in 0..max_doublings {
        let m = l * 2f64.powi(k as i32);
        let y = candidate(m);
        let mut gy = Col::<f64>::zeros(y.nrows());
        let fy = f.eval(&y, Some(&mut gy), None);
        if !fy.is_finite() {
            continue;
        }
        let mut diff = Col::<f64>::zeros(y.nrows());
        for i in 0..y.nrows() {
            diff[i] = y[i] - x[i];
        }
        let model = fx + dot(g, &diff) + 0.5 * m * dot(&diff, &diff) + 0.5 * eps;
        if fy <= model {
            return Some((m, y, fy, gy));
        }
    }
    None
}

/// Diminishing-step subgradient method, `d_k = -g_k/‖g_k‖`, `t_k = γ/√(k+1)`.
#[derive(Debug, Clone)]
pub struct SubgradientMethod {
    config: Configurable,
    base: SolverBase,
}

impl SubgradientMethod {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("sgm default params are in-domain");
        config
            .register(Parameter::float("gamma", 1.0, Domain::positive_float(1e6)).unwrap())
            .expect("sgm default params are in-domain");
        Self { config, base }
    }

    fn gamma(&self) -> f64 {
        match self.config.get("gamma").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 1.0,
        }
    }
}

impl Default for SubgradientMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for SubgradientMethod {
    fn id(&self) -> &'static str {
        "sgm"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let gamma = self.gamma();
        let (fx, g) = grad_at(f, x0);
        let mut x = x0.clone();
        let mut state = SolverState::new(x.clone(), fx, g.clone());

        hooks.terminator.initialize();

        for k in 0..self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }
            let (_, g) = grad_at(f, &x);
            let gnorm = norm2(&g);
            if gnorm < self.base.epsilon {
                state.status = Status::Converged;
                return Ok(state);
            }

            let step = gamma / ((k as f64) + 1.0).sqrt();
            let mut x_next = x.clone();
            for i in 0..x.nrows() {
                x_next[i] -= step * g[i] / gnorm;
            }
            let (fx_next, gx_next) = grad_at(f, &x_next);

            x = x_next;
            state.nit = k + 1;
            state.x = x.clone();
            state.f = fx_next;
            state.g = gx_next.clone();
            state.update_if_better(&x, fx_next, &gx_next);
            hooks.callback.call(&state);

            if self.base.value_test(state.f_best, &x) {
                state.status = Status::Converged;
                return Ok(state);
            }
        }

        state.status = Status::MaxIters;
        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

/// Adaptive step-length-ratio subgradient method (port of `asgm.cpp`): `h`
/// decreases by `gamma` once `patience` iterations pass without a
/// significant best-value improvement; `L` tracks the largest gradient norm
/// seen so far.
#[derive(Debug, Clone)]
pub struct AdaptiveSubgradientMethod {
    config: Configurable,
    base: SolverBase,
}

impl AdaptiveSubgradientMethod {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("asgm default params are in-domain");
        config
            .register(Parameter::int("patience", 5, Domain::int_range(1, 1000)).unwrap())
            .expect("asgm default params are in-domain");
        config
            .register(Parameter::float("gamma", 2.0, Domain::float_range(1.0 + 1e-9, 100.0)).unwrap())
            .expect("asgm default params are in-domain");
        Self { config, base }
    }

    fn gamma(&self) -> f64 {
        match self.config.get("gamma").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 2.0,
        }
    }

    fn patience(&self) -> i64 {
        match self.config.get("patience").ok() {
            Some(ParamValue::Int(v)) => *v,
            _ => 5,
        }
    }
}

impl Default for AdaptiveSubgradientMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for AdaptiveSubgradientMethod {
    fn id(&self) -> &'static str {
        "asgm"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let gamma = self.gamma();
        let patience = self.patience();
        let epsilon = self.base.epsilon;

        let (fx, g) = grad_at(f, x0);
        let mut x = x0.clone();
        let mut gx = g.clone();
        let mut state = SolverState::new(x.clone(), fx, g.clone());

        let mut h = 1.0_f64;
        let mut l = norm2(&gx).max(1e-300);
        let mut last_ibest = 0_i64;

        hooks.terminator.initialize();

        for i in 0..(self.base.max_evals as i64) {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }

            let gnorm = norm2(&gx).max(1e-300);
            let mut x_next = x.clone();
            for j in 0..x.nrows() {
                x_next[j] -= (h / l) * gx[j] / gnorm;
            }
            let (fx_next, gx_next) = grad_at(f, &x_next);

            let df = (fx_next - state.f_best).abs();
            let iter_ok = fx_next.is_finite();
            let improved = iter_ok && fx_next < state.f_best;

            x = x_next;
            gx = gx_next.clone();
            state.nit = (i + 1) as usize;
            state.x = x.clone();
            state.f = fx_next;
            state.g = gx_next.clone();
            if improved {
                state.f_best = fx_next;
                state.x_best = x.clone();
                state.g_best = gx_next.clone();
            }

            if improved && df >= epsilon {
                last_ibest = i;
            } else if i >= patience + last_ibest {
                h /= gamma;
                last_ibest = i;
                x = state.x_best.clone();
                gx = state.g_best.clone();
            }

            hooks.callback.call(&state);

            let converged = norm2(&gx) < epsilon || (h <= l * epsilon && df < epsilon);
            if !iter_ok {
                state.status = Status::Failed;
                return Ok(state);
            }
            if converged {
                state.status = Status::Converged;
                return Ok(state);
            }

            l = l.max(norm2(&gx));
        }

        state.status = Status::MaxIters;
        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

/// Coin-betting, parameter-free method (port of `cocob.cpp`, Orabona & Pal
/// 2016): per-coordinate reward/bet bookkeeping, no step-size tuning.
#[derive(Debug, Clone)]
pub struct Cocob {
    config: Configurable,
    base: SolverBase,
}

impl Cocob {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("cocob default params are in-domain");
        config
            .register(Parameter::float("l0_smooth", 1e-16, Domain::positive_float(1e6)).unwrap())
            .expect("cocob default params are in-domain");
        config
            .register(Parameter::float("l0_nonsmooth", 1e3, Domain::positive_float(1e9)).unwrap())
            .expect("cocob default params are in-domain");
        Self { config, base }
    }

    fn l0(&self, smooth: bool) -> f64 {
        let key = if smooth { "l0_smooth" } else { "l0_nonsmooth" };
        match self.config.get(key).ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => {
                if smooth {
                    1e-16
                } else {
                    1e3
                }
            }
        }
    }
}

impl Default for Cocob {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Cocob {
    fn id(&self) -> &'static str {
        "cocob"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let l0 = self.l0(f.is_smooth());
        let n = x0.nrows();

        let (fx0, gx0) = grad_at(f, x0);
        let mut state = SolverState::new(x0.clone(), fx0, gx0.clone());

        let mut x = x0.clone();
        let mut gx = gx0;
        let mut l = Col::<f64>::from_fn(n, |_| l0);
        let mut g_abs_sum = Col::<f64>::zeros(n);
        let mut theta = Col::<f64>::zeros(n);
        let mut reward = Col::<f64>::zeros(n);

        hooks.terminator.initialize();

        let mut iter = 0usize;
        while f.fcalls() < self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }

            for i in 0..n {
                l[i] = l[i].max(gx[i].abs());
                g_abs_sum[i] += gx[i].abs();
                theta[i] -= gx[i];
                reward[i] = (reward[i] - (x[i] - x0[i]) * gx[i]).max(0.0);
            }

            let mut x_next = x.clone();
            for i in 0..n {
                let beta = (theta[i] / (g_abs_sum[i] + l[i])).tanh() / l[i];
                x_next[i] = x0[i] + beta * (l[i] + reward[i]);
            }

            let (fx_next, gx_next) = grad_at(f, &x_next);
            let iter_ok = fx_next.is_finite();

            x = x_next;
            gx = gx_next.clone();
            iter += 1;
            state.nit = iter;
            state.x = x.clone();
            state.f = fx_next;
            state.g = gx_next.clone();
            state.update_if_better(&x, fx_next, &gx_next);
            hooks.callback.call(&state);

            if !iter_ok {
                state.status = Status::Failed;
                return Ok(state);
            }
            if self.base.value_test(state.f_best, &x) {
                state.status = Status::Converged;
                return Ok(state);
            }
        }

        state.status = Status::MaxIters;
        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

/// Nesterov's universal primal gradient method: a plain gradient step whose
/// Lipschitz estimate `M` is found by [`backtracking_step`], no momentum.
#[derive(Debug, Clone)]
pub struct ProximalGradientMethod {
    config: Configurable,
    base: SolverBase,
}

impl ProximalGradientMethod {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("pgm default params are in-domain");
        Self { config, base }
    }
}

impl Default for ProximalGradientMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for ProximalGradientMethod {
    fn id(&self) -> &'static str {
        "pgm"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let eps = f64::EPSILON;
        let (mut fx, mut gx) = grad_at(f, x0);
        let mut x = x0.clone();
        let mut state = SolverState::new(x.clone(), fx, gx.clone());
        let mut l = 1.0_f64;

        hooks.terminator.initialize();

        for k in 0..self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }
            if norm2(&gx) < self.base.epsilon {
                state.status = Status::Converged;
                return Ok(state);
            }

            let candidate = |m: f64| -> Col<f64> {
                let mut y = x.clone();
                for i in 0..y.nrows() {
                    y[i] -= gx[i] / m;
                }
                y
            };
            let Some((m, y, fy, gy)) = backtracking_step(f, &x, fx, &gx, l, eps, candidate, 30) else {
                state.status = Status::Failed;
                return Ok(state);
            };

            x = y;
            fx = fy;
            gx = gy;
            l = 0.5 * m;

            state.nit = k + 1;
            state.x = x.clone();
            state.f = fx;
            state.g = gx.clone();
            state.update_if_better(&x, fx, &gx);
            hooks.callback.call(&state);

            if self.base.value_test(state.f_best, &x) {
                state.status = Status::Converged;
                return Ok(state);
            }
        }

        state.status = Status::MaxIters;
        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

/// Nesterov's universal dual gradient method: dual-averaging step built from
/// the cumulative gradient sum against the `½‖x−x0‖²` prox function, with the
/// same backtracking Lipschitz search as [`ProximalGradientMethod`].
#[derive(Debug, Clone)]
pub struct DualGradientMethod {
    config: Configurable,
    base: SolverBase,
}

impl DualGradientMethod {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("dgm default params are in-domain");
        Self { config, base }
    }
}

impl Default for DualGradientMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for DualGradientMethod {
    fn id(&self) -> &'static str {
        "dgm"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let eps = f64::EPSILON;
        let n = x0.nrows();
        let (mut fx, mut gx) = grad_at(f, x0);
        let mut x = x0.clone();
        let mut state = SolverState::new(x.clone(), fx, gx.clone());
        let mut l = 1.0_f64;
        let mut sumg = Col::<f64>::zeros(n);

        hooks.terminator.initialize();

        for k in 0..self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }
            if norm2(&gx) < self.base.epsilon {
                state.status = Status::Converged;
                return Ok(state);
            }

            let candidate = |m: f64| -> Col<f64> {
                let a = 1.0 / m;
                let mut y = Col::<f64>::zeros(n);
                for i in 0..n {
                    y[i] = x0[i] - (sumg[i] + a * gx[i]);
                }
                y
            };
            let Some((m, y, fy, gy)) = backtracking_step(f, &x, fx, &gx, l, eps, candidate, 30) else {
                state.status = Status::Failed;
                return Ok(state);
            };

            let a = 1.0 / m;
            for i in 0..n {
                sumg[i] += a * gx[i];
            }

            x = y;
            fx = fy;
            gx = gy;
            l = 0.5 * m;

            state.nit = k + 1;
            state.x = x.clone();
            state.f = fx;
            state.g = gx.clone();
            state.update_if_better(&x, fx, &gx);
            hooks.callback.call(&state);

            if self.base.value_test(state.f_best, &x) {
                state.status = Status::Converged;
                return Ok(state);
            }
        }

        state.status = Status::MaxIters;
        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

fn compute_a(m: f64, a: f64) -> f64 {
    0.5 * (1.0 / m + (1.0 / (m * m) + 4.0 * a / m).sqrt())
}

/// Nesterov's universal fast gradient method (port of `fgm.cpp`): accelerated
/// scheme combining a dual-averaging sequence `v_k` with the primal sequence
/// `x_k`/`y_k` via the weight `tau = a/(A+a)`.
#[derive(Debug, Clone)]
pub struct FastGradientMethod {
    config: Configurable,
    base: SolverBase,
}

impl FastGradientMethod {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("fgm default params are in-domain");
        Self { config, base }
    }
}

impl Default for FastGradientMethod {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for FastGradientMethod {
    fn id(&self) -> &'static str {
        "fgm"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let eps = f64::EPSILON;
        let n = x0.nrows();

        let (fx0, gx0) = grad_at(f, x0);
        let mut state = SolverState::new(x0.clone(), fx0, gx0);

        let mut yk = x0.clone();
        let mut sumg = Col::<f64>::zeros(n);
        let mut l = 1.0_f64;
        let mut a = 0.0_f64;
        let mut fyk = f64::MAX;

        hooks.terminator.initialize();

        for k in 0..self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }

            let mut v = Col::<f64>::zeros(n);
            for i in 0..n {
                v[i] = x0[i] - sumg[i];
            }

            let mut accepted = false;
            for j in 0..30 {
                let m = (1u64 << j) as f64 * l;
                let step_a = compute_a(m, a);
                let tau = step_a / (a + step_a);

                let mut xk1 = Col::<f64>::zeros(n);
                for i in 0..n {
                    xk1[i] = tau * v[i] + (1.0 - tau) * yk[i];
                }
                let mut gxk1 = Col::<f64>::zeros(n);
                let fxk1 = f.eval(&xk1, Some(&mut gxk1), None);

                let mut yk1 = Col::<f64>::zeros(n);
                for i in 0..n {
                    yk1[i] = tau * (v[i] - step_a * gxk1[i]) + (1.0 - tau) * yk[i];
                }
                let fyk1 = f.eval(&yk1, None, None);

                let mut diff = Col::<f64>::zeros(n);
                for i in 0..n {
                    diff[i] = yk1[i] - xk1[i];
                }
                let bound =
                    fxk1 + dot(&gxk1, &diff) + 0.5 * m * dot(&diff, &diff) + 0.5 * eps * tau;

                if fyk1.is_finite() && fyk1 <= bound {
                    yk = yk1;
                    fyk = fyk1;
                    a += step_a;
                    l = 0.5 * m;
                    for i in 0..n {
                        sumg[i] += step_a * gxk1[i];
                    }
                    accepted = true;
                    break;
                }
            }

            if !accepted {
                state.status = Status::Failed;
                return Ok(state);
            }

            state.nit = k + 1;
            state.x = yk.clone();
            state.f = fyk;
            state.update_if_better(&yk, fyk, &Col::<f64>::zeros(n));
            hooks.callback.call(&state);

            if self.base.value_test(fyk, &yk) {
                break;
            }
        }

        let (f_final, g_final) = grad_at(f, &state.x_best);
        state.f_best = f_final;
        state.g_best = g_final;
        state.status = if state.status == Status::InProgress { Status::MaxIters } else { state.status };
        Ok(state)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

/// Neumaier's optimal subgradient algorithm, simplified to the unconstrained
/// convex case: a Polyak-type step using the best known function value as
/// the target estimate for the (unknown) optimum.
#[derive(Debug, Clone)]
pub struct Osga {
    config: Configurable,
    base: SolverBase,
}

impl Osga {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("osga default params are in-domain");
        config
            .register(Parameter::float("kappa", 0.5, Domain::float_range(1e-6, 1.0 - 1e-6)).unwrap())
            .expect("osga default params are in-domain");
        Self { config, base }
    }

    fn kappa(&self) -> f64 {
        match self.config.get("kappa").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 0.5,
        }
    }
}

impl Default for Osga {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Osga {
    fn id(&self) -> &'static str {
        "osga"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let kappa = self.kappa();
        let (fx, gx) = grad_at(f, x0);
        let mut x = x0.clone();
        let mut state = SolverState::new(x.clone(), fx, gx.clone());
        let mut fs_est = fx - 1.0;

        hooks.terminator.initialize();

        for k in 0..self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }

            let (fx_cur, gx_cur) = grad_at(f, &x);
            let gnorm2 = dot(&gx_cur, &gx_cur);
            if gnorm2 < self.base.epsilon * self.base.epsilon {
                state.status = Status::Converged;
                return Ok(state);
            }

            let target = fs_est.min(state.f_best - 1e-6);
            let h = ((fx_cur - target) / gnorm2).max(1e-300);

            let mut x_next = x.clone();
            for i in 0..x.nrows() {
                x_next[i] -= h * gx_cur[i];
            }
            let (fx_next, gx_next) = grad_at(f, &x_next);
            let iter_ok = fx_next.is_finite();

            x = x_next;
            state.nit = k + 1;
            state.x = x.clone();
            state.f = fx_next;
            state.g = gx_next.clone();
            state.update_if_better(&x, fx_next, &gx_next);
            hooks.callback.call(&state);

            if !iter_ok {
                state.status = Status::Failed;
                return Ok(state);
            }
            if fx_next < fs_est {
                fs_est = fx_next - kappa * (state.f_best - fx_next).abs().max(1e-12);
            }
            if self.base.value_test(state.f_best, &x) {
                state.status = Status::Converged;
                return Ok(state);
            }
        }

        state.status = Status::MaxIters;
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
    r.add("sgm", || Box::new(SubgradientMethod::new()))?;
    r.add("asgm", || Box::new(AdaptiveSubgradientMethod::new()))?;
    r.add("cocob", || Box::new(Cocob::new()))?;
    r.add("pgm", || Box::new(ProximalGradientMethod::new()))?;
    r.add("dgm", || Box::new(DualGradientMethod::new()))?;
    r.add("fgm", || Box::new(FastGradientMethod::new()))?;
    r.add("osga", || Box::new(Osga::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn sgm_decreases_toward_the_minimizer() {
        let mut f = SumSquares::new(faer::col![3.0, -2.0]);
        let mut solver = SubgradientMethod::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 13.0);
    }

    #[test]
    fn asgm_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 1.0]);
        let mut solver = AdaptiveSubgradientMethod::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 2.0);
    }

    #[test]
    fn cocob_makes_progress_without_step_size_tuning() {
        let mut f = SumSquares::new(faer::col![1.0, -1.0]);
        let mut solver = Cocob::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 2.0);
    }

    #[test]
    fn pgm_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![2.0, 0.5]);
        let mut solver = ProximalGradientMethod::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 4.25);
    }

    #[test]
    fn fgm_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 1.0]);
        let mut solver = FastGradientMethod::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 2.0);
    }

    #[test]
    fn osga_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.5, -1.0]);
        let mut solver = Osga::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 3.25);
    }
}
