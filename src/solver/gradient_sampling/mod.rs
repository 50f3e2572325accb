//! Gradient sampling (§4.14): sample a bundle of gradients in a ball around
//! the iterate, solve a simplex QP for the aggregate descent direction, then
//! line-search with a small random perturbation. Grounded on
//! `original_source/src/solver/gsample/{sampler,lsearch}.h` for the outer
//! loop shape; `preconditioner.rs`'s AGS-LBFGS naming is the teacher's
//! `src/solver/gsample/preconditioner.cpp`.

pub mod preconditioner;
pub mod sampler;

use faer::{Col, Mat};
use problemo::Problem;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::configurable::{Configurable, Version};
use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::linalg::{dot, mat_vec, norm2, simplex_qp};
use crate::core::parameter::{Domain, ParamValue, Parameter};
use crate::core::registry::SolverRegistry;
use crate::solver::gradient_sampling::preconditioner::AgsLbfgsPreconditioner;
use crate::solver::gradient_sampling::sampler::{AdaptiveSampler, FixedSampler, Sampler};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerKind {
    Fixed,
    Adaptive,
}

/// Builds `G` (gradients stacked as rows via closures) into the simplex-QP
/// quadratic form `Q = G W Gᵀ` and returns the aggregate direction
/// `d = -W Gᵀ w` for the minimizing weights `w`.
fn aggregate_direction(gradients: &[Col<f64>], w_metric: &Mat<f64>) -> Col<f64> {
    let k = gradients.len();
    let n = w_metric.nrows();
    let wg: Vec<Col<f64>> = gradients.iter().map(|g| mat_vec(w_metric, g)).collect();

    let mut q = Mat::<f64>::zeros(k, k);
    for i in 0..k {
        for j in 0..k {
            q[(i, j)] = dot(&gradients[i], &wg[j]);
        }
    }
    let linear = vec![0.0; k];
    let weights = simplex_qp(&q, &linear, 200);

    let mut g_hat = Col::<f64>::zeros(n);
    for i in 0..k {
        for j in 0..n {
            g_hat[j] += weights[i] * gradients[i][j];
        }
    }
    let wg_hat = mat_vec(w_metric, &g_hat);
    let mut d = Col::<f64>::zeros(n);
    for j in 0..n {
        d[j] = -wg_hat[j];
    }
    d
}

/// Armijo line search with a small random perturbation of the gradient used
/// in the acceptance test, doubling on success and bisecting otherwise.
fn perturbed_line_search(
    f: &mut dyn Function,
    x: &Col<f64>,
    fc: f64,
    d: &Col<f64>,
    w_metric: &Mat<f64>,
    beta: f64,
    perturb_scale: f64,
    rng: &mut StdRng,
) -> (Col<f64>, f64, Col<f64>, bool) {
    let n = x.nrows();
    let wd = mat_vec(w_metric, d);
    let mut slope = dot(d, &wd);
    if perturb_scale > 0.0 {
        let mut noise = Col::<f64>::zeros(n);
        for i in 0..n {
            noise[i] = rng.gen_range(-1.0..1.0) * perturb_scale;
        }
        slope += dot(&noise, &wd);
    }

    let eval_at = |f: &mut dyn Function, t: f64| -> (Col<f64>, f64, Col<f64>) {
        let mut y = Col::<f64>::zeros(n);
        for i in 0..n {
            y[i] = x[i] + t * d[i];
        }
        let mut gy = Col::<f64>::zeros(n);
        let fy = f.eval(&y, Some(&mut gy), None);
        (y, fy, gy)
    };
    let accepts = |fy: f64, t: f64| fy.is_finite() && fy <= fc - t * beta * slope;

    let mut t = 1.0;
    let (mut y, mut fy, mut gy) = eval_at(f, t);

    if accepts(fy, t) {
        // doubling phase: keep extending the accepted step.
        let full_step = true;
        for _ in 0..50 {
            let t_next = t * 2.0;
            let (y_next, fy_next, gy_next) = eval_at(f, t_next);
            if !accepts(fy_next, t_next) {
                break;
            }
            t = t_next;
            y = y_next;
            fy = fy_next;
            gy = gy_next;
        }
        return (y, fy, gy, full_step);
    }

    // bisection phase: shrink until the step is accepted.
    for _ in 0..50 {
        t *= 0.5;
        let (y_next, fy_next, gy_next) = eval_at(f, t);
        y = y_next;
        fy = fy_next;
        gy = gy_next;
        if accepts(fy, t) {
            break;
        }
    }
    (y, fy, gy, false)
}

#[derive(Debug, Clone)]
pub struct GradientSampling {
    id: &'static str,
    sampler_kind: SamplerKind,
    preconditioned: bool,
    config: Configurable,
    base: SolverBase,
}

impl GradientSampling {
    pub fn new(id: &'static str, sampler_kind: SamplerKind, preconditioned: bool) -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("gs default params are in-domain");
        config
            .register(Parameter::float("radius", 1e-3, Domain::positive_float(1e3)).unwrap())
            .expect("gs default params are in-domain");
        config
            .register(Parameter::float("beta", 1e-8, Domain::positive_float(1.0)).unwrap())
            .expect("gs default params are in-domain");
        config
            .register(Parameter::float("perturb", 1e-10, Domain::float_range(0.0, 1.0)).unwrap())
            .expect("gs default params are in-domain");
        config
            .register(Parameter::int("seed", 42, Domain::any_int()).unwrap())
            .expect("gs default params are in-domain");
        Self { id, sampler_kind, preconditioned, config, base }
    }

    fn radius(&self) -> f64 {
        match self.config.get("radius").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 1e-3,
        }
    }

    fn beta(&self) -> f64 {
        match self.config.get("beta").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 1e-8,
        }
    }

    fn perturb(&self) -> f64 {
        match self.config.get("perturb").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => 1e-10,
        }
    }

    fn seed(&self) -> u64 {
        match self.config.get("seed").ok() {
            Some(ParamValue::Int(v)) => *v as u64,
            _ => 42,
        }
    }
}

impl Solver for GradientSampling {
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
        use problemo::ProblemResult;

        if !f.constraints().is_empty() {
            return Err(()).via(SolverError::IncompatibleProblem);
        }
        if x0.nrows() != f.size() {
            return Err(()).via(SolverError::InvalidSize { found: x0.nrows(), expected: f.size() });
        }

        let n = f.size();
        let radius = self.radius();
        let beta = self.beta();
        let perturb = self.perturb();
        let mut rng = StdRng::seed_from_u64(self.seed());

        let mut sampler: Box<dyn Sampler> = match self.sampler_kind {
            SamplerKind::Fixed => Box::new(FixedSampler),
            SamplerKind::Adaptive => Box::new(AdaptiveSampler::default()),
        };
        let mut precond = AgsLbfgsPreconditioner::new();

        let mut x = x0.clone();
        let mut g = Col::<f64>::zeros(n);
        let mut fx = f.eval(&x, Some(&mut g), None);
        let mut state = SolverState::new(x.clone(), fx, g.clone());

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

            let points = sampler.sample(&x, radius, &mut rng);
            let mut gradients = vec![g.clone()];
            for p in &points {
                let mut gp = Col::<f64>::zeros(n);
                f.eval(p, Some(&mut gp), None);
                gradients.push(gp);
            }

            let w_metric = if self.preconditioned { precond.build(n) } else { crate::core::linalg::identity(n) };
            let d = aggregate_direction(&gradients, &w_metric);

            if norm2(&d) < self.base.epsilon {
                state.status = Status::Converged;
                break;
            }

            let (y, fy, gy, full_step) = perturbed_line_search(f, &x, fx, &d, &w_metric, beta, perturb, &mut rng);

            if self.preconditioned {
                let mut dx = Col::<f64>::zeros(n);
                let mut dy = Col::<f64>::zeros(n);
                for i in 0..n {
                    dx[i] = y[i] - x[i];
                    dy[i] = gy[i] - g[i];
                }
                precond.record(dx, dy, self.base.epsilon);
                precond.note_step(full_step);
            }

            x = y;
            fx = fy;
            g = gy;
            state.nit += 1;
            state.x = x.clone();
            state.f = fx;
            state.g = g.clone();
            state.update_if_better(&x, fx, &g);
            hooks.callback.call(&state);
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
    r.add("gs", || Box::new(GradientSampling::new("gs", SamplerKind::Fixed, false)))?;
    r.add("gs-lbfgs", || Box::new(GradientSampling::new("gs-lbfgs", SamplerKind::Fixed, true)))?;
    r.add("ags", || Box::new(GradientSampling::new("ags", SamplerKind::Adaptive, false)))?;
    r.add("ags-lbfgs", || Box::new(GradientSampling::new("ags-lbfgs", SamplerKind::Adaptive, true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn gs_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 2.0]);
        let mut solver = GradientSampling::new("gs", SamplerKind::Fixed, false);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-3);
    }

    #[test]
    fn ags_lbfgs_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![-1.0, 0.5, 2.0]);
        let mut solver = GradientSampling::new("ags-lbfgs", SamplerKind::Adaptive, true);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-2);
    }

    #[test]
    fn deterministic_given_same_seed() {
        let mut f1 = SumSquares::new(faer::col![1.0, 1.0]);
        let mut f2 = SumSquares::new(faer::col![1.0, 1.0]);
        let mut s1 = GradientSampling::new("gs", SamplerKind::Fixed, false);
        let mut s2 = GradientSampling::new("gs", SamplerKind::Fixed, false);
        let mut h1 = SolverHooks::noop();
        let mut h2 = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(2);
        let r1 = s1.minimize(&mut f1, &x0, &mut h1).unwrap();
        let r2 = s2.minimize(&mut f2, &x0, &mut h2).unwrap();
        assert_eq!(r1.f_best, r2.f_best);
        for i in 0..2 {
            assert_eq!(r1.x_best[i], r2.x_best[i]);
        }
    }
}
