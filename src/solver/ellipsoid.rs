//! Ellipsoid method: deep-cut update of `E = {x : (x−c)ᵀH⁻¹(x−c) ≤ 1}` for
//! convex (possibly non-smooth) subgradient problems (§4.9). Degenerates to
//! bisection in dimension 1.

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::linalg::{dot, identity, mat_vec, outer_add};
use crate::core::parameter::{Domain, Parameter};
use crate::core::registry::SolverRegistry;
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

#[derive(Debug, Clone)]
pub struct Ellipsoid {
    config: Configurable,
    base: SolverBase,
    radius: f64,
}

impl Ellipsoid {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let radius = 10.0;
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("ellipsoid default params are in-domain");
        config
            .register(Parameter::float("radius", radius, Domain::positive_float(1e6)).unwrap())
            .expect("ellipsoid default params are in-domain");
        Self { config, base, radius }
    }

    fn radius(&self) -> f64 {
        match self.config.get("radius").ok() {
            Some(crate::core::parameter::ParamValue::Float(r)) => *r,
            _ => self.radius,
        }
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Ellipsoid {
    fn id(&self) -> &'static str {
        "ellipsoid"
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
        let n = f.size();
        if x0.nrows() != n {
            return Err(()).via(SolverError::InvalidSize { found: x0.nrows(), expected: n });
        }

        let radius = self.radius();
        let mut c = x0.clone();
        let mut g = Col::<f64>::zeros(n);
        let mut f_c = f.eval(&c, Some(&mut g), None);
        let mut state = SolverState::new(c.clone(), f_c, g.clone());

        hooks.terminator.initialize();

        if n == 1 {
            return bisect(f, &mut state, &mut self.base, hooks, radius);
        }

        let mut h = identity(n);
        for i in 0..n {
            h[(i, i)] = radius * radius;
        }

        loop {
            g = Col::<f64>::zeros(n);
            f_c = f.eval(&c, Some(&mut g), None);
            state.nit += 1;
            state.update_if_better(&c, f_c, &g);

            let hg = mat_vec(&h, &g);
            let ghg = dot(&g, &hg).max(0.0);
            let denom = ghg.sqrt();

            if denom < self.base.epsilon {
                state.status = Status::Converged;
                break;
            }
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                break;
            }
            if f.fcalls() >= self.base.max_evals {
                state.status = Status::MaxIters;
                break;
            }

            // deep cut uses the gap to the best value seen so far.
            let alpha = ((f_c - state.f_best) / denom).max(0.0);
            let nf = n as f64;

            for i in 0..n {
                c[i] -= (1.0 + nf * alpha) / (nf + 1.0) * hg[i] / denom;
            }

            let scale = (nf * nf / (nf * nf - 1.0)) * (1.0 - alpha * alpha);
            let coeff = 2.0 * (1.0 + nf * alpha) / ((nf + 1.0) * (1.0 + alpha)) / ghg;
            let mut h_new = h.clone();
            outer_add(&mut h_new, &hg, &hg, -coeff);
            for i in 0..n {
                for j in 0..n {
                    h_new[(i, j)] *= scale;
                }
            }
            h = h_new;

            state.x = c.clone();
            state.f = f_c;
            state.g = g.clone();
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

/// Dimension-1 degeneration to bisection over the interval
/// `[c − R, c + R]`, cutting on the sign of the subgradient.
fn bisect(
    f: &mut dyn Function,
    state: &mut SolverState,
    base: &mut SolverBase,
    hooks: &mut SolverHooks,
    radius: f64,
) -> Result<SolverState, Problem> {
    let mut lo = state.x[0] - radius;
    let mut hi = state.x[0] + radius;

    loop {
        let mid = 0.5 * (lo + hi);
        let mut x = Col::<f64>::zeros(1);
        x[0] = mid;
        let mut g = Col::<f64>::zeros(1);
        let fx = f.eval(&x, Some(&mut g), None);
        state.nit += 1;
        state.update_if_better(&x, fx, &g);
        state.x = x;
        state.f = fx;
        state.g = g.clone();
        hooks.callback.call(state);

        if g[0].abs() < base.epsilon || (hi - lo) < base.epsilon {
            state.status = Status::Converged;
            break;
        }
        if let Some(status) = hooks.terminator.terminate() {
            state.status = status;
            break;
        }
        if f.fcalls() >= base.max_evals {
            state.status = Status::MaxIters;
            break;
        }

        if g[0] > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    Ok(state.clone())
}

pub(crate) fn register(r: &mut SolverRegistry) -> Result<(), Problem> {
    r.add("ellipsoid", || Box::new(Ellipsoid::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;
    use crate::terminators::MultipleTerminators;

    #[test]
    fn converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 2.0]);
        let mut solver = Ellipsoid::new();
        let mut hooks = SolverHooks {
            callback: Box::new(crate::callback::NoOpCallback {}),
            terminator: Box::new(MultipleTerminators::new(Vec::new())),
        };
        let x0 = Col::<f64>::zeros(2);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-3);
    }

    #[test]
    fn bisection_converges_in_one_dimension() {
        let mut f = SumSquares::new(faer::col![2.0]);
        let mut solver = Ellipsoid::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(1);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!((state.x_best[0] - 2.0).abs() < 1e-3);
    }
}
