//! Shared line-search descent loop used by gradient descent, conjugate
//! gradient, LBFGS, and quasi-Newton (§4.8). Each algorithm only supplies a
//! [`DescentDirection`]; the iteration, line search, and termination tests
//! are identical across all four, mirroring how the teacher's
//! `nlp::gd::GradientDescent` separates the step-size policy from the outer
//! primal-dual loop.

use faer::Col;
use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::linalg::{dot, norm2};
use crate::linesearch::Step;
use crate::linesearch::acceptance::{LineFn, Lsearchk, LsearchkVariant};
use crate::linesearch::initial::{Lsearch0, Lsearch0Context, Lsearch0Variant};
use crate::solver::{SolverBase, SolverHooks, SolverState, Status};

/// Produces the next search direction from the current gradient and updates
/// any internal history once a step is accepted.
pub(crate) trait DescentDirection {
    fn next_direction(&mut self, g: &Col<f64>) -> Col<f64>;
    fn after_step(&mut self, s: &Col<f64>, y: &Col<f64>);
    /// Specific termination predicate (§4.7 `specific_test`), e.g. CG/LBFGS
    /// memory exhaustion signals. Default: never fires.
    fn specific_test(&self) -> bool {
        false
    }
}

pub(crate) fn minimize_descent<D: DescentDirection>(
    f: &mut dyn Function,
    x0: &Col<f64>,
    hooks: &mut SolverHooks,
    base: &mut SolverBase,
    lsearch0: &mut Lsearch0Variant,
    lsearchk: &mut LsearchkVariant,
    direction: &mut D,
) -> Result<SolverState, Problem> {
    if !f.constraints().is_empty() {
        return Err(()).via(SolverError::IncompatibleProblem);
    }
    if x0.nrows() != f.size() {
        return Err(()).via(SolverError::InvalidSize {
            found: x0.nrows(),
            expected: f.size(),
        });
    }

    let mut x = x0.clone();
    let mut g = Col::<f64>::zeros(f.size());
    let mut fx = f.eval(&x, Some(&mut g), None);
    let mut state = SolverState::new(x.clone(), fx, g.clone());

    hooks.terminator.initialize();

    let mut t_prev = 1.0;
    let mut f_prev = fx;

    loop {
        if base.gradient_test(&g, fx) {
            state.status = Status::Converged;
            break;
        }
        if direction.specific_test() {
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

        let d = direction.next_direction(&g);
        if dot(&g, &d) >= 0.0 {
            state.status = Status::Failed;
            break;
        }

        let ctx = Lsearch0Context {
            nit: state.nit,
            f_prev,
            f_curr: fx,
            g: &g,
            d: &d,
            x: &x,
            t_prev,
        };
        let t0 = lsearch0.initial_step(&ctx);

        let phi0 = Step::new(0.0, fx, dot(&g, &d));
        let mut line = LineFn { f, x: &x, d: &d };
        let step = match lsearchk.search(&mut line, phi0, t0, base.tolerance.0, base.tolerance.1) {
            Ok(s) => s,
            Err(_) => {
                state.status = Status::Failed;
                break;
            }
        };

        let n = x.nrows();
        let mut x_next = Col::<f64>::zeros(n);
        for i in 0..n {
            x_next[i] = x[i] + step.t * d[i];
        }
        let mut g_next = Col::<f64>::zeros(n);
        let f_next = f.eval(&x_next, Some(&mut g_next), None);

        let mut s = Col::<f64>::zeros(n);
        let mut y = Col::<f64>::zeros(n);
        for i in 0..n {
            s[i] = x_next[i] - x[i];
            y[i] = g_next[i] - g[i];
        }
        direction.after_step(&s, &y);

        t_prev = step.t;
        f_prev = fx;
        x = x_next;
        g = g_next;
        fx = f_next;
        state.nit += 1;
        state.x = x.clone();
        state.f = fx;
        state.g = g.clone();
        state.update_if_better(&x, fx, &g);

        hooks.callback.call(&state);

        if base.value_test(state.f_best, &x) {
            state.status = Status::Converged;
            break;
        }
        if !fx.is_finite() || norm2(&x) > 1e12 {
            state.status = Status::Unbounded;
            break;
        }
    }

    Ok(state)
}
