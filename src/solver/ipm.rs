//! Dense primal-dual interior-point method for `min ½xᵀQx + cᵀx s.t. Ax=b,
//! Gx≤h` (§4.16). Grounded on `amadavan-copters/src/nlp/ipm/augmented_system.rs`
//! and `src/lp/mpc/augmented_system.rs`'s `AugmentedSystem` trait naming and
//! the `D = Z_l(X-L)⁻¹+Z_u(X-U)⁻¹` diagonal-fold-in pattern, generalized from
//! `SparseColMat` to a dense `Mat` (sparse linear algebra is a Non-goal) and
//! from the teacher's LP-only MPC (`Q = 0`) to the general QP form.

use faer::{Col, Mat};
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::constraint::Constraint;
use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::linalg::{Ldlt, dot, norm_inf};
use crate::core::parameter::{Domain, ParamValue, Parameter};
use crate::core::registry::SolverRegistry;
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState, Status};

/// The linear system the function's constraints and quadratic objective are
/// extracted into, mirroring the teacher's `LinearProgram` bookkeeping.
struct QuadraticProgram {
    q: Mat<f64>,
    c: Col<f64>,
    a: Mat<f64>,
    b: Col<f64>,
    g: Mat<f64>,
    h: Col<f64>,
}

fn build_program(f: &mut dyn Function) -> Result<QuadraticProgram, Problem> {
    use problemo::ProblemResult;

    let n = f.size();
    let zero = Col::<f64>::zeros(n);
    let mut c = Col::<f64>::zeros(n);
    let mut q = Mat::<f64>::zeros(n, n);
    f.eval(&zero, Some(&mut c), Some(&mut q));

    let mut a_rows: Vec<Vec<f64>> = Vec::new();
    let mut b_vals: Vec<f64> = Vec::new();
    let mut g_rows: Vec<Vec<f64>> = Vec::new();
    let mut h_vals: Vec<f64> = Vec::new();

    for con in f.constraints() {
        match con {
            Constraint::Equality { a, b } => {
                for i in 0..a.nrows() {
                    a_rows.push((0..n).map(|j| a[(i, j)]).collect());
                    b_vals.push(b[i]);
                }
            }
            Constraint::Inequality { a, b } => {
                for i in 0..a.nrows() {
                    g_rows.push((0..n).map(|j| a[(i, j)]).collect());
                    h_vals.push(b[i]);
                }
            }
            Constraint::Bound { i, side, v } => {
                let mut row = vec![0.0; n];
                match side {
                    crate::core::constraint::BoundSide::Lower => {
                        row[*i] = -1.0;
                        g_rows.push(row);
                        h_vals.push(-*v);
                    }
                    crate::core::constraint::BoundSide::Upper => {
                        row[*i] = 1.0;
                        g_rows.push(row);
                        h_vals.push(*v);
                    }
                }
            }
            Constraint::Functional { .. } => {
                return Err(()).via(SolverError::IncompatibleProblem);
            }
        }
    }

    let m_eq = a_rows.len();
    let m_ineq = g_rows.len();
    let mut a = Mat::<f64>::zeros(m_eq, n);
    let mut b = Col::<f64>::zeros(m_eq);
    for (i, row) in a_rows.iter().enumerate() {
        for j in 0..n {
            a[(i, j)] = row[j];
        }
        b[i] = b_vals[i];
    }
    let mut g = Mat::<f64>::zeros(m_ineq, n);
    let mut h = Col::<f64>::zeros(m_ineq);
    for (i, row) in g_rows.iter().enumerate() {
        for j in 0..n {
            g[(i, j)] = row[j];
        }
        h[i] = h_vals[i];
    }

    Ok(QuadraticProgram { q, c, a, b, g, h })
}

fn mat_row_vec(m: &Mat<f64>, i: usize) -> Col<f64> {
    let n = m.ncols();
    Col::from_fn(n, |j| m[(i, j)])
}

fn mat_t_vec(m: &Mat<f64>, x: &Col<f64>) -> Col<f64> {
    let rows = m.nrows();
    let cols = m.ncols();
    let mut out = Col::<f64>::zeros(cols);
    for i in 0..rows {
        for j in 0..cols {
            out[j] += m[(i, j)] * x[i];
        }
    }
    out
}

fn mat_vec_rect(m: &Mat<f64>, x: &Col<f64>) -> Col<f64> {
    let rows = m.nrows();
    let cols = m.ncols();
    let mut out = Col::<f64>::zeros(rows);
    for i in 0..rows {
        let mut s = 0.0;
        for j in 0..cols {
            s += m[(i, j)] * x[j];
        }
        out[i] = s;
    }
    out
}

/// Finds a strictly feasible starting point: project onto the equality
/// manifold via the closed-form least-norm correction `x + Aᵀ(AAᵀ)⁻¹(b−Ax)`,
/// then restore inequality feasibility with a steepest-descent step on the
/// worst-violated row, the step shrunk geometrically by `0.3` each trial
/// (mirrors the teacher's phase-1 "decrease y until strictly feasible" loop;
/// the row-projection is a documented stand-in for solving the phase-1 LP
/// exactly, which would otherwise need the interior-point method itself).
fn find_feasible_start(x0: &Col<f64>, prog: &QuadraticProgram) -> Col<f64> {
    let mut x = x0.clone();
    if prog.a.nrows() > 0 {
        let aat = {
            let mut m = Mat::<f64>::zeros(prog.a.nrows(), prog.a.nrows());
            for i in 0..prog.a.nrows() {
                for j in 0..prog.a.nrows() {
                    m[(i, j)] = dot(&mat_row_vec(&prog.a, i), &mat_row_vec(&prog.a, j));
                }
            }
            m
        };
        let ax = mat_vec_rect(&prog.a, &x);
        let mut resid = Col::<f64>::zeros(prog.b.nrows());
        for i in 0..prog.b.nrows() {
            resid[i] = prog.b[i] - ax[i];
        }
        if let Ok(ldlt) = Ldlt::factorize(&aat) {
            if let Ok(w) = ldlt.solve(&resid) {
                let correction = mat_t_vec(&prog.a, &w);
                for i in 0..x.nrows() {
                    x[i] += correction[i];
                }
            }
        }
    }

    if prog.g.nrows() == 0 {
        return x;
    }

    let violation = |x: &Col<f64>| -> (f64, usize) {
        let gx = mat_vec_rect(&prog.g, x);
        let mut worst = f64::NEG_INFINITY;
        let mut idx = 0;
        for i in 0..gx.nrows() {
            let v = gx[i] - prog.h[i];
            if v > worst {
                worst = v;
                idx = i;
            }
        }
        (worst, idx)
    };

    let mut y = (violation(&x).0 + 1.0).max(1.0);
    for _ in 0..100 {
        let (worst, idx) = violation(&x);
        if worst < -1e-6 {
            break;
        }
        let gi = mat_row_vec(&prog.g, idx);
        let denom = dot(&gi, &gi).max(1e-12);
        for j in 0..x.nrows() {
            x[j] -= y * gi[j] / denom;
        }
        y *= 0.3;
    }
    x
}

#[derive(Debug, Clone)]
pub struct Ipm {
    config: Configurable,
    base: SolverBase,
    mu: f64,
    backtrack_alpha: f64,
}

impl Ipm {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("ipm default params are in-domain");
        config
            .register(Parameter::float("mu", 10.0, Domain::positive_float(1e6)).unwrap())
            .expect("ipm default params are in-domain");
        config
            .register(Parameter::float("backtrack_alpha", 0.01, Domain::float_range(1e-9, 0.5)).unwrap())
            .expect("ipm default params are in-domain");
        Self { config, base, mu: 10.0, backtrack_alpha: 0.01 }
    }

    fn mu_param(&self) -> f64 {
        match self.config.get("mu").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => self.mu,
        }
    }

    fn backtrack_alpha_param(&self) -> f64 {
        match self.config.get("backtrack_alpha").ok() {
            Some(ParamValue::Float(v)) => *v,
            _ => self.backtrack_alpha,
        }
    }
}

impl Default for Ipm {
    fn default() -> Self {
        Self::new()
    }
}

struct Residuals {
    dual: Col<f64>,
    prim: Col<f64>,
    cent: Col<f64>,
}

impl Residuals {
    fn norm(&self) -> f64 {
        let mut s = 0.0;
        for i in 0..self.dual.nrows() {
            s += self.dual[i] * self.dual[i];
        }
        for i in 0..self.prim.nrows() {
            s += self.prim[i] * self.prim[i];
        }
        for i in 0..self.cent.nrows() {
            s += self.cent[i] * self.cent[i];
        }
        s.sqrt()
    }
}

fn compute_residuals(prog: &QuadraticProgram, x: &Col<f64>, u: &Col<f64>, v: &Col<f64>, t: f64) -> Residuals {
    let qx = mat_vec_rect(&prog.q, x);
    let atv = mat_t_vec(&prog.a, v);
    let gtu = mat_t_vec(&prog.g, u);
    let n = x.nrows();
    let mut dual = Col::<f64>::zeros(n);
    for i in 0..n {
        dual[i] = qx[i] + prog.c[i] + atv[i] + gtu[i];
    }

    let ax = mat_vec_rect(&prog.a, x);
    let mut prim = Col::<f64>::zeros(prog.b.nrows());
    for i in 0..prog.b.nrows() {
        prim[i] = ax[i] - prog.b[i];
    }

    let gx = mat_vec_rect(&prog.g, x);
    let mut cent = Col::<f64>::zeros(prog.h.nrows());
    for i in 0..prog.h.nrows() {
        let s = prog.h[i] - gx[i];
        cent[i] = -u[i] * (-s) - (1.0 / t);
    }

    Residuals { dual, prim, cent }
}

impl Solver for Ipm {
    fn id(&self) -> &'static str {
        "ipm"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        use problemo::ProblemResult;

        if x0.nrows() != f.size() {
            return Err(()).via(SolverError::InvalidSize { found: x0.nrows(), expected: f.size() });
        }

        let prog = build_program(f)?;
        let n = x0.nrows();
        let m_eq = prog.a.nrows();
        let m_ineq = prog.g.nrows();

        let mu_param = self.mu_param();
        let backtrack_alpha = self.backtrack_alpha_param();

        let mut x = find_feasible_start(x0, &prog);
        let mut u = Col::<f64>::from_fn(m_ineq.max(1), |_| if m_ineq == 0 { 0.0 } else { 1.0 / m_ineq as f64 });
        if m_ineq == 0 {
            u = Col::<f64>::zeros(0);
        }
        let mut v = Col::<f64>::zeros(m_eq);

        let eps_feas = self.base.epsilon;
        let eps_opt = self.base.epsilon;

        let fx0 = {
            let qx = mat_vec_rect(&prog.q, &x);
            0.5 * dot(&x, &qx) + dot(&prog.c, &x)
        };
        let mut state = SolverState::new(x.clone(), fx0, Col::<f64>::zeros(n));
        state.y = if m_eq > 0 { Some(v.clone()) } else { None };
        state.u = if m_ineq > 0 { Some(u.clone()) } else { None };

        hooks.terminator.initialize();

        let mut rank_deficient_streak = 0usize;

        for iter in 0..self.base.max_evals {
            if let Some(status) = hooks.terminator.terminate() {
                state.status = status;
                return Ok(state);
            }

            let gx = mat_vec_rect(&prog.g, &x);
            let mut s = Col::<f64>::zeros(m_ineq);
            for i in 0..m_ineq {
                s[i] = prog.h[i] - gx[i];
            }
            if m_ineq > 0 && (0..m_ineq).any(|i| s[i] <= 0.0) {
                state.status = Status::Unfeasible;
                return Ok(state);
            }

            let eta = if m_ineq > 0 {
                let mut acc = 0.0;
                for i in 0..m_ineq {
                    acc += s[i] * u[i];
                }
                acc
            } else {
                0.0
            };
            let t = if m_ineq > 0 { mu_param * m_ineq as f64 / eta.max(1e-16) } else { 1.0 };

            let r = compute_residuals(&prog, &x, &u, &v, t);
            let dual_inf = norm_inf(&r.dual);
            let prim_inf = if m_eq > 0 { norm_inf(&r.prim) } else { 0.0 };

            if dual_inf < eps_feas && prim_inf < eps_feas && (m_ineq == 0 || eta < eps_opt) {
                state.status = Status::Converged;
                state.x = x.clone();
                state.f = {
                    let qx = mat_vec_rect(&prog.q, &x);
                    0.5 * dot(&x, &qx) + dot(&prog.c, &x)
                };
                state.update_if_better(&x, state.f, &state.g);
                state.y = if m_eq > 0 { Some(v.clone()) } else { None };
                state.u = if m_ineq > 0 { Some(u.clone()) } else { None };
                return Ok(state);
            }

            // reduced symmetric KKT: (Q + Gᵀ diag(u/s) G) dx + Aᵀ dv = rhs_x, A dx = -r_prim
            let mut m = prog.q.clone();
            if m_ineq > 0 {
                for i in 0..m_ineq {
                    let d = u[i] / s[i].max(1e-300);
                    let gi = mat_row_vec(&prog.g, i);
                    for a in 0..n {
                        for b in 0..n {
                            m[(a, b)] += d * gi[a] * gi[b];
                        }
                    }
                }
            }

            let mut rhs_x = Col::<f64>::zeros(n);
            for i in 0..n {
                rhs_x[i] = -r.dual[i];
            }
            if m_ineq > 0 {
                let mut correction = Col::<f64>::zeros(n);
                for i in 0..m_ineq {
                    let gi = mat_row_vec(&prog.g, i);
                    let coef = r.cent[i] / s[i].max(1e-300);
                    for a in 0..n {
                        correction[a] += coef * gi[a];
                    }
                }
                for i in 0..n {
                    rhs_x[i] += correction[i];
                }
            }

            let dim = n + m_eq;
            let mut kkt = Mat::<f64>::zeros(dim, dim);
            for a in 0..n {
                for b in 0..n {
                    kkt[(a, b)] = m[(a, b)];
                }
            }
            for i in 0..m_eq {
                for j in 0..n {
                    kkt[(n + i, j)] = prog.a[(i, j)];
                    kkt[(j, n + i)] = prog.a[(i, j)];
                }
            }
            let mut rhs = Col::<f64>::zeros(dim);
            for i in 0..n {
                rhs[i] = rhs_x[i];
            }
            for i in 0..m_eq {
                rhs[n + i] = -r.prim[i];
            }

            let ldlt = match Ldlt::factorize(&kkt) {
                Ok(l) => l,
                Err(_) => {
                    state.status = Status::Failed;
                    return Ok(state);
                }
            };
            if ldlt.rcond() < 1e-12 {
                rank_deficient_streak += 1;
                if rank_deficient_streak >= 3 {
                    state.status = Status::Failed;
                    return Ok(state);
                }
            } else {
                rank_deficient_streak = 0;
            }

            let sol = match ldlt.solve(&rhs) {
                Ok(s) => s,
                Err(_) => {
                    state.status = Status::Failed;
                    return Ok(state);
                }
            };
            let dx = Col::<f64>::from_fn(n, |i| sol[i]);
            let dv = Col::<f64>::from_fn(m_eq, |i| sol[n + i]);

            let mut du = Col::<f64>::zeros(m_ineq);
            if m_ineq > 0 {
                let gdx = mat_vec_rect(&prog.g, &dx);
                for i in 0..m_ineq {
                    du[i] = (u[i] * gdx[i] - r.cent[i]) / s[i].max(1e-300);
                }
            }

            // feasible step length: u + α du > 0, s - α G dx > 0.
            let mut alpha_max = 1.0_f64;
            for i in 0..m_ineq {
                if du[i] < 0.0 {
                    alpha_max = alpha_max.min(-u[i] / du[i]);
                }
            }
            if m_ineq > 0 {
                let gdx = mat_vec_rect(&prog.g, &dx);
                for i in 0..m_ineq {
                    if gdx[i] > 0.0 {
                        alpha_max = alpha_max.min(s[i] / gdx[i]);
                    }
                }
            }
            alpha_max *= 0.99;

            if !alpha_max.is_finite() || alpha_max <= 0.0 {
                state.status = Status::Unbounded;
                return Ok(state);
            }

            let r_norm = r.norm();
            let mut alpha = alpha_max;
            let mut accepted = false;
            for _ in 0..30 {
                let mut x_try = x.clone();
                for i in 0..n {
                    x_try[i] += alpha * dx[i];
                }
                let mut u_try = Col::<f64>::zeros(m_ineq);
                for i in 0..m_ineq {
                    u_try[i] = u[i] + alpha * du[i];
                }
                let mut v_try = Col::<f64>::zeros(m_eq);
                for i in 0..m_eq {
                    v_try[i] = v[i] + alpha * dv[i];
                }
                let r_try = compute_residuals(&prog, &x_try, &u_try, &v_try, t);
                if r_try.norm() <= (1.0 - backtrack_alpha * alpha) * r_norm || alpha < 1e-10 {
                    x = x_try;
                    u = u_try;
                    v = v_try;
                    accepted = true;
                    break;
                }
                alpha *= 0.5;
            }
            if !accepted {
                state.status = Status::Failed;
                return Ok(state);
            }

            state.nit = iter + 1;
            state.x = x.clone();
            state.f = {
                let qx = mat_vec_rect(&prog.q, &x);
                0.5 * dot(&x, &qx) + dot(&prog.c, &x)
            };
            state.update_if_better(&x, state.f, &state.g);
            hooks.callback.call(&state);
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
    r.add("ipm", || Box::new(Ipm::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::{BoundSide, Relation};
    use crate::core::function::Quadratic;

    #[test]
    fn solves_simplex_lp() {
        // min -x0 - x1 + 2x2 s.t. sum(x) = 1, x >= 0.
        let p = Mat::<f64>::zeros(3, 3);
        let q = faer::col![-1.0, -1.0, 2.0];
        let mut f = Quadratic::new(p, q, 0.0);

        let a = Mat::<f64>::from_fn(1, 3, |_, _| 1.0);
        let b = faer::col![1.0];
        f.append(Constraint::Equality { a, b });
        for i in 0..3 {
            f.append(Constraint::Bound { i, side: BoundSide::Lower, v: 0.0 });
        }

        let mut solver = Ipm::new();
        let mut hooks = SolverHooks::noop();
        let x0 = faer::col![0.34, 0.33, 0.33];
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < -0.9);
    }

    #[test]
    fn rejects_functional_constraints() {
        let p = Mat::<f64>::zeros(2, 2);
        let q = faer::col![0.0, 0.0];
        let mut f = Quadratic::new(p, q, 0.0);
        f.append(Constraint::Functional {
            g: std::sync::Arc::new(|x: &Col<f64>| x[0] + x[1]),
            relation: Relation::Equality,
        });

        let mut solver = Ipm::new();
        let mut hooks = SolverHooks::noop();
        let x0 = faer::col![0.0, 0.0];
        assert!(solver.minimize(&mut f, &x0, &mut hooks).is_err());
    }
}
