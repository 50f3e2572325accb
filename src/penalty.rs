//! Penalty transforms: wrap a constrained [`Function`] into an unconstrained
//! one (§4.3). Grounded on
//! `original_source/include/nano/solver/penalty.h` (the linear-vs-quadratic
//! exactness trade-off documented there is carried into the doc comments
//! below). The augmented-Lagrangian combinator is a third transform variant
//! reusing the quadratic term's gradient plus a `λᵀc(x)` term (§4.15).

use faer::{Col, Mat};

use crate::core::constraint::{BoundSide, Constraint, Relation};
use crate::core::function::Function;

/// Which combinator builds the unconstrained penalty objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyKind {
    /// `P(v) = v`. Exact (the unconstrained minimizer is feasible) for a
    /// finite `ρ`, but always non-smooth at the constraint boundary.
    Linear,
    /// `P(v) = v²`. Smooth iff the base function is smooth, but exact only
    /// in the limit `ρ → ∞`.
    Quadratic,
    /// Quadratic term plus a `λᵀc(x)` multiplier term, updated externally by
    /// the outer augmented-Lagrangian loop (§4.15).
    AugmentedLagrangian,
}

/// Finite-difference step used only for [`Constraint::Functional`]
/// gradients, since that variant wraps an opaque closure with no declared
/// oracle.
const FUNCTIONAL_FD_STEP: f64 = 1e-6;

/// Wraps a constrained function into `F(x; ρ) = f(x) + ρ·Σ P(violation_i(x))`.
pub struct PenaltyFunction<'a> {
    inner: &'a mut dyn Function,
    pub kind: PenaltyKind,
    pub rho: f64,
    /// Augmented-Lagrangian multipliers, one per constraint *row* (flattened
    /// in `inner.constraints()` order, then row order within each
    /// multi-row constraint); ignored for the other two kinds.
    pub lambda: Vec<f64>,
    /// The unconstrained view owns no constraints of its own; this backs
    /// the `Function::constraints`/`constraints_mut` contract.
    no_constraints: Vec<Constraint>,
}

impl<'a> PenaltyFunction<'a> {
    pub fn new(inner: &'a mut dyn Function, kind: PenaltyKind, rho: f64) -> Self {
        let n: usize = inner.constraints().iter().map(constraint_row_count).sum();
        Self {
            inner,
            kind,
            rho,
            lambda: vec![0.0; n],
            no_constraints: Vec::new(),
        }
    }

    /// Current maximum constraint violation, used by the outer loop to
    /// decide when to stop increasing `ρ`.
    pub fn violation(&self, x: &Col<f64>) -> f64 {
        self.inner
            .constraints()
            .iter()
            .fold(0.0_f64, |acc, c| acc.max(c.violation(x)))
    }

    /// Updates the augmented-Lagrangian multipliers: `λᵢ ← λᵢ + 2ρ·cᵢ(x)`,
    /// one multiplier per constraint *row*.
    pub fn update_multipliers(&mut self, x: &Col<f64>) {
        let rows = all_rows(self.inner.constraints(), x);
        for (lam, row) in self.lambda.iter_mut().zip(rows.iter()) {
            *lam += 2.0 * self.rho * row.signed;
        }
    }

    fn penalty_and_grad(&self, x: &Col<f64>) -> (f64, Col<f64>) {
        let n = x.nrows();
        let mut total = 0.0;
        let mut grad = Col::<f64>::zeros(n);

        for (idx, row) in all_rows(self.inner.constraints(), x).iter().enumerate() {
            if !row.active {
                continue;
            }
            let signed = row.signed;
            let dc = &row.grad;

            match self.kind {
                PenaltyKind::Linear => {
                    total += self.rho * signed.abs();
                    let s = signed.signum();
                    for i in 0..n {
                        grad[i] += self.rho * s * dc[i];
                    }
                }
                PenaltyKind::Quadratic | PenaltyKind::AugmentedLagrangian => {
                    total += self.rho * signed * signed;
                    for i in 0..n {
                        grad[i] += 2.0 * self.rho * signed * dc[i];
                    }
                    if self.kind == PenaltyKind::AugmentedLagrangian {
                        let lam = self.lambda.get(idx).copied().unwrap_or(0.0);
                        total += lam * signed;
                        for i in 0..n {
                            grad[i] += lam * dc[i];
                        }
                    }
                }
            }
        }
        (total, grad)
    }
}

impl<'a> Function for PenaltyFunction<'a> {
    fn name(&self) -> &str {
        "penalty"
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn is_convex(&self) -> bool {
        false
    }

    fn is_smooth(&self) -> bool {
        self.kind != PenaltyKind::Linear && self.inner.is_smooth()
    }

    fn eval(&mut self, x: &Col<f64>, g: Option<&mut Col<f64>>, h: Option<&mut Mat<f64>>) -> f64 {
        let mut fg = Col::<f64>::zeros(self.size());
        let f = self.inner.eval(x, Some(&mut fg), h);
        let (pval, pgrad) = self.penalty_and_grad(x);

        if let Some(g) = g {
            for i in 0..self.size() {
                g[i] = fg[i] + pgrad[i];
            }
        }
        f + pval
    }

    fn fcalls(&self) -> usize {
        self.inner.fcalls()
    }

    fn gcalls(&self) -> usize {
        self.inner.gcalls()
    }

    fn constraints(&self) -> &[Constraint] {
        &self.no_constraints
    }

    fn constraints_mut(&mut self) -> &mut Vec<Constraint> {
        &mut self.no_constraints
    }
}

/// One scalar constraint row: whether it is violated, its signed value
/// `cᵢ(x)`, and the gradient of that scalar w.r.t. `x`. Every row of a
/// multi-row [`Constraint`] is penalized independently (§4.3: "sum
/// contributions across all active violations"), so a row with residual
/// `+δ` and a row with residual `−δ` both register as violations instead of
/// cancelling in a folded sum.
struct ViolationRow {
    active: bool,
    signed: f64,
    grad: Col<f64>,
}

/// Number of scalar rows `c` decomposes into; independent of `x`, used to
/// size the per-row augmented-Lagrangian multiplier vector.
fn constraint_row_count(c: &Constraint) -> usize {
    match c {
        Constraint::Equality { a, .. } | Constraint::Inequality { a, .. } => a.nrows(),
        Constraint::Bound { .. } | Constraint::Functional { .. } => 1,
    }
}

/// Decomposes one constraint into its scalar [`ViolationRow`]s at `x`.
fn rows_with_grad(c: &Constraint, x: &Col<f64>) -> Vec<ViolationRow> {
    let n = x.nrows();
    match c {
        Constraint::Equality { a, b } => (0..a.nrows())
            .map(|i| {
                let mut row = 0.0;
                for j in 0..n {
                    row += a[(i, j)] * x[j];
                }
                let ci = row - b[i];
                let mut grad = Col::<f64>::zeros(n);
                for j in 0..n {
                    grad[j] = a[(i, j)];
                }
                ViolationRow { active: true, signed: ci, grad }
            })
            .collect(),
        Constraint::Inequality { a, b } => (0..a.nrows())
            .map(|i| {
                let mut row = 0.0;
                for j in 0..n {
                    row += a[(i, j)] * x[j];
                }
                let ci = row - b[i];
                let active = ci > 0.0;
                let mut grad = Col::<f64>::zeros(n);
                if active {
                    for j in 0..n {
                        grad[j] = a[(i, j)];
                    }
                }
                ViolationRow { active, signed: ci.max(0.0), grad }
            })
            .collect(),
        Constraint::Bound { i, side, v } => {
            let (ci, sign): (f64, f64) = match side {
                BoundSide::Lower => (v - x[*i], -1.0),
                BoundSide::Upper => (x[*i] - v, 1.0),
            };
            let active = ci > 0.0;
            let mut grad = Col::<f64>::zeros(n);
            if active {
                grad[*i] = sign;
            }
            vec![ViolationRow { active, signed: ci.max(0.0), grad }]
        }
        Constraint::Functional { g, relation } => {
            let val = g(x);
            let mut grad = Col::<f64>::zeros(n);
            let mut xp = x.clone();
            for i in 0..n {
                let step = FUNCTIONAL_FD_STEP * x[i].abs().max(1.0);
                xp[i] += step;
                let fp = g(&xp);
                xp[i] = x[i];
                grad[i] = (fp - val) / step;
            }
            let row = match relation {
                Relation::Equality => ViolationRow { active: true, signed: val, grad },
                Relation::Inequality => ViolationRow { active: val > 0.0, signed: val.max(0.0), grad },
            };
            vec![row]
        }
    }
}

/// Flattens every constraint's rows, in constraint order then row order —
/// the same order [`PenaltyFunction::lambda`] is indexed by.
fn all_rows(constraints: &[Constraint], x: &Col<f64>) -> Vec<ViolationRow> {
    constraints.iter().flat_map(|c| rows_with_grad(c, x)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn linear_penalty_pushes_toward_feasibility() {
        let mut base = SumSquares::new(faer::col![2.0, 2.0]);
        base.append(Constraint::Bound { i: 0, side: BoundSide::Upper, v: 1.0 });

        let mut pf = PenaltyFunction::new(&mut base, PenaltyKind::Linear, 10.0);
        let x = faer::col![2.0, 2.0];
        let mut g = Col::<f64>::zeros(2);
        pf.eval(&x, Some(&mut g), None);
        // violation pushes x[0] down, so the penalty gradient at x[0] is positive.
        assert!(g[0] > 0.0);
    }

    #[test]
    fn quadratic_penalty_is_zero_when_feasible() {
        let mut base = SumSquares::new(faer::col![0.0, 0.0]);
        base.append(Constraint::Bound { i: 0, side: BoundSide::Upper, v: 1.0 });
        let mut pf = PenaltyFunction::new(&mut base, PenaltyKind::Quadratic, 10.0);
        let x = faer::col![0.5, 0.5];
        assert_eq!(pf.violation(&x), 0.0);
    }

    /// Two equality rows with opposite-sign residuals (`x0+x1=0` violated by
    /// `+δ`, `x0-x1=0` violated by `−δ`) must not cancel: both rows are
    /// infeasible, so the penalty and its gradient must be nonzero.
    #[test]
    fn equality_penalty_does_not_cancel_opposite_sign_rows() {
        use crate::core::function::Quadratic;

        let delta = 0.3;
        let p = Mat::<f64>::zeros(2, 2);
        let q = Col::<f64>::zeros(2);
        let mut base = Quadratic::new(p, q, 0.0);
        let a = Mat::<f64>::from_fn(2, 2, |i, j| if i == 0 { 1.0 } else if j == 0 { 1.0 } else { -1.0 });
        let b = faer::col![0.0, 0.0];
        base.append(Constraint::Equality { a, b });

        // x0 = 0, x1 = delta: row0 = x0+x1 = delta, row1 = x0-x1 = -delta.
        // Folding row0+row1 before penalizing would give 0 and cancel; per
        // row, the penalty must be delta^2 + delta^2 = 2*delta^2.
        let x = faer::col![0.0, delta];

        let mut pf_quad = PenaltyFunction::new(&mut base, PenaltyKind::Quadratic, 1.0);
        let mut g = Col::<f64>::zeros(2);
        let fval = pf_quad.eval(&x, Some(&mut g), None);

        assert!((fval - 2.0 * delta * delta).abs() < 1e-9, "fval = {fval}");
        assert!(g[0].abs() > 1e-9 || g[1].abs() > 1e-9);
    }
}
