//! Program utilities (L4): bookkeeping helpers for assembling a linear or
//! quadratic program out of separately-built constraint blocks, stacking them
//! into the single `Ax{=,≤}b` matrices the solvers expect and row-reducing
//! the result. Grounded on `core::constraint`'s `remove_zero_rows`/
//! `full_rank_reduce` (this module is the thing that calls them) and on the
//! teacher's `lp::Program`/`qp::Program` builder pattern in
//! `examples/amadavan-copters/src/lp/mod.rs`.

use faer::{Col, Mat};
use problemo::Problem;

use crate::core::constraint::{self, Constraint};
use crate::core::function::{Function, Quadratic};

/// Accumulates equality-constraint blocks (`Aᵢx = bᵢ`) before they are
/// stacked into one matrix. Each call to [`ConstraintStack::push`] appends
/// rows; [`ConstraintStack::build`] concatenates them and, optionally,
/// row-reduces the result to full rank.
#[derive(Debug, Clone, Default)]
pub struct ConstraintStack {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    ncols: Option<usize>,
}

impl ConstraintStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the rows of `(a, b)`. Panics if `a`'s column count disagrees
    /// with a previously pushed block — every block in a stack must describe
    /// the same variables.
    pub fn push(&mut self, a: &Mat<f64>, b: &Col<f64>) {
        let n = a.ncols();
        match self.ncols {
            None => self.ncols = Some(n),
            Some(existing) => assert_eq!(existing, n, "constraint stack column mismatch"),
        }
        for i in 0..a.nrows() {
            self.rows.push((0..n).map(|j| a[(i, j)]).collect());
            self.rhs.push(b[i]);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Concatenates the pushed blocks into `(A, b)`.
    pub fn stack(&self) -> (Mat<f64>, Col<f64>) {
        let n = self.ncols.unwrap_or(0);
        let m = self.rows.len();
        let mut a = Mat::<f64>::zeros(m, n);
        let mut b = Col::<f64>::zeros(m);
        for (i, row) in self.rows.iter().enumerate() {
            for j in 0..n {
                a[(i, j)] = row[j];
            }
            b[i] = self.rhs[i];
        }
        (a, b)
    }

    /// Stacks the pushed blocks, drops rows that are identically zero
    /// (checking consistency) and reduces the remainder to full row rank.
    pub fn build_reduced(&self, equality: bool) -> Result<(Mat<f64>, Col<f64>), Problem> {
        let (a, b) = self.stack();
        let (a, b) = constraint::remove_zero_rows(&a, &b, equality)?;
        Ok(constraint::full_rank_reduce(&a, &b))
    }
}

/// Linear program `min cᵀx s.t. Ax=b, Gx≤h`, represented as the degenerate
/// [`Quadratic`] fixture with `P=0`. A thin bookkeeping layer: stacks
/// separately-collected equality/inequality blocks and hands the assembled
/// function straight to any unconstrained-objective-compatible solver in
/// [`crate::solver`] (the primal-dual interior-point method is the intended
/// consumer, since it is the only solver that reads `Ax=b`/`Gx≤h` directly).
#[derive(Debug, Clone)]
pub struct LinearProgram {
    pub c: Col<f64>,
    equalities: ConstraintStack,
    inequalities: ConstraintStack,
}

impl LinearProgram {
    pub fn new(c: Col<f64>) -> Self {
        Self { c, equalities: ConstraintStack::new(), inequalities: ConstraintStack::new() }
    }

    pub fn add_equality(&mut self, a: &Mat<f64>, b: &Col<f64>) {
        self.equalities.push(a, b);
    }

    pub fn add_inequality(&mut self, a: &Mat<f64>, b: &Col<f64>) {
        self.inequalities.push(a, b);
    }

    /// Builds the [`Quadratic`] fixture (`P=0`, `q=c`) with the stacked,
    /// row-reduced equality block and the stacked (unreduced — inequalities
    /// need not be full rank) inequality block appended as constraints.
    pub fn build(&self) -> Result<Quadratic, Problem> {
        let n = self.c.nrows();
        let p = Mat::<f64>::zeros(n, n);
        let mut f = Quadratic::new(p, self.c.clone(), 0.0);

        if !self.equalities.is_empty() {
            let (a, b) = self.equalities.build_reduced(true)?;
            if a.nrows() > 0 {
                f.append(Constraint::Equality { a, b });
            }
        }
        if !self.inequalities.is_empty() {
            let (a, b) = self.inequalities.stack();
            f.append(Constraint::Inequality { a, b });
        }
        Ok(f)
    }
}

/// Quadratic program `min ½xᵀQx+cᵀx s.t. Ax=b, Gx≤h`. Same stacking
/// bookkeeping as [`LinearProgram`], with a caller-supplied `Q`.
#[derive(Debug, Clone)]
pub struct QuadraticProgram {
    pub q: Mat<f64>,
    pub c: Col<f64>,
    equalities: ConstraintStack,
    inequalities: ConstraintStack,
}

impl QuadraticProgram {
    pub fn new(q: Mat<f64>, c: Col<f64>) -> Self {
        Self { q, c, equalities: ConstraintStack::new(), inequalities: ConstraintStack::new() }
    }

    pub fn add_equality(&mut self, a: &Mat<f64>, b: &Col<f64>) {
        self.equalities.push(a, b);
    }

    pub fn add_inequality(&mut self, a: &Mat<f64>, b: &Col<f64>) {
        self.inequalities.push(a, b);
    }

    pub fn build(&self) -> Result<Quadratic, Problem> {
        let mut f = Quadratic::new(self.q.clone(), self.c.clone(), 0.0);

        if !self.equalities.is_empty() {
            let (a, b) = self.equalities.build_reduced(true)?;
            if a.nrows() > 0 {
                f.append(Constraint::Equality { a, b });
            }
        }
        if !self.inequalities.is_empty() {
            let (a, b) = self.inequalities.stack();
            f.append(Constraint::Inequality { a, b });
        }
        Ok(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stacks_and_reduces_equality_blocks() {
        let mut stack = ConstraintStack::new();
        let a1 = Mat::<f64>::from_fn(1, 2, |_, j| if j == 0 { 1.0 } else { 1.0 });
        let b1 = faer::col![1.0];
        let a2 = Mat::<f64>::from_fn(1, 2, |_, j| if j == 0 { 2.0 } else { 2.0 });
        let b2 = faer::col![2.0]; // linearly dependent on the first row
        stack.push(&a1, &b1);
        stack.push(&a2, &b2);

        let (a, _b) = stack.build_reduced(true).unwrap();
        assert_eq!(a.nrows(), 1);
    }

    #[test]
    fn linear_program_builds_a_quadratic_fixture_with_zero_hessian() {
        let c = faer::col![-1.0, -1.0];
        let mut lp = LinearProgram::new(c);
        let a = Mat::<f64>::from_fn(1, 2, |_, _| 1.0);
        let b = faer::col![1.0];
        lp.add_equality(&a, &b);

        let f = lp.build().unwrap();
        assert_eq!(f.constraints().len(), 1);
    }
}
