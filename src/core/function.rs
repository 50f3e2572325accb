//! Function abstraction: size, smoothness/convexity attributes, oracle, and
//! the constraint list it owns (§3, §4.2).
//!
//! Grounded on `original_source/include/nano/function.h`'s `function_t`
//! (`name()`, `size()`, `grad_accuracy()`, `is_convex()`, pure-virtual
//! `vgrad()`); the built-in test functions are grounded on
//! `original_source/src/function/program/*.cpp` and the teacher's
//! `src/tests/maros_mezaros.rs` quadratic fixtures. These exist only as
//! fixtures for the property tests of §8 and the benches — they are not part
//! of the external solver API surface.

use faer::{Col, Mat};

use crate::core::constraint::Constraint;

/// Step schedule for central-difference gradient accuracy checks (§4.2),
/// scaled per-coordinate by `max(1, |xᵢ|)`.
pub const GRAD_ACCURACY_STEPS: [f64; 9] = [
    1e-8, 2e-8, 5e-8, 7e-8, 1e-7, 2e-7, 5e-7, 7e-7, 1e-6,
];

/// A function oracle `f(x) → f, ∇f, ∇²f` plus its owned constraint list.
pub trait Function {
    /// Advisory identifier, used by the registry and test fixtures.
    fn name(&self) -> &str;

    /// Dimensionality `n ≥ 1`.
    fn size(&self) -> usize;

    /// Advisory: is this function believed to be convex.
    fn is_convex(&self) -> bool;

    /// Advisory: is this function believed to be smooth (continuously differentiable).
    fn is_smooth(&self) -> bool;

    /// Strong-convexity coefficient `μ ≥ 0`; `0` means not known to be strongly convex.
    fn strong_convexity(&self) -> f64 {
        0.0
    }

    /// Evaluates `f(x)`, filling `g` and `h` when provided. Increments
    /// `fcalls` always and `gcalls` when `g` is produced.
    fn eval(&mut self, x: &Col<f64>, g: Option<&mut Col<f64>>, h: Option<&mut Mat<f64>>) -> f64;

    fn fcalls(&self) -> usize;
    fn gcalls(&self) -> usize;

    fn constraints(&self) -> &[Constraint];
    fn constraints_mut(&mut self) -> &mut Vec<Constraint>;

    /// Appends a constraint to the owned list.
    fn append(&mut self, c: Constraint) {
        self.constraints_mut().push(c);
    }

    /// `true` iff every constraint's violation magnitude is `≤ ε`.
    fn feasible(&self, x: &Col<f64>, eps: f64) -> bool {
        self.constraints().iter().all(|c| c.violation(x) <= eps)
    }
}

/// Convenience wrapper bundling the counters every concrete [`Function`]
/// implementation needs, mirroring the teacher's `#[derive(Debug, Clone)]`
/// bookkeeping style.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub fcalls: usize,
    pub gcalls: usize,
}

/// Central-difference gradient accuracy: returns
/// `min_step (‖g − ĝ‖∞) / (1 + |f|)` over [`GRAD_ACCURACY_STEPS`].
pub fn grad_accuracy<F: Function + ?Sized>(f: &mut F, x: &Col<f64>) -> f64 {
    let n = x.nrows();
    let mut g = Col::<f64>::zeros(n);
    let fx = f.eval(x, Some(&mut g), None);

    let mut best = f64::INFINITY;
    for &h in GRAD_ACCURACY_STEPS.iter() {
        let mut ghat = Col::<f64>::zeros(n);
        for i in 0..n {
            let scale = x[i].abs().max(1.0);
            let step = h * scale;

            let mut xp = x.clone();
            xp[i] += step;
            let fp = f.eval(&xp, None, None);

            let mut xm = x.clone();
            xm[i] -= step;
            let fm = f.eval(&xm, None, None);

            ghat[i] = (fp - fm) / (2.0 * step);
        }

        let mut diff_inf = 0.0_f64;
        for i in 0..n {
            diff_inf = diff_inf.max((g[i] - ghat[i]).abs());
        }
        let score = diff_inf / (1.0 + fx.abs());
        if score < best {
            best = score;
        }
    }
    best
}

/// Convexity check along the segment `[x1, x2]`: the maximum (over `k − 1`
/// interior points) violation of the strong-convexity inequality, `0` if
/// never violated.
pub fn convex_accuracy<F: Function + ?Sized>(f: &mut F, x1: &Col<f64>, x2: &Col<f64>, k: usize) -> f64 {
    let mu = f.strong_convexity();
    let f1 = f.eval(x1, None, None);
    let f2 = f.eval(x2, None, None);

    let mut diff = Col::<f64>::zeros(x1.nrows());
    for i in 0..x1.nrows() {
        diff[i] = x1[i] - x2[i];
    }
    let dist2 = crate::core::linalg::dot(&diff, &diff);

    let mut worst = 0.0_f64;
    for j in 1..k {
        let t = j as f64 / k as f64;
        let mut xt = Col::<f64>::zeros(x1.nrows());
        for i in 0..x1.nrows() {
            xt[i] = t * x1[i] + (1.0 - t) * x2[i];
        }
        let ft = f.eval(&xt, None, None);
        let rhs = t * f1 + (1.0 - t) * f2 - t * (1.0 - t) * (mu / 2.0) * dist2;
        worst = worst.max(ft - rhs);
    }
    worst.max(0.0)
}

/// `f(x) = ½ xᵀPx + qᵀx + r`, a dense convex (if `P ⪰ 0`) quadratic.
#[derive(Debug, Clone)]
pub struct Quadratic {
    p: Mat<f64>,
    q: Col<f64>,
    r: f64,
    constraints: Vec<Constraint>,
    counters: Counters,
}

impl Quadratic {
    pub fn new(p: Mat<f64>, q: Col<f64>, r: f64) -> Self {
        Self {
            p,
            q,
            r,
            constraints: Vec::new(),
            counters: Counters::default(),
        }
    }
}

impl Function for Quadratic {
    fn name(&self) -> &str {
        "quadratic"
    }

    fn size(&self) -> usize {
        self.q.nrows()
    }

    fn is_convex(&self) -> bool {
        true
    }

    fn is_smooth(&self) -> bool {
        true
    }

    fn eval(&mut self, x: &Col<f64>, g: Option<&mut Col<f64>>, h: Option<&mut Mat<f64>>) -> f64 {
        self.counters.fcalls += 1;
        let n = self.size();
        let mut px = Col::<f64>::zeros(n);
        for i in 0..n {
            let mut s = 0.0;
            for j in 0..n {
                s += self.p[(i, j)] * x[j];
            }
            px[i] = s;
        }
        let f = 0.5 * crate::core::linalg::dot(x, &px) + crate::core::linalg::dot(&self.q, x) + self.r;

        if let Some(g) = g {
            self.counters.gcalls += 1;
            for i in 0..n {
                g[i] = px[i] + self.q[i];
            }
        }
        if let Some(h) = h {
            for i in 0..n {
                for j in 0..n {
                    h[(i, j)] = self.p[(i, j)];
                }
            }
        }
        f
    }

    fn fcalls(&self) -> usize {
        self.counters.fcalls
    }

    fn gcalls(&self) -> usize {
        self.counters.gcalls
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    fn constraints_mut(&mut self) -> &mut Vec<Constraint> {
        &mut self.constraints
    }
}

/// The classic Rosenbrock banana: smooth, non-convex, used as a
/// gradient-accuracy fixture.
#[derive(Debug, Clone)]
pub struct Rosenbrock {
    n: usize,
    constraints: Vec<Constraint>,
    counters: Counters,
}

impl Rosenbrock {
    pub fn new(n: usize) -> Self {
        assert!(n >= 2, "rosenbrock requires n >= 2");
        Self {
            n,
            constraints: Vec::new(),
            counters: Counters::default(),
        }
    }
}

impl Function for Rosenbrock {
    fn name(&self) -> &str {
        "rosenbrock"
    }

    fn size(&self) -> usize {
        self.n
    }

    fn is_convex(&self) -> bool {
        false
    }

    fn is_smooth(&self) -> bool {
        true
    }

    fn eval(&mut self, x: &Col<f64>, g: Option<&mut Col<f64>>, _h: Option<&mut Mat<f64>>) -> f64 {
        self.counters.fcalls += 1;
        let n = self.n;
        let mut f = 0.0;
        for i in 0..n - 1 {
            let a = x[i + 1] - x[i] * x[i];
            let b = 1.0 - x[i];
            f += 100.0 * a * a + b * b;
        }

        if let Some(g) = g {
            self.counters.gcalls += 1;
            for i in 0..n {
                g[i] = 0.0;
            }
            for i in 0..n - 1 {
                let a = x[i + 1] - x[i] * x[i];
                let b = 1.0 - x[i];
                g[i] += -400.0 * x[i] * a - 2.0 * b;
                g[i + 1] += 200.0 * a;
            }
        }
        f
    }

    fn fcalls(&self) -> usize {
        self.counters.fcalls
    }

    fn gcalls(&self) -> usize {
        self.counters.gcalls
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    fn constraints_mut(&mut self) -> &mut Vec<Constraint> {
        &mut self.constraints
    }
}

/// `f(x) = ½‖x − c‖²`, strongly convex with closed-form minimizer `c`. Used
/// by scenario S1 and as a quick sanity fixture elsewhere.
#[derive(Debug, Clone)]
pub struct SumSquares {
    center: Col<f64>,
    constraints: Vec<Constraint>,
    counters: Counters,
}

impl SumSquares {
    pub fn new(center: Col<f64>) -> Self {
        Self {
            center,
            constraints: Vec::new(),
            counters: Counters::default(),
        }
    }
}

impl Function for SumSquares {
    fn name(&self) -> &str {
        "sum_squares"
    }

    fn size(&self) -> usize {
        self.center.nrows()
    }

    fn is_convex(&self) -> bool {
        true
    }

    fn is_smooth(&self) -> bool {
        true
    }

    fn strong_convexity(&self) -> f64 {
        1.0
    }

    fn eval(&mut self, x: &Col<f64>, g: Option<&mut Col<f64>>, h: Option<&mut Mat<f64>>) -> f64 {
        self.counters.fcalls += 1;
        let n = self.size();
        let mut f = 0.0;
        for i in 0..n {
            let d = x[i] - self.center[i];
            f += 0.5 * d * d;
        }
        if let Some(g) = g {
            self.counters.gcalls += 1;
            for i in 0..n {
                g[i] = x[i] - self.center[i];
            }
        }
        if let Some(h) = h {
            for i in 0..n {
                for j in 0..n {
                    h[(i, j)] = if i == j { 1.0 } else { 0.0 };
                }
            }
        }
        f
    }

    fn fcalls(&self) -> usize {
        self.counters.fcalls
    }

    fn gcalls(&self) -> usize {
        self.counters.gcalls
    }

    fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    fn constraints_mut(&mut self) -> &mut Vec<Constraint> {
        &mut self.constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_squares_has_tiny_grad_accuracy() {
        let mut f = SumSquares::new(Col::<f64>::zeros(4));
        let x = faer::col![0.3, -1.2, 2.0, 0.1];
        assert!(grad_accuracy(&mut f, &x) < 1e-7);
    }

    #[test]
    fn rosenbrock_has_tiny_grad_accuracy() {
        let mut f = Rosenbrock::new(3);
        let x = faer::col![0.7, -0.3, 1.5];
        assert!(grad_accuracy(&mut f, &x) < 1e-6);
    }

    #[test]
    fn quadratic_convex_accuracy_is_near_zero() {
        let n = 2;
        let mut p = Mat::<f64>::zeros(n, n);
        p[(0, 0)] = 2.0;
        p[(1, 1)] = 2.0;
        let mut f = Quadratic::new(p, Col::<f64>::zeros(n), 0.0);
        let x1 = faer::col![1.0, 2.0];
        let x2 = faer::col![-3.0, 0.5];
        assert!(convex_accuracy(&mut f, &x1, &x2, 20) <= 1e-9);
    }
}
