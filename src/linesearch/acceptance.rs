//! Line-search acceptance rules (`lsearchk`, §4.5). Grounded on
//! `original_source/include/nano/lsearchk.h` and
//! `original_source/include/nano/lsearchk/cgdescent.h` (bracket/zoom
//! structure, `interval_t` naming carried into [`CgDescentInterval`]).

use enum_dispatch::enum_dispatch;
use faer::Col;
use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::LineSearchError;
use crate::core::function::Function;
use crate::core::linalg::dot;
use crate::linesearch::{Interpolant, Step, interpolate};

/// Lower/upper admissible step bound, `[10ε, 1/(10ε)]`.
fn step_bounds() -> (f64, f64) {
    let eps = f64::EPSILON;
    (10.0 * eps, 1.0 / (10.0 * eps))
}

/// Evaluates `φ(t) = f(x + t·d)` and its slope `φ′(t) = ∇f(x+t·d)ᵀd`.
pub struct LineFn<'a> {
    pub f: &'a mut dyn Function,
    pub x: &'a Col<f64>,
    pub d: &'a Col<f64>,
}

impl<'a> LineFn<'a> {
    pub fn eval(&mut self, t: f64) -> Step {
        let n = self.x.nrows();
        let mut xt = Col::<f64>::zeros(n);
        for i in 0..n {
            xt[i] = self.x[i] + t * self.d[i];
        }
        let mut g = Col::<f64>::zeros(n);
        let f = self.f.eval(&xt, Some(&mut g), None);
        let slope = dot(&g, self.d);
        Step::new(t, f, slope)
    }
}

/// Runs the line-search loop from `t0`, returning the accepted step.
#[enum_dispatch]
pub trait Lsearchk {
    fn search(&mut self, line: &mut LineFn, phi0: Step, t0: f64, c1: f64, c2: f64) -> Result<Step, Problem>;
}

fn armijo_ok(phi0: Step, t: Step, c1: f64) -> bool {
    t.f <= phi0.f + c1 * t.t * phi0.slope
}

fn wolfe_ok(phi0: Step, t: Step, c2: f64) -> bool {
    t.slope >= c2 * phi0.slope
}

fn strong_wolfe_ok(phi0: Step, t: Step, c2: f64) -> bool {
    t.slope.abs() <= c2 * phi0.slope.abs()
}

/// Starts from `t0`; while Armijo fails, interpolates a new trial using
/// cubic interpolation between the prior and current step.
#[derive(Debug, Clone, Copy, Default)]
pub struct Backtracking {
    pub max_iters: usize,
}

impl Lsearchk for Backtracking {
    fn search(&mut self, line: &mut LineFn, phi0: Step, t0: f64, c1: f64, _c2: f64) -> Result<Step, Problem> {
        if phi0.slope >= 0.0 {
            return Err(()).via(LineSearchError::NotADescentDirection);
        }
        let (t_min, t_max) = step_bounds();
        let max_iters = if self.max_iters == 0 { 50 } else { self.max_iters };

        let mut prev = Step::new(0.0, phi0.f, phi0.slope);
        let mut t = t0.clamp(t_min, t_max);

        for _ in 0..max_iters {
            let cur = line.eval(t);
            if !cur.f.is_finite() {
                return Err(()).via(LineSearchError::NonFiniteValue);
            }
            if armijo_ok(phi0, cur, c1) {
                return Ok(cur);
            }
            let t_next = interpolate(Interpolant::Cubic, prev, cur).clamp(0.1 * t, 0.9 * t);
            prev = cur;
            t = t_next;
            if t < t_min {
                return Err(()).via(LineSearchError::StepTooSmall);
            }
        }
        Err(()).via(LineSearchError::MaxIterationsExceeded)
    }
}

/// Bracket-then-zoom strong-Wolfe search shared by [`Fletcher`] and
/// [`MoreThuente`]; `wolfe_strict` selects strong-Wolfe (both) vs. regular
/// Wolfe (used by [`LeMarechal`]).
fn bracket_and_zoom(
    line: &mut LineFn,
    phi0: Step,
    t0: f64,
    c1: f64,
    c2: f64,
    tau1: f64,
    strict: bool,
    max_iters: usize,
) -> Result<Step, Problem> {
    if phi0.slope >= 0.0 {
        return Err(()).via(LineSearchError::NotADescentDirection);
    }
    let (t_min, t_max) = step_bounds();

    let mut lo = Step::new(0.0, phi0.f, phi0.slope);
    let mut t = t0.clamp(t_min, t_max);
    let mut prev = lo;

    for _ in 0..max_iters {
        let cur = line.eval(t);
        if !cur.f.is_finite() {
            return Err(()).via(LineSearchError::NonFiniteValue);
        }

        if !armijo_ok(phi0, cur, c1) || (cur.f >= prev.f && prev.t > 0.0) {
            return zoom(line, phi0, prev, cur, c1, c2, strict, max_iters);
        }

        let accepted = if strict {
            strong_wolfe_ok(phi0, cur, c2)
        } else {
            wolfe_ok(phi0, cur, c2)
        };
        if armijo_ok(phi0, cur, c1) && accepted {
            return Ok(cur);
        }

        if cur.slope >= 0.0 {
            return zoom(line, phi0, cur, prev, c1, c2, strict, max_iters);
        }

        prev = cur;
        t = (tau1 * t).min(t_max);
        if t < t_min {
            return Err(()).via(LineSearchError::StepTooSmall);
        }
    }
    Err(()).via(LineSearchError::MaxIterationsExceeded)
}

fn zoom(
    line: &mut LineFn,
    phi0: Step,
    mut lo: Step,
    mut hi: Step,
    c1: f64,
    c2: f64,
    strict: bool,
    max_iters: usize,
) -> Result<Step, Problem> {
    for _ in 0..max_iters {
        let t = interpolate(Interpolant::Cubic, lo, hi).clamp(lo.t.min(hi.t) * 1.01 + 1e-12, lo.t.max(hi.t));
        let cur = line.eval(t);
        if !cur.f.is_finite() {
            return Err(()).via(LineSearchError::NonFiniteValue);
        }

        if !armijo_ok(phi0, cur, c1) || cur.f >= lo.f {
            hi = cur;
            continue;
        }

        let accepted = if strict {
            strong_wolfe_ok(phi0, cur, c2)
        } else {
            wolfe_ok(phi0, cur, c2)
        };
        if accepted {
            return Ok(cur);
        }

        if cur.slope * (hi.t - lo.t) >= 0.0 {
            hi = lo;
        }
        lo = cur;
    }
    Err(()).via(LineSearchError::MaxIterationsExceeded)
}

/// Strong-Wolfe bracket-then-zoom, `τ₁ ∈ (1,∞)` growth during the bracket
/// phase.
#[derive(Debug, Clone, Copy)]
pub struct Fletcher {
    pub tau1: f64,
    pub max_iters: usize,
}

impl Default for Fletcher {
    fn default() -> Self {
        Self { tau1: 3.0, max_iters: 50 }
    }
}

impl Lsearchk for Fletcher {
    fn search(&mut self, line: &mut LineFn, phi0: Step, t0: f64, c1: f64, c2: f64) -> Result<Step, Problem> {
        bracket_and_zoom(line, phi0, t0, c1, c2, self.tau1, true, self.max_iters)
    }
}

/// Safeguarded cubic interpolation enforcing strong Wolfe in a shrinking
/// interval; shares the bracket/zoom core with [`Fletcher`].
#[derive(Debug, Clone, Copy)]
pub struct MoreThuente {
    pub tau1: f64,
    pub max_iters: usize,
}

impl Default for MoreThuente {
    fn default() -> Self {
        Self { tau1: 2.0, max_iters: 50 }
    }
}

impl Lsearchk for MoreThuente {
    fn search(&mut self, line: &mut LineFn, phi0: Step, t0: f64, c1: f64, c2: f64) -> Result<Step, Problem> {
        bracket_and_zoom(line, phi0, t0, c1, c2, self.tau1, true, self.max_iters)
    }
}

/// Bracket with function-value monotonicity, then zoom for regular Wolfe.
#[derive(Debug, Clone, Copy)]
pub struct LeMarechal {
    pub tau1: f64,
    pub max_iters: usize,
}

impl Default for LeMarechal {
    fn default() -> Self {
        Self { tau1: 3.0, max_iters: 50 }
    }
}

impl Lsearchk for LeMarechal {
    fn search(&mut self, line: &mut LineFn, phi0: Step, t0: f64, c1: f64, c2: f64) -> Result<Step, Problem> {
        bracket_and_zoom(line, phi0, t0, c1, c2, self.tau1, false, self.max_iters)
    }
}

/// CG-DESCENT interval `[a, b]` maintained with bisection parameter `θ` and
/// shrink/expand factors `γ`/`ρ`, named after
/// `original_source/include/nano/lsearchk/cgdescent.h`'s `interval_t`.
#[derive(Debug, Clone, Copy)]
pub struct CgDescentInterval {
    pub theta: f64,
    pub gamma: f64,
    pub rho: f64,
    pub epsilon: f64,
    pub max_iters: usize,
}

impl Default for CgDescentInterval {
    fn default() -> Self {
        Self {
            theta: 0.5,
            gamma: 0.66,
            rho: 5.0,
            epsilon: 1e-6,
            max_iters: 50,
        }
    }
}

/// CG-DESCENT: accepts the original Wolfe conditions OR the approximate
/// Wolfe conditions `(2c₁−1)φ′(0) ≥ φ′(t) ≥ c₂φ′(0)` with `φ(t) ≤ φ(0) + εₖ`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CgDescent {
    pub interval: CgDescentInterval,
}

impl CgDescent {
    fn accept(&self, phi0: Step, t: Step, c1: f64, c2: f64, eps_k: f64) -> bool {
        let wolfe = armijo_ok(phi0, t, c1) && wolfe_ok(phi0, t, c2);
        let approx_wolfe =
            (2.0 * c1 - 1.0) * phi0.slope >= t.slope && t.slope >= c2 * phi0.slope && t.f <= phi0.f + eps_k;
        wolfe || approx_wolfe
    }
}

impl Lsearchk for CgDescent {
    fn search(&mut self, line: &mut LineFn, phi0: Step, t0: f64, c1: f64, c2: f64) -> Result<Step, Problem> {
        if phi0.slope >= 0.0 {
            return Err(()).via(LineSearchError::NotADescentDirection);
        }
        let (t_min, t_max) = step_bounds();
        let eps_k = self.interval.epsilon * phi0.f.abs().max(1.0);

        let mut a = Step::new(0.0, phi0.f, phi0.slope);
        let mut b = line.eval(t0.clamp(t_min, t_max));

        // bracket: expand b until it overshoots or slope turns nonnegative.
        let mut t = b.t;
        for _ in 0..self.interval.max_iters {
            if !b.f.is_finite() {
                return Err(()).via(LineSearchError::NonFiniteValue);
            }
            if self.accept(phi0, b, c1, c2, eps_k) {
                return Ok(b);
            }
            if b.slope >= 0.0 || b.f > phi0.f + eps_k {
                break;
            }
            t = (self.interval.rho * t).min(t_max);
            a = b;
            b = line.eval(t);
        }

        // secant/bisection zoom within [a, b].
        for _ in 0..self.interval.max_iters {
            let t_mid = if a.t < b.t {
                self.interval.theta * a.t + (1.0 - self.interval.theta) * b.t
            } else {
                self.interval.theta * b.t + (1.0 - self.interval.theta) * a.t
            };
            let cur = line.eval(t_mid);
            if !cur.f.is_finite() {
                return Err(()).via(LineSearchError::NonFiniteValue);
            }
            if self.accept(phi0, cur, c1, c2, eps_k) {
                return Ok(cur);
            }
            if cur.slope >= 0.0 {
                b = cur;
            } else if cur.f <= phi0.f + eps_k {
                a = cur;
            } else {
                b = cur;
            }
            if (a.t - b.t).abs() < t_min {
                return Err(()).via(LineSearchError::StepTooSmall);
            }
        }
        Err(()).via(LineSearchError::MaxIterationsExceeded)
    }
}

/// The closed set of built-in acceptance rules, dispatched without virtual
/// calls.
#[enum_dispatch(Lsearchk)]
#[derive(Debug, Clone)]
pub enum LsearchkVariant {
    Backtracking,
    Fletcher,
    MoreThuente,
    LeMarechal,
    CgDescent,
}

impl Default for LsearchkVariant {
    fn default() -> Self {
        LsearchkVariant::CgDescent(CgDescent::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn backtracking_accepts_on_a_quadratic() {
        let mut f = SumSquares::new(Col::<f64>::zeros(2));
        let x = faer::col![1.0, 1.0];
        let mut g = Col::<f64>::zeros(2);
        let f0 = f.eval(&x, Some(&mut g), None);
        let d = faer::col![-g[0], -g[1]];
        let phi0 = Step::new(0.0, f0, dot(&g, &d));

        let mut line = LineFn { f: &mut f, x: &x, d: &d };
        let mut ls = Backtracking { max_iters: 50 };
        let step = ls.search(&mut line, phi0, 1.0, 1e-4, 0.9).unwrap();
        assert!(step.f <= f0);
    }

    #[test]
    fn cg_descent_accepts_on_a_quadratic() {
        let mut f = SumSquares::new(Col::<f64>::zeros(2));
        let x = faer::col![1.0, 1.0];
        let mut g = Col::<f64>::zeros(2);
        let f0 = f.eval(&x, Some(&mut g), None);
        let d = faer::col![-g[0], -g[1]];
        let phi0 = Step::new(0.0, f0, dot(&g, &d));

        let mut line = LineFn { f: &mut f, x: &x, d: &d };
        let mut ls = CgDescent::default();
        let step = ls.search(&mut line, phi0, 1.0, 1e-4, 0.1).unwrap();
        assert!(step.f <= f0);
    }
}
