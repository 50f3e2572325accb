//! Initial-step estimators (`lsearch0`, §4.6). Grounded on
//! `original_source/include/nano/lsearch0.h`.

use enum_dispatch::enum_dispatch;
use faer::Col;

use crate::core::linalg::{dot, norm2, norm_inf};

/// Everything an [`Lsearch0`] strategy needs to propose the next trial step.
pub struct Lsearch0Context<'a> {
    pub nit: usize,
    pub f_prev: f64,
    pub f_curr: f64,
    pub g: &'a Col<f64>,
    pub d: &'a Col<f64>,
    pub x: &'a Col<f64>,
    pub t_prev: f64,
}

/// Proposes the first trial step `t₀` handed to an acceptance rule.
#[enum_dispatch]
pub trait Lsearch0 {
    fn initial_step(&mut self, ctx: &Lsearch0Context) -> f64;
}

/// Always returns a configured `t₀`.
#[derive(Debug, Clone, Copy)]
pub struct ConstantStep0 {
    pub t0: f64,
}

impl Lsearch0 for ConstantStep0 {
    fn initial_step(&mut self, _ctx: &Lsearch0Context) -> f64 {
        self.t0
    }
}

/// `t₀ = 2(f_k − f_{k−1})/(gᵀd)` after the first step (clamped to
/// `[1e-10, 1e10]`); `1/‖g‖₂` at iteration 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuadraticStep0;

impl Lsearch0 for QuadraticStep0 {
    fn initial_step(&mut self, ctx: &Lsearch0Context) -> f64 {
        if ctx.nit == 0 {
            return 1.0 / norm2(ctx.g).max(f64::EPSILON);
        }
        let gd = dot(ctx.g, ctx.d);
        if gd == 0.0 {
            return ctx.t_prev;
        }
        let t = 2.0 * (ctx.f_curr - ctx.f_prev) / gd;
        t.clamp(1e-10, 1e10)
    }
}

/// CG-DESCENT ψ-rules: `ψ₀·‖x‖∞/‖g‖∞` at iteration 0; `ψ₂·t_prev` between
/// iterations; quadratic interpolation whenever admissible (the quadratic
/// model built from `(f_prev, f_curr, gᵀd)` is convex and finite).
#[derive(Debug, Clone, Copy)]
pub struct CgDescentStep0 {
    pub psi0: f64,
    pub psi1: f64,
    pub psi2: f64,
}

impl Default for CgDescentStep0 {
    fn default() -> Self {
        Self {
            psi0: 0.01,
            psi1: 0.1,
            psi2: 2.0,
        }
    }
}

impl Lsearch0 for CgDescentStep0 {
    fn initial_step(&mut self, ctx: &Lsearch0Context) -> f64 {
        if ctx.nit == 0 {
            let xn = norm_inf(ctx.x).max(f64::EPSILON);
            let gn = norm_inf(ctx.g).max(f64::EPSILON);
            return self.psi0 * xn / gn;
        }

        let gd = dot(ctx.g, ctx.d);
        if gd < 0.0 {
            let denom = ctx.f_curr - ctx.f_prev - gd * ctx.t_prev;
            if denom.abs() > f64::EPSILON {
                let t_quad = -gd * ctx.t_prev * ctx.t_prev / (2.0 * denom);
                if t_quad.is_finite() && t_quad > 0.0 {
                    return (self.psi1 * t_quad).max(1e-10);
                }
            }
        }
        self.psi2 * ctx.t_prev
    }
}

/// The closed set of built-in initial-step estimators, dispatched without
/// virtual calls.
#[enum_dispatch(Lsearch0)]
#[derive(Debug, Clone)]
pub enum Lsearch0Variant {
    ConstantStep0,
    QuadraticStep0,
    CgDescentStep0,
}

impl Default for Lsearch0Variant {
    fn default() -> Self {
        Lsearch0Variant::CgDescentStep0(CgDescentStep0::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_step_ignores_context() {
        let mut s = ConstantStep0 { t0: 0.5 };
        let x = Col::<f64>::zeros(2);
        let g = Col::<f64>::ones(2);
        let d = Col::<f64>::ones(2);
        let ctx = Lsearch0Context {
            nit: 3,
            f_prev: 1.0,
            f_curr: 0.9,
            g: &g,
            d: &d,
            x: &x,
            t_prev: 2.0,
        };
        assert_eq!(s.initial_step(&ctx), 0.5);
    }

    #[test]
    fn quadratic_step_uses_norm_at_iteration_zero() {
        let mut s = QuadraticStep0;
        let x = Col::<f64>::zeros(2);
        let mut g = Col::<f64>::zeros(2);
        g[0] = 3.0;
        g[1] = 4.0;
        let d = Col::<f64>::ones(2);
        let ctx = Lsearch0Context {
            nit: 0,
            f_prev: 0.0,
            f_curr: 0.0,
            g: &g,
            d: &d,
            x: &x,
            t_prev: 1.0,
        };
        assert!((s.initial_step(&ctx) - 0.2).abs() < 1e-12);
    }
}
