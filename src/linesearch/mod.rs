//! Line-search step representation and closed-form interpolants (§4.4),
//! pairing an initial-step estimator ([`initial`]) with an acceptance rule
//! ([`acceptance`]). Grounded on `original_source`'s `lsearch/strategy.h`
//! naming (`lsearch_step_t`).

pub mod acceptance;
pub mod initial;

/// `φ(t) = f(x + t·d)` sampled at one step, with its slope `φ′(t) = g(x+t·d)·d`.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub t: f64,
    pub f: f64,
    pub slope: f64,
}

impl Step {
    pub fn new(t: f64, f: f64, slope: f64) -> Self {
        Self { t, f, slope }
    }
}

/// Cubic interpolation between two steps, per §4.4.
pub fn cubic(u: Step, v: Step) -> f64 {
    let d1 = u.slope + v.slope - 3.0 * (u.f - v.f) / (u.t - v.t);
    let disc = d1 * d1 - u.slope * v.slope;
    if disc < 0.0 {
        return f64::NAN;
    }
    let d2 = (v.t - u.t).signum() * disc.sqrt();
    v.t - (v.t - u.t) * (v.slope + d2 - d1) / (v.slope - u.slope + 2.0 * d2)
}

/// Quadratic interpolation; also reports whether the quadratic model used is
/// convex (`(tu−tv)gu − (fu−fv) > 0`).
pub fn quadratic(u: Step, v: Step) -> (f64, bool) {
    let denom = u.slope - (u.f - v.f) / (u.t - v.t);
    let t = u.t - 0.5 * u.slope * (u.t - v.t) / denom;
    let convex = (u.t - v.t) * u.slope - (u.f - v.f) > 0.0;
    (t, convex)
}

/// Secant interpolation using only slopes.
pub fn secant(u: Step, v: Step) -> f64 {
    (v.t * u.slope - u.t * v.slope) / (u.slope - v.slope)
}

/// Midpoint of `[tu, tv]`.
pub fn bisection(u: Step, v: Step) -> f64 {
    0.5 * (u.t + v.t)
}

/// Selection of interpolation rule; a requested method falls back to
/// quadratic then bisection when the prior formula yields a non-finite
/// value, per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolant {
    Cubic,
    Quadratic,
    Secant,
    Bisection,
}

/// Interpolates `t★` within `[u, v]` using `method`, falling back to
/// quadratic then bisection on a non-finite result.
pub fn interpolate(method: Interpolant, u: Step, v: Step) -> f64 {
    let primary = match method {
        Interpolant::Cubic => cubic(u, v),
        Interpolant::Quadratic => quadratic(u, v).0,
        Interpolant::Secant => secant(u, v),
        Interpolant::Bisection => bisection(u, v),
    };
    if primary.is_finite() {
        return primary;
    }
    let quad = quadratic(u, v).0;
    if quad.is_finite() {
        return quad;
    }
    bisection(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bisection_is_the_midpoint() {
        let u = Step::new(0.0, 1.0, -1.0);
        let v = Step::new(2.0, 0.5, 0.2);
        assert_eq!(bisection(u, v), 1.0);
    }

    #[test]
    fn interpolate_falls_back_to_bisection_on_degenerate_input() {
        let u = Step::new(0.0, 1.0, -1.0);
        let v = Step::new(0.0, 1.0, -1.0); // tu == tv: all formulas blow up
        let t = interpolate(Interpolant::Cubic, u, v);
        assert!(t.is_finite());
    }
}
