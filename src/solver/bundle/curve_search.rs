//! Curve search (§4.11): decides descent, cutting-plane, or null steps along
//! the ray `y(t) = x_c − t·d`. The model is affine along this ray, so its
//! predicted decrease scales linearly with `t` from the nominal value at
//! `t = τ`: `δ(t) = t·(ĝᵀd)`.

use faer::Col;
use problemo::Problem;

use crate::core::error::SolverError;
use crate::core::function::Function;
use crate::core::linalg::dot;

#[derive(Debug, Clone, Copy)]
pub struct CurveSearchParams {
    pub m1: f64,
    pub m2: f64,
    pub m3: f64,
    pub frac_interp: f64,
    pub frac_extrap: f64,
    pub max_iters: usize,
}

impl Default for CurveSearchParams {
    fn default() -> Self {
        Self { m1: 0.5, m2: 0.9, m3: 1.0, frac_interp: 0.3, frac_extrap: 5.0, max_iters: 50 }
    }
}

pub enum Outcome {
    Descent { y: Col<f64>, fy: f64, gy: Col<f64> },
    CuttingPlane { y: Col<f64>, fy: f64, gy: Col<f64> },
    Null { y: Col<f64>, fy: f64, gy: Col<f64> },
}

/// Runs the bracket/interpolate curve search starting at `t0 = τ` (the
/// nominal proximal step length). Gives up as a [`Outcome::Null`] (append a
/// cut at the last trial, keep the stability center) once `max_iters` trials
/// have failed to reach a descent or cutting-plane step; only a string of
/// non-finite evaluations is treated as an outright failure.
pub fn search(
    f: &mut dyn Function,
    xc: &Col<f64>,
    fc: f64,
    gc: &Col<f64>,
    d: &Col<f64>,
    g_hat: &Col<f64>,
    t0: f64,
    params: &CurveSearchParams,
) -> Result<Outcome, Problem> {
    use problemo::ProblemResult;

    let n = xc.nrows();
    let slope = dot(g_hat, d);
    let gc_d = dot(gc, d);

    let mut t = t0.max(1e-12);
    let mut t_l = 0.0;
    let mut t_r: Option<f64> = None;
    let mut last_finite: Option<(Col<f64>, f64, Col<f64>)> = None;

    for _ in 0..params.max_iters {
        let mut y = Col::<f64>::zeros(n);
        for i in 0..n {
            y[i] = xc[i] - t * d[i];
        }
        let mut gy = Col::<f64>::zeros(n);
        let fy = f.eval(&y, Some(&mut gy), None);
        if !fy.is_finite() {
            t_r = Some(t);
            t = 0.5 * (t_l + t);
            continue;
        }

        let delta_t = t * slope.abs();
        let gy_d = dot(&gy, d);

        if fy <= fc - params.m1 * delta_t {
            if gy_d >= params.m2 * gc_d {
                return Ok(Outcome::Descent { y, fy, gy });
            }
            if fy <= fc - params.m3 * delta_t {
                return Ok(Outcome::CuttingPlane { y, fy, gy });
            }
            // descent in value but curvature not yet acceptable: tighten
            // from below and keep searching.
            t_l = t;
        } else {
            t_r = Some(t);
        }

        last_finite = Some((y, fy, gy));

        t = match t_r {
            Some(hi) => (1.0 - params.frac_interp) * t_l + params.frac_interp * hi,
            None => params.frac_extrap * t.max(t_l),
        };

        if t <= 0.0 || !t.is_finite() {
            break;
        }
    }

    match last_finite {
        Some((y, fy, gy)) => Ok(Outcome::Null { y, fy, gy }),
        None => Err(()).via(SolverError::NumericalFailure {
            reason: "curve search never produced a finite trial".into(),
        }),
    }
}
