//! Proximity-parameter update (PBM-1/PBM-2, Lemarechal-Sagastizabal) and the
//! SR1 quasi-Newton metric update (§4.12).

use faer::{Col, Mat};

use crate::core::linalg::{dot, mat_vec, norm2, outer_add};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityStrategy {
    Pbm1,
    Pbm2,
}

/// Scalar proximity weight `τ` and its update history.
#[derive(Debug, Clone)]
pub struct Proximity {
    pub tau: f64,
    pub tau_min: f64,
    pub alpha: f64,
    strategy: ProximityStrategy,
    consecutive_descent: usize,
}

impl Proximity {
    pub fn new(strategy: ProximityStrategy, tau0: f64) -> Self {
        Self { tau: tau0, tau_min: 1e-5, alpha: 2.0, strategy, consecutive_descent: 0 }
    }

    /// Updates `τ` after a curve-search step of length `t` (§4.12).
    ///
    /// `fc`/`fy`/`model_fy` are the center value, the trial value, and the
    /// model's predicted value at the trial, respectively; `gi`/`gc` are the
    /// trial and center gradients when PBM-2 needs them.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        t: f64,
        fc: f64,
        fy: f64,
        model_fy: f64,
        gi: &Col<f64>,
        gc: &Col<f64>,
        y: &Col<f64>,
        xc: &Col<f64>,
        is_descent: bool,
    ) {
        let tau_scaled = t * self.tau;
        let tau_aux = match self.strategy {
            ProximityStrategy::Pbm1 => {
                let denom = fc - model_fy;
                if denom.abs() > f64::EPSILON {
                    2.0 * tau_scaled * (1.0 + (fc - fy) / denom)
                } else {
                    tau_scaled
                }
            }
            ProximityStrategy::Pbm2 => {
                let mut dg = Col::<f64>::zeros(gi.nrows());
                let mut dx = Col::<f64>::zeros(y.nrows());
                for i in 0..gi.nrows() {
                    dg[i] = gi[i] - gc[i];
                    dx[i] = y[i] - xc[i];
                }
                let denom = dot(&dg, &dg);
                if denom > f64::EPSILON {
                    tau_scaled * (1.0 + dot(&dg, &dx) / denom)
                } else {
                    tau_scaled
                }
            }
        };

        if !is_descent {
            self.consecutive_descent = 0;
            self.tau = self.tau.min(tau_aux.max(self.tau / self.alpha).max(self.tau_min));
        } else {
            self.consecutive_descent += 1;
            if self.consecutive_descent >= 5 {
                self.tau = (self.alpha * tau_aux).min(10.0 * self.tau);
            } else {
                self.tau = tau_aux.min(10.0 * self.tau);
            }
        }
        self.tau = self.tau.max(self.tau_min);
    }
}

/// SR1 quasi-Newton metric used by RQB in place of the scalar `τ`.
#[derive(Debug, Clone)]
pub struct QuasiNewtonMetric {
    pub m: Mat<f64>,
    pub r_safeguard: f64,
}

impl QuasiNewtonMetric {
    pub fn identity(n: usize) -> Self {
        Self { m: crate::core::linalg::identity(n), r_safeguard: 1e-8 }
    }

    /// `M ← M − (Me)(Me)ᵀ/(eᵀ(Me+v))`, `e = xₙ₊₁ − xₙ`, `v = gₙ₊₁ − gₙ`,
    /// skipped when `|eᵀ(Me+v)| < r·‖e‖·‖Me+v‖`.
    pub fn update_sr1(&mut self, e: &Col<f64>, v: &Col<f64>) {
        let me = mat_vec(&self.m, e);
        let mut me_plus_v = Col::<f64>::zeros(e.nrows());
        for i in 0..e.nrows() {
            me_plus_v[i] = me[i] + v[i];
        }
        let denom = dot(e, &me_plus_v);
        if denom.abs() < self.r_safeguard * norm2(e) * norm2(&me_plus_v) {
            return;
        }
        outer_add(&mut self.m, &me, &me, -1.0 / denom);
    }

    /// Identity-scaled fallback (Mifflin-Sagastizabal): take the minimum
    /// finite positive value among the four classical secant-scaling
    /// candidates.
    pub fn update_scaled(&mut self, e: &Col<f64>, v: &Col<f64>) {
        let ee = dot(e, e);
        let ev = dot(e, v);
        let vv = dot(v, v);
        let candidates = [
            if ev > 0.0 { vv / ev } else { f64::INFINITY },
            if ee > 0.0 { ev / ee } else { f64::INFINITY },
            if ee > 0.0 { vv / ee } else { f64::INFINITY },
            if vv > 0.0 { ev / vv } else { f64::INFINITY },
        ];
        let mu = candidates.into_iter().filter(|m| m.is_finite() && *m > 0.0).fold(f64::INFINITY, f64::min);
        if mu.is_finite() {
            let n = self.m.nrows();
            for i in 0..n {
                self.m[(i, i)] = mu;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sr1_metric_update_preserves_symmetry_on_a_simple_pair() {
        let mut metric = QuasiNewtonMetric::identity(2);
        let e = faer::col![1.0, 0.5];
        let v = faer::col![0.8, 0.3];
        metric.update_sr1(&e, &v);
        assert!((metric.m[(0, 1)] - metric.m[(1, 0)]).abs() < 1e-9);
    }
}
