//! Bundle core: cutting-plane model, proximity/quasi-Newton metric, curve
//! search, and the three bundle solvers built on top of them (§4.10-4.13).
//! Grounded on `original_source/include/nano/solver/proximity.h` (`miu0_min`/
//! `miu0_max` naming carried as `tau_min`/`tau0_max`) and `nesterov.h`
//! (`nesterov_sequence1_t`/`nesterov_sequence2_t` -> [`fpba::NesterovSequence1`]/
//! [`fpba::NesterovSequence2`]).

pub mod curve_search;
pub mod fpba;
pub mod pba;
pub mod proximity;
pub mod rqb;

use faer::{Col, Mat};
use problemo::Problem;

use crate::core::linalg::{dot, norm2};
use crate::core::registry::SolverRegistry;

/// A single linearization cut `ℓᵢ(x) = fᵢ + gᵢᵀ(x − xᵢ)`.
#[derive(Debug, Clone)]
pub struct Cut {
    pub g: Col<f64>,
    pub f: f64,
    pub x: Col<f64>,
}

impl Cut {
    /// `eᵢ = f_c − ℓᵢ(x_c)`, clamped to `≥ 0` to absorb roundoff.
    pub fn linearization_error(&self, xc: &Col<f64>, fc: f64) -> f64 {
        let mut dx = Col::<f64>::zeros(xc.nrows());
        for i in 0..xc.nrows() {
            dx[i] = xc[i] - self.x[i];
        }
        (fc - self.f - dot(&self.g, &dx)).max(0.0)
    }
}

/// The metric `M` used in the proximal subproblem's quadratic term. PBA and
/// FPBA use the scaled identity; RQB plugs in the SR1 approximation from
/// [`proximity::QuasiNewtonMetric`].
#[derive(Debug, Clone)]
pub enum Metric {
    Identity,
    Matrix(Mat<f64>),
}

impl Metric {
    fn apply_inv(&self, g: &Col<f64>) -> Col<f64> {
        match self {
            Metric::Identity => g.clone(),
            Metric::Matrix(m) => match crate::core::linalg::Ldlt::factorize(m).and_then(|f| f.solve(g)) {
                Ok(x) => x,
                Err(_) => g.clone(),
            },
        }
    }

    fn quadratic_form(&self, gi: &Col<f64>, gj: &Col<f64>) -> f64 {
        match self {
            Metric::Identity => dot(gi, gj),
            Metric::Matrix(_) => dot(gi, &self.apply_inv(gj)),
        }
    }
}

/// The active cutting-plane model. Holds the linearizations collected so
/// far and solves the small dual QP over the simplex of cut weights.
#[derive(Debug, Clone)]
pub struct BundleModel {
    pub cuts: Vec<Cut>,
    pub cap: usize,
}

/// Dual-QP solution: aggregate subgradient, smeared linearization error,
/// and the direction `d = M⁻¹ĝ`.
pub struct DualSolution {
    pub g_hat: Col<f64>,
    pub e_hat: f64,
    pub direction: Col<f64>,
    pub weights: Vec<f64>,
}

impl BundleModel {
    pub fn new(cap: usize) -> Self {
        Self { cuts: Vec::new(), cap }
    }

    pub fn add_cut(&mut self, g: Col<f64>, f: f64, x: Col<f64>) {
        self.cuts.push(Cut { g, f, x });
    }

    /// Drops the lowest-weight cuts once the count exceeds `cap`, always
    /// retaining the center cut (index `keep_center`, if given) and the
    /// most recent cut.
    pub fn enforce_cap(&mut self, weights: &[f64], keep_center: Option<usize>) {
        if self.cuts.len() <= self.cap {
            return;
        }
        let mut order: Vec<usize> = (0..self.cuts.len()).collect();
        order.sort_by(|&a, &b| weights[a].partial_cmp(&weights[b]).unwrap());
        let last = self.cuts.len() - 1;
        let mut drop = Vec::new();
        for &idx in &order {
            if self.cuts.len() - drop.len() <= self.cap {
                break;
            }
            if Some(idx) == keep_center || idx == last {
                continue;
            }
            drop.push(idx);
        }
        drop.sort_unstable_by(|a, b| b.cmp(a));
        for idx in drop {
            self.cuts.remove(idx);
        }
    }

    /// Solves `minimize_w (1/(2μ)) wᵀQw + eᵀw  s.t. w ≥ 0, 1ᵀw = 1` by
    /// Frank-Wolfe (conditional gradient): cheap, needs no projection, and
    /// converges at the O(1/k) rate standard for QP-over-simplex.
    pub fn solve_dual(&self, xc: &Col<f64>, fc: f64, mu: f64, metric: &Metric, iters: usize) -> DualSolution {
        let k = self.cuts.len();
        if k == 0 {
            let n = xc.nrows();
            return DualSolution { g_hat: Col::zeros(n), e_hat: 0.0, direction: Col::zeros(n), weights: Vec::new() };
        }

        let e: Vec<f64> = self.cuts.iter().map(|c| c.linearization_error(xc, fc)).collect();
        let mut q = Mat::<f64>::zeros(k, k);
        for i in 0..k {
            for j in 0..k {
                q[(i, j)] = metric.quadratic_form(&self.cuts[i].g, &self.cuts[j].g) / mu;
            }
        }
        let w = crate::core::linalg::simplex_qp(&q, &e, iters);

        let n = xc.nrows();
        let mut g_hat = Col::<f64>::zeros(n);
        let mut e_hat = 0.0;
        for i in 0..k {
            for j in 0..n {
                g_hat[j] += w[i] * self.cuts[i].g[j];
            }
            e_hat += w[i] * e[i];
        }
        let direction = metric.apply_inv(&g_hat);

        DualSolution { g_hat, e_hat, direction, weights: w }
    }
}

/// Common stopping test (§4.10): both the smeared error and the smeared
/// gradient norm must fall below `ε·√N`.
pub fn converged(e_hat: f64, g_hat: &Col<f64>, n: usize, epsilon: f64) -> bool {
    let threshold = epsilon * (n as f64).sqrt();
    e_hat < threshold && norm2(g_hat) < threshold
}

/// Solves the dual QP at `center` then runs the curve search along the
/// resulting direction. Shared by PBA, FPBA, and RQB, which differ only in
/// how they build `metric`/`tau` and how they react to the outcome.
pub(crate) fn proximal_trial(
    f: &mut dyn crate::core::function::Function,
    center: &Col<f64>,
    fc: f64,
    gc: &Col<f64>,
    model: &BundleModel,
    metric: &Metric,
    tau: f64,
    curve_params: &curve_search::CurveSearchParams,
    qp_iters: usize,
) -> Result<(curve_search::Outcome, DualSolution), Problem> {
    let mu = 1.0 / tau.max(1e-12);
    let dual = model.solve_dual(center, fc, mu, metric, qp_iters);
    let outcome = curve_search::search(f, center, fc, gc, &dual.direction, &dual.g_hat, tau, curve_params)?;
    Ok((outcome, dual))
}

pub(crate) fn register(r: &mut SolverRegistry) -> Result<(), Problem> {
    pba::register(r)?;
    fpba::register(r)?;
    rqb::register(r)?;
    Ok(())
}
