//! AGS-LBFGS preconditioner (§4.14). Grounded on
//! `original_source/src/solver/gsample/preconditioner.cpp`'s naming.

use faer::{Col, Mat};

use crate::core::linalg::{bfgs_rank2_update, dot, identity};

#[derive(Debug, Clone)]
pub struct AgsLbfgsPreconditioner {
    mu: f64,
    mu_min: f64,
    mu_max: f64,
    gamma: f64,
    sigma: f64,
    pairs: Vec<(Col<f64>, Col<f64>)>,
}

impl AgsLbfgsPreconditioner {
    pub fn new() -> Self {
        Self { mu: 1.0, mu_min: 1e-2, mu_max: 1e3, gamma: 0.1, sigma: 100.0, pairs: Vec::new() }
    }

    /// Records a sample-difference pair `(d, y)` for the next rebuild,
    /// filtering out pairs that fail the acceptance test
    /// `dᵀy ≥ γ·epsilon ∧ ‖y‖² ≤ σ·epsilon`.
    pub fn record(&mut self, d: Col<f64>, y: Col<f64>, epsilon: f64) {
        let dy = dot(&d, &y);
        let yy = dot(&y, &y);
        if dy >= self.gamma * epsilon && yy <= self.sigma * epsilon {
            self.pairs.push((d, y));
        }
    }

    /// Doubles `μ` (capped at `μ_max`) after a short step, halves it
    /// (floored at `μ_min`) after a full step.
    pub fn note_step(&mut self, full_step: bool) {
        self.mu = if full_step { (self.mu * 0.5).max(self.mu_min) } else { (self.mu * 2.0).min(self.mu_max) };
    }

    /// Rebuilds `W = μ⁻¹I` then applies the stored sample-difference pairs
    /// as a sequence of BFGS-style rank-2 updates.
    pub fn build(&self, n: usize) -> Mat<f64> {
        let mut w = identity(n);
        for i in 0..n {
            w[(i, i)] = 1.0 / self.mu;
        }
        for (d, y) in &self.pairs {
            w = bfgs_rank2_update(&w, d, y);
        }
        w
    }

    pub fn clear_pairs(&mut self) {
        self.pairs.clear();
    }
}

impl Default for AgsLbfgsPreconditioner {
    fn default() -> Self {
        Self::new()
    }
}
