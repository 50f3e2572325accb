//! Conjugate gradient: `d_{k+1} = −g_{k+1} + β_k d_k`, nine classical `β_k`
//! formulas (§4.8). Restart to `d = −g` whenever `β < 0`, when
//! `|gᵀg_prev| ≥ ν·‖g‖²` (default `ν = 0.1`), or when `d` fails the descent
//! test. `β_k` closed forms are the textbook Hager–Zhang survey formulas,
//! cross-checked against `other_examples`'s argmin
//! `nonlinear_cg.rs`/`hagerzhang.rs` samples for idiomatic trait shape.

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::function::Function;
use crate::core::linalg::dot;
use crate::core::registry::SolverRegistry;
use crate::linesearch::acceptance::LsearchkVariant;
use crate::linesearch::initial::Lsearch0Variant;
use crate::solver::descent::{DescentDirection, minimize_descent};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState};

/// The nine `β_k` update rules named in §4.8 / §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgVariant {
    Hs,
    Fr,
    Prp,
    Cd,
    Ls,
    Dy,
    N,
    Dycd,
    Dyhs,
}

impl CgVariant {
    fn from_id(id: &str) -> Option<Self> {
        Some(match id {
            "cgd-hs" => CgVariant::Hs,
            "cgd-fr" => CgVariant::Fr,
            "cgd-prp" => CgVariant::Prp,
            "cgd-cd" => CgVariant::Cd,
            "cgd-ls" => CgVariant::Ls,
            "cgd-dy" => CgVariant::Dy,
            "cgd-n" => CgVariant::N,
            "cgd-dycd" => CgVariant::Dycd,
            "cgd-dyhs" => CgVariant::Dyhs,
            _ => return None,
        })
    }

    fn id(self) -> &'static str {
        match self {
            CgVariant::Hs => "cgd-hs",
            CgVariant::Fr => "cgd-fr",
            CgVariant::Prp => "cgd-prp",
            CgVariant::Cd => "cgd-cd",
            CgVariant::Ls => "cgd-ls",
            CgVariant::Dy => "cgd-dy",
            CgVariant::N => "cgd-n",
            CgVariant::Dycd => "cgd-dycd",
            CgVariant::Dyhs => "cgd-dyhs",
        }
    }

    fn beta(self, g: &Col<f64>, g_prev: &Col<f64>, d_prev: &Col<f64>) -> f64 {
        let n = g.nrows();
        let mut y = Col::<f64>::zeros(n);
        for i in 0..n {
            y[i] = g[i] - g_prev[i];
        }
        let gg = dot(g, g);
        let g_prev_g_prev = dot(g_prev, g_prev);
        let dy = dot(d_prev, &y);
        let dg_prev = dot(d_prev, g_prev);

        let fr = gg / g_prev_g_prev;
        let prp = dot(g, &y) / g_prev_g_prev;
        let hs = dot(g, &y) / dy;
        let cd = -gg / dg_prev;
        let ls = -dot(g, &y) / dg_prev;
        let dy_beta = gg / dy;

        match self {
            CgVariant::Fr => fr,
            CgVariant::Prp => prp,
            CgVariant::Hs => hs,
            CgVariant::Cd => cd,
            CgVariant::Ls => ls,
            CgVariant::Dy => dy_beta,
            CgVariant::N => {
                let yy = dot(&y, &y);
                let mut w = Col::<f64>::zeros(n);
                for i in 0..n {
                    w[i] = y[i] - 2.0 * d_prev[i] * yy / dy;
                }
                dot(&w, g) / dy
            }
            CgVariant::Dycd => dy_beta.min(cd).max(0.0),
            CgVariant::Dyhs => dy_beta.min(hs).max(0.0),
        }
    }
}

struct CgDirection {
    variant: CgVariant,
    nu: f64,
    g_prev: Option<Col<f64>>,
    d_prev: Option<Col<f64>>,
}

impl CgDirection {
    fn new(variant: CgVariant) -> Self {
        Self {
            variant,
            nu: 0.1,
            g_prev: None,
            d_prev: None,
        }
    }

    fn restart(&mut self, g: &Col<f64>) -> Col<f64> {
        let mut d = Col::<f64>::zeros(g.nrows());
        for i in 0..g.nrows() {
            d[i] = -g[i];
        }
        d
    }
}

impl DescentDirection for CgDirection {
    fn next_direction(&mut self, g: &Col<f64>) -> Col<f64> {
        let d = match (&self.g_prev, &self.d_prev) {
            (Some(g_prev), Some(d_prev)) => {
                let restart_condition = dot(g, g_prev).abs() >= self.nu * dot(g, g);
                if restart_condition {
                    self.restart(g)
                } else {
                    let beta = self.variant.beta(g, g_prev, d_prev);
                    if beta < 0.0 || !beta.is_finite() {
                        self.restart(g)
                    } else {
                        let n = g.nrows();
                        let mut d = Col::<f64>::zeros(n);
                        for i in 0..n {
                            d[i] = -g[i] + beta * d_prev[i];
                        }
                        if dot(&d, g) >= 0.0 { self.restart(g) } else { d }
                    }
                }
            }
            _ => self.restart(g),
        };
        self.g_prev = Some(g.clone());
        self.d_prev = Some(d.clone());
        d
    }

    fn after_step(&mut self, _s: &Col<f64>, _y: &Col<f64>) {}
}

#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    variant: CgVariant,
    config: Configurable,
    base: SolverBase,
    lsearch0: Lsearch0Variant,
    lsearchk: LsearchkVariant,
}

impl ConjugateGradient {
    pub fn new(variant: CgVariant) -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("cg default params are in-domain");
        super::register_lsearch_params(&mut config).expect("cg default params are in-domain");
        Self {
            variant,
            config,
            base,
            lsearch0: Lsearch0Variant::default(),
            // strong Wolfe is required by §4.8; CgDescent already enforces it.
            lsearchk: LsearchkVariant::default(),
        }
    }
}

impl Solver for ConjugateGradient {
    fn id(&self) -> &'static str {
        self.variant.id()
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        self.lsearch0 = super::lsearch0_from_config(&self.config, self.lsearch0.clone());
        self.lsearchk = super::lsearchk_from_config(&self.config, self.lsearchk.clone());
        let mut direction = CgDirection::new(self.variant);
        minimize_descent(f, x0, hooks, &mut self.base, &mut self.lsearch0, &mut self.lsearchk, &mut direction)
    }

    fn config(&self) -> &Configurable {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Configurable {
        &mut self.config
    }
}

pub(crate) fn register(r: &mut SolverRegistry) -> Result<(), Problem> {
    for id in ["cgd-hs", "cgd-fr", "cgd-prp", "cgd-cd", "cgd-ls", "cgd-dy", "cgd-n", "cgd-dycd", "cgd-dyhs"] {
        let variant = CgVariant::from_id(id).unwrap();
        r.add(variant.id(), move || Box::new(ConjugateGradient::new(variant)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn fr_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 2.0, 3.0]);
        let mut solver = ConjugateGradient::new(CgVariant::Fr);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-6);
    }

    #[test]
    fn prp_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![-1.0, 0.5, 2.0]);
        let mut solver = ConjugateGradient::new(CgVariant::Prp);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-6);
    }
}
