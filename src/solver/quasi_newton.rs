//! Quasi-Newton: dense Broyden-family updates of the inverse Hessian
//! approximation `H` (DFP, BFGS, Hoshino, Fletcher-switch) or of the direct
//! Hessian approximation `B` (SR1) (§4.8). Grounded on
//! `other_examples/...argmin-src-solver-quasinewton-dfp.rs` for idiomatic
//! trait shape; the closed-form updates themselves are textbook.

use faer::{Col, Mat};
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::function::Function;
use crate::core::linalg::{Ldlt, bfgs_rank2_update, dot, identity, mat_vec, norm2, outer_add};
use crate::core::parameter::{ParamValue, Parameter};
use crate::core::registry::SolverRegistry;
use crate::linesearch::acceptance::LsearchkVariant;
use crate::linesearch::initial::Lsearch0Variant;
use crate::solver::descent::{DescentDirection, minimize_descent};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QnVariant {
    Sr1,
    Dfp,
    Bfgs,
    Hoshino,
    FletcherSwitch,
}

impl QnVariant {
    fn from_id(id: &str) -> Option<Self> {
        Some(match id {
            "quasi-sr1" => QnVariant::Sr1,
            "quasi-dfp" => QnVariant::Dfp,
            "quasi-bfgs" => QnVariant::Bfgs,
            "quasi-hoshino" => QnVariant::Hoshino,
            "quasi-fletcher" => QnVariant::FletcherSwitch,
            _ => return None,
        })
    }

    fn id(self) -> &'static str {
        match self {
            QnVariant::Sr1 => "quasi-sr1",
            QnVariant::Dfp => "quasi-dfp",
            QnVariant::Bfgs => "quasi-bfgs",
            QnVariant::Hoshino => "quasi-hoshino",
            QnVariant::FletcherSwitch => "quasi-fletcher",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initialization {
    Identity,
    Scaled,
}

fn dfp_update(h: &Mat<f64>, s: &Col<f64>, y: &Col<f64>) -> Mat<f64> {
    let sy = dot(s, y);
    let hy = mat_vec(h, y);
    let yhy = dot(y, &hy);
    let mut next = h.clone();
    if sy.abs() > f64::EPSILON {
        outer_add(&mut next, s, s, 1.0 / sy);
    }
    if yhy.abs() > f64::EPSILON {
        outer_add(&mut next, &hy, &hy, -1.0 / yhy);
    }
    next
}

struct QnDirection {
    variant: QnVariant,
    init: Initialization,
    r_safeguard: f64,
    h: Option<Mat<f64>>,
    b: Option<Mat<f64>>,
    updates_done: usize,
}

impl QnDirection {
    fn new(variant: QnVariant, init: Initialization) -> Self {
        Self {
            variant,
            init,
            r_safeguard: 1e-8,
            h: None,
            b: None,
            updates_done: 0,
        }
    }
}

impl DescentDirection for QnDirection {
    fn next_direction(&mut self, g: &Col<f64>) -> Col<f64> {
        let n = g.nrows();
        if self.variant == QnVariant::Sr1 {
            let b = self.b.get_or_insert_with(|| identity(n));
            match Ldlt::factorize(b).and_then(|f| f.solve(g)) {
                Ok(step) => {
                    let mut d = Col::<f64>::zeros(n);
                    for i in 0..n {
                        d[i] = -step[i];
                    }
                    d
                }
                Err(_) => {
                    let mut d = Col::<f64>::zeros(n);
                    for i in 0..n {
                        d[i] = -g[i];
                    }
                    d
                }
            }
        } else {
            let h = self.h.get_or_insert_with(|| identity(n));
            let hg = mat_vec(h, g);
            let mut d = Col::<f64>::zeros(n);
            for i in 0..n {
                d[i] = -hg[i];
            }
            d
        }
    }

    fn after_step(&mut self, s: &Col<f64>, y: &Col<f64>) {
        let n = s.nrows();

        if self.variant == QnVariant::Sr1 {
            let b = self.b.get_or_insert_with(|| identity(n));
            if self.updates_done == 0 && self.init == Initialization::Scaled {
                let sy = dot(s, y);
                let yy = dot(y, y);
                if yy > f64::EPSILON {
                    let gamma = yy / sy.max(f64::EPSILON);
                    *b = identity(n);
                    for i in 0..n {
                        b[(i, i)] = gamma;
                    }
                }
            }
            let bs = mat_vec(b, s);
            let mut v = Col::<f64>::zeros(n);
            for i in 0..n {
                v[i] = y[i] - bs[i];
            }
            let denom = dot(s, &v);
            if denom.abs() >= self.r_safeguard * norm2(s) * norm2(&v) {
                outer_add(b, &v, &v, 1.0 / denom);
            }
            self.updates_done += 1;
            return;
        }

        let h = self.h.get_or_insert_with(|| identity(n));
        if self.updates_done == 0 && self.init == Initialization::Scaled {
            let sy = dot(s, y);
            let yy = dot(y, y);
            if yy > f64::EPSILON {
                let gamma = sy / yy;
                *h = identity(n);
                for i in 0..n {
                    h[(i, i)] = gamma;
                }
            }
        }

        let next = match self.variant {
            QnVariant::Dfp => dfp_update(h, s, y),
            QnVariant::Bfgs => bfgs_rank2_update(h, s, y),
            QnVariant::Hoshino => {
                let hy = mat_vec(h, y);
                let yhy = dot(y, &hy);
                let sy = dot(s, y);
                let denom = sy - yhy;
                let phi = if denom.abs() > f64::EPSILON { (sy / denom).clamp(0.0, 1.0) } else { 0.0 };
                let dfp = dfp_update(h, s, y);
                let bfgs = bfgs_rank2_update(h, s, y);
                let mut combo = Mat::<f64>::zeros(n, n);
                for i in 0..n {
                    for j in 0..n {
                        combo[(i, j)] = (1.0 - phi) * bfgs[(i, j)] + phi * dfp[(i, j)];
                    }
                }
                combo
            }
            QnVariant::FletcherSwitch => {
                let hy = mat_vec(h, y);
                let yhy = dot(y, &hy);
                let sy = dot(s, y);
                // Switches toward BFGS when the curvature condition holds
                // comfortably, toward DFP otherwise.
                if yhy <= sy { bfgs_rank2_update(h, s, y) } else { dfp_update(h, s, y) }
            }
            QnVariant::Sr1 => unreachable!(),
        };
        *h = next;
        self.updates_done += 1;
    }
}

#[derive(Debug, Clone)]
pub struct QuasiNewton {
    variant: QnVariant,
    config: Configurable,
    base: SolverBase,
    lsearch0: Lsearch0Variant,
    lsearchk: LsearchkVariant,
}

impl QuasiNewton {
    pub fn new(variant: QnVariant) -> Self {
        let base = SolverBase::default();
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("qn default params are in-domain");
        super::register_lsearch_params(&mut config).expect("qn default params are in-domain");
        config
            .register(Parameter::enum_value("initialization", "identity", &["identity", "scaled"]).unwrap())
            .expect("qn default params are in-domain");
        Self {
            variant,
            config,
            base,
            lsearch0: Lsearch0Variant::default(),
            lsearchk: LsearchkVariant::default(),
        }
    }

    fn initialization(&self) -> Initialization {
        match self.config.get("initialization").ok() {
            Some(ParamValue::Enum(v)) if v == "scaled" => Initialization::Scaled,
            _ => Initialization::Identity,
        }
    }
}

impl Solver for QuasiNewton {
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
        let init = self.initialization();
        self.lsearch0 = super::lsearch0_from_config(&self.config, self.lsearch0.clone());
        self.lsearchk = super::lsearchk_from_config(&self.config, self.lsearchk.clone());
        let mut direction = QnDirection::new(self.variant, init);
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
    for id in ["quasi-sr1", "quasi-dfp", "quasi-bfgs", "quasi-hoshino", "quasi-fletcher"] {
        let variant = QnVariant::from_id(id).unwrap();
        r.add(variant.id(), move || Box::new(QuasiNewton::new(variant)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn bfgs_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![1.0, 2.0, 3.0]);
        let mut solver = QuasiNewton::new(QnVariant::Bfgs);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-6);
    }

    #[test]
    fn sr1_converges_on_sum_squares() {
        let mut f = SumSquares::new(faer::col![0.3, -1.0, 2.5]);
        let mut solver = QuasiNewton::new(QnVariant::Sr1);
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!(state.f_best < 1e-5);
    }
}
