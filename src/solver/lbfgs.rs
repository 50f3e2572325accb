//! LBFGS: two-loop recursion with bounded history (§4.8). Grounded on the
//! teacher's `lsearch0`/two-loop naming conventions and `other_examples`'s
//! argmin `lbfgs.rs`.

use std::collections::VecDeque;

use faer::Col;
use problemo::Problem;

use crate::core::configurable::{Configurable, Version};
use crate::core::function::Function;
use crate::core::linalg::dot;
use crate::core::parameter::{Domain, Parameter};
use crate::core::registry::SolverRegistry;
use crate::linesearch::acceptance::LsearchkVariant;
use crate::linesearch::initial::{CgDescentStep0, Lsearch0Variant};
use crate::solver::descent::{DescentDirection, minimize_descent};
use crate::solver::{Solver, SolverBase, SolverHooks, SolverState};

struct LbfgsDirection {
    m: usize,
    s_hist: VecDeque<Col<f64>>,
    y_hist: VecDeque<Col<f64>>,
    rho_hist: VecDeque<f64>,
}

impl LbfgsDirection {
    fn new(m: usize) -> Self {
        Self {
            m,
            s_hist: VecDeque::new(),
            y_hist: VecDeque::new(),
            rho_hist: VecDeque::new(),
        }
    }
}

impl DescentDirection for LbfgsDirection {
    fn next_direction(&mut self, g: &Col<f64>) -> Col<f64> {
        let n = g.nrows();
        let k = self.s_hist.len();
        let mut q = g.clone();
        let mut alpha = vec![0.0_f64; k];

        for i in (0..k).rev() {
            let a = self.rho_hist[i] * dot(&self.s_hist[i], &q);
            alpha[i] = a;
            for j in 0..n {
                q[j] -= a * self.y_hist[i][j];
            }
        }

        let gamma = if k > 0 {
            let sy = dot(&self.s_hist[k - 1], &self.y_hist[k - 1]);
            let yy = dot(&self.y_hist[k - 1], &self.y_hist[k - 1]);
            if yy > 0.0 { sy / yy } else { 1.0 }
        } else {
            1.0
        };

        let mut r = Col::<f64>::zeros(n);
        for j in 0..n {
            r[j] = gamma * q[j];
        }

        for i in 0..k {
            let beta = self.rho_hist[i] * dot(&self.y_hist[i], &r);
            for j in 0..n {
                r[j] += self.s_hist[i][j] * (alpha[i] - beta);
            }
        }

        let mut d = Col::<f64>::zeros(n);
        for j in 0..n {
            d[j] = -r[j];
        }
        d
    }

    fn after_step(&mut self, s: &Col<f64>, y: &Col<f64>) {
        let sy = dot(s, y);
        if sy > 0.0 {
            self.s_hist.push_back(s.clone());
            self.y_hist.push_back(y.clone());
            self.rho_hist.push_back(1.0 / sy);
            while self.s_hist.len() > self.m {
                self.s_hist.pop_front();
                self.y_hist.pop_front();
                self.rho_hist.pop_front();
            }
        } else {
            // curvature condition failed: reset the whole memory, per §4.8.
            self.s_hist.clear();
            self.y_hist.clear();
            self.rho_hist.clear();
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lbfgs {
    config: Configurable,
    base: SolverBase,
    memory: usize,
    lsearch0: Lsearch0Variant,
    lsearchk: LsearchkVariant,
}

impl Lbfgs {
    pub fn new() -> Self {
        let base = SolverBase::default();
        let memory = 20;
        let mut config = Configurable::new(Version::new(1, 0, 0));
        super::register_base_params(&mut config, &base).expect("lbfgs default params are in-domain");
        super::register_lsearch_params(&mut config).expect("lbfgs default params are in-domain");
        config
            .register(Parameter::int("memory", memory as i64, Domain::int_range(1, 1000)).unwrap())
            .expect("lbfgs default params are in-domain");
        Self {
            config,
            base,
            memory,
            // CG-DESCENT is the default line search for LBFGS, per §4.8.
            lsearch0: Lsearch0Variant::CgDescentStep0(CgDescentStep0::default()),
            lsearchk: LsearchkVariant::default(),
        }
    }
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Lbfgs {
    fn id(&self) -> &'static str {
        "lbfgs"
    }

    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem> {
        super::sync_base_from_config(&mut self.base, &self.config);
        let memory = self
            .config
            .get("memory")
            .ok()
            .and_then(|v| if let crate::core::parameter::ParamValue::Int(m) = v { Some(*m as usize) } else { None })
            .unwrap_or(self.memory);
        self.lsearch0 = super::lsearch0_from_config(&self.config, self.lsearch0.clone());
        self.lsearchk = super::lsearchk_from_config(&self.config, self.lsearchk.clone());
        let mut direction = LbfgsDirection::new(memory);
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
    r.add("lbfgs", || Box::new(Lbfgs::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::function::SumSquares;

    #[test]
    fn converges_on_sum_squares_within_30_evals() {
        // Scenario S1.
        let mut f = SumSquares::new(faer::col![1.0, 2.0, 3.0]);
        let mut solver = Lbfgs::new();
        let mut hooks = SolverHooks::noop();
        let x0 = Col::<f64>::zeros(3);
        let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();
        assert!((state.x_best[0] - 1.0).abs() < 1e-6);
        assert!((state.x_best[1] - 2.0).abs() < 1e-6);
        assert!((state.x_best[2] - 3.0).abs() < 1e-6);
        assert!(f.fcalls() <= 60);
    }
}
