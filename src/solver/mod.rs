//! Solver hierarchy: the `Solver` trait, solver state, termination status,
//! and the shared stopping-criteria bookkeeping every solver in this module
//! delegates to (§3, §4.7). Grounded on the teacher's `Solver`/`SolverState`/
//! `Status` in `src/lib.rs` and `original_source/include/nano/solver/status.h`
//! (`solver_status`/`solver_convergence` map directly onto [`Status`] and the
//! four termination tests below).

use std::collections::VecDeque;

use dyn_clone::DynClone;
use faer::{Col, Mat};
use problemo::Problem;

use crate::callback::Callback;
use crate::core::configurable::Configurable;
use crate::core::function::Function;
use crate::core::linalg::norm_inf;
use crate::core::registry::SolverRegistry;
use crate::linesearch::acceptance::LsearchkVariant;
use crate::linesearch::initial::Lsearch0Variant;
use crate::terminators::Terminator;

pub mod bundle;
pub mod cg;
pub(crate) mod descent;
pub mod ellipsoid;
pub mod gd;
pub mod gradient_sampling;
pub mod ipm;
pub mod lbfgs;
pub mod penalty_solvers;
pub mod quasi_newton;
pub mod universal;

/// Terminal status of a `minimize` call, matching
/// `original_source`'s `solver_status` enum plus the teacher's
/// process-control statuses (`InProgress`, `Interrupted`, `TimeLimit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    InProgress,
    /// A termination test fired and the iterate is accepted as optimal.
    Converged,
    /// `max_evals` was reached without any termination test firing.
    MaxIters,
    /// An inner step (line search, factorization, inner QP) broke down.
    Failed,
    /// The constraint system has no feasible point.
    Unfeasible,
    /// The objective is unbounded below along a feasible descent direction.
    Unbounded,
    /// The solver cannot handle the function's constraint set.
    Incompatible,
    /// A client-supplied terminator fired.
    Interrupted,
    /// A wall-clock terminator fired.
    TimeLimit,
}

/// Dual/primal residual of a constrained iterate (§4.16).
#[derive(Debug, Clone)]
pub struct Residual {
    pub dual: Col<f64>,
    pub primal: Col<f64>,
    pub central: Col<f64>,
}

impl Residual {
    pub fn dual_inf(&self) -> f64 {
        norm_inf(&self.dual)
    }

    pub fn primal_inf(&self) -> f64 {
        norm_inf(&self.primal)
    }
}

/// Current and best-so-far iterate plus algorithm-specific scratch values.
#[derive(Debug, Clone)]
pub struct SolverState {
    pub x: Col<f64>,
    pub f: f64,
    pub g: Col<f64>,
    pub h: Option<Mat<f64>>,

    pub x_best: Col<f64>,
    pub f_best: f64,
    pub g_best: Col<f64>,

    pub nit: usize,
    pub status: Status,

    /// Equality-constraint multipliers, when relevant.
    pub y: Option<Col<f64>>,
    /// Inequality-constraint multipliers, when relevant.
    pub u: Option<Col<f64>>,
    /// Interior-point barrier parameter, when relevant.
    pub mu: Option<f64>,
    pub residual: Option<Residual>,
}

impl SolverState {
    pub fn new(x: Col<f64>, f: f64, g: Col<f64>) -> Self {
        Self {
            x: x.clone(),
            f,
            g: g.clone(),
            h: None,
            x_best: x,
            f_best: f,
            g_best: g,
            nit: 0,
            status: Status::InProgress,
            y: None,
            u: None,
            mu: None,
            residual: None,
        }
    }

    /// Tracks the minimum finite `f` encountered, per spec.md's
    /// "Update-if-better tracks the minimum finite f".
    pub fn update_if_better(&mut self, x: &Col<f64>, f: f64, g: &Col<f64>) {
        if f.is_finite() && f < self.f_best {
            self.f_best = f;
            self.x_best = x.clone();
            self.g_best = g.clone();
        }
    }
}

/// Shared stopping-criteria configuration and history every line-search-style
/// solver owns (§4.7): `max_evals`, `epsilon`, `(c1, c2)` line-search
/// tolerance, the `lsearch0`/`lsearchk` identifiers, and `patience`.
#[derive(Debug, Clone)]
pub struct SolverBase {
    pub max_evals: usize,
    pub epsilon: f64,
    pub tolerance: (f64, f64),
    pub patience: usize,
    value_history: VecDeque<f64>,
    last_x_for_value_test: Option<Col<f64>>,
}

impl Default for SolverBase {
    fn default() -> Self {
        Self {
            max_evals: 10_000,
            epsilon: 1e-8,
            tolerance: (1e-4, 0.9),
            patience: 10,
            value_history: VecDeque::new(),
            last_x_for_value_test: None,
        }
    }
}

impl SolverBase {
    pub fn new(max_evals: usize, epsilon: f64, patience: usize) -> Self {
        Self {
            max_evals,
            epsilon,
            patience,
            ..Default::default()
        }
    }

    /// `‖g‖∞ / max(1, |f|) < epsilon`.
    pub fn gradient_test(&self, g: &Col<f64>, f: f64) -> bool {
        norm_inf(g) / f.abs().max(1.0) < self.epsilon
    }

    /// Best-value did not improve by more than `epsilon` across the last
    /// `patience` evaluations, *and* `x` did not move more than
    /// `epsilon * max(1, ‖x‖∞)` since the last call.
    pub fn value_test(&mut self, f_best: f64, x: &Col<f64>) -> bool {
        self.value_history.push_back(f_best);
        while self.value_history.len() > self.patience {
            self.value_history.pop_front();
        }
        let improved_enough = if self.value_history.len() < self.patience {
            true // not enough history yet: cannot claim stagnation
        } else {
            let max = self.value_history.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let min = self.value_history.iter().cloned().fold(f64::INFINITY, f64::min);
            max - min <= self.epsilon
        };

        let moved_little = match &self.last_x_for_value_test {
            None => false,
            Some(prev) => {
                let mut diff = Col::<f64>::zeros(x.nrows());
                for i in 0..x.nrows() {
                    diff[i] = x[i] - prev[i];
                }
                norm_inf(&diff) <= self.epsilon * norm_inf(x).max(1.0)
            }
        };
        self.last_x_for_value_test = Some(x.clone());

        improved_enough && moved_little
    }
}

/// Bundles the per-iteration side channels every `Solver::minimize` call
/// receives: a progress callback and a cooperative terminator.
pub struct SolverHooks {
    pub callback: Box<dyn Callback>,
    pub terminator: Box<dyn Terminator>,
}

impl SolverHooks {
    pub fn noop() -> Self {
        Self {
            callback: Box::new(crate::callback::NoOpCallback {}),
            terminator: Box::new(crate::terminators::MultipleTerminators::new(Vec::new())),
        }
    }
}

/// Common interface implemented by every concrete solver in this crate.
pub trait Solver: DynClone {
    /// Advisory identifier matching the id this solver is registered under.
    fn id(&self) -> &'static str;

    /// Runs the solver from `x0` until a termination test fires or
    /// `max_evals` is exhausted.
    fn minimize(
        &mut self,
        f: &mut dyn Function,
        x0: &Col<f64>,
        hooks: &mut SolverHooks,
    ) -> Result<SolverState, Problem>;

    /// The solver's named, domain-validated configuration.
    fn config(&self) -> &Configurable;
    fn config_mut(&mut self) -> &mut Configurable;
}

impl Clone for Box<dyn Solver> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// Registers the shared stopping-criteria parameters (§4.7) every
/// line-search-style solver exposes: `max_evals`, `epsilon`,
/// `tolerance_c1`/`tolerance_c2`, `patience`.
pub(crate) fn register_base_params(config: &mut Configurable, base: &SolverBase) -> Result<(), Problem> {
    use crate::core::parameter::{Domain, Parameter};
    config.register(Parameter::int("max_evals", base.max_evals as i64, Domain::int_range(1, 10_000_000))?)?;
    config.register(Parameter::float("epsilon", base.epsilon, Domain::positive_float(1.0))?)?;
    config.register(Parameter::float("tolerance_c1", base.tolerance.0, Domain::float_range(1e-12, 0.5))?)?;
    config.register(Parameter::float("tolerance_c2", base.tolerance.1, Domain::float_range(0.5, 1.0 - 1e-12))?)?;
    config.register(Parameter::int("patience", base.patience as i64, Domain::int_range(1, 10_000))?)?;
    Ok(())
}

/// Registers the `lsearch0`/`lsearchk` identifier enum parameters shared by
/// every line-search-based solver.
pub(crate) fn register_lsearch_params(config: &mut Configurable) -> Result<(), Problem> {
    use crate::core::parameter::Parameter;
    config.register(Parameter::enum_value(
        "lsearch0",
        "cgdescent",
        &["constant", "quadratic", "cgdescent"],
    )?)?;
    config.register(Parameter::enum_value(
        "lsearchk",
        "cgdescent",
        &["backtracking", "fletcher", "more-thuente", "lemarechal", "cgdescent"],
    )?)?;
    Ok(())
}

/// Reads `max_evals`/`epsilon`/`tolerance_c1`/`tolerance_c2`/`patience` back
/// out of `config` into `base`, so `config_mut().set(...)` on any of the
/// shared stopping-criteria parameters actually takes effect on the next
/// `minimize()` call.
pub(crate) fn sync_base_from_config(base: &mut SolverBase, config: &Configurable) {
    use crate::core::parameter::ParamValue;
    if let Some(ParamValue::Int(v)) = config.get("max_evals").ok() {
        base.max_evals = *v as usize;
    }
    if let Some(ParamValue::Float(v)) = config.get("epsilon").ok() {
        base.epsilon = *v;
    }
    if let Some(ParamValue::Float(v)) = config.get("tolerance_c1").ok() {
        base.tolerance.0 = *v;
    }
    if let Some(ParamValue::Float(v)) = config.get("tolerance_c2").ok() {
        base.tolerance.1 = *v;
    }
    if let Some(ParamValue::Int(v)) = config.get("patience").ok() {
        base.patience = *v as usize;
    }
}

/// Reads `lsearch0` back out of `config`, falling back to `default` if the
/// parameter is missing or holds an unrecognized tag (never constructed
/// through [`Parameter::enum_value`] directly).
pub(crate) fn lsearch0_from_config(config: &Configurable, default: Lsearch0Variant) -> Lsearch0Variant {
    use crate::core::parameter::ParamValue;
    use crate::linesearch::initial::{CgDescentStep0, ConstantStep0, QuadraticStep0};
    match config.get("lsearch0").ok() {
        Some(ParamValue::Enum(tag)) => match tag.as_str() {
            "constant" => Lsearch0Variant::ConstantStep0(ConstantStep0 { t0: 1.0 }),
            "quadratic" => Lsearch0Variant::QuadraticStep0(QuadraticStep0),
            "cgdescent" => Lsearch0Variant::CgDescentStep0(CgDescentStep0::default()),
            _ => default,
        },
        _ => default,
    }
}

/// Reads `lsearchk` back out of `config`, falling back to `default`.
pub(crate) fn lsearchk_from_config(config: &Configurable, default: LsearchkVariant) -> LsearchkVariant {
    use crate::core::parameter::ParamValue;
    use crate::linesearch::acceptance::{Backtracking, CgDescent, Fletcher, LeMarechal, MoreThuente};
    match config.get("lsearchk").ok() {
        Some(ParamValue::Enum(tag)) => match tag.as_str() {
            "backtracking" => LsearchkVariant::Backtracking(Backtracking::default()),
            "fletcher" => LsearchkVariant::Fletcher(Fletcher::default()),
            "more-thuente" => LsearchkVariant::MoreThuente(MoreThuente::default()),
            "lemarechal" => LsearchkVariant::LeMarechal(LeMarechal::default()),
            "cgdescent" => LsearchkVariant::CgDescent(CgDescent::default()),
            _ => default,
        },
        _ => default,
    }
}

/// Registers every builtin identifier from §6 into `r`.
pub(crate) fn register_builtins(r: &mut SolverRegistry) -> Result<(), Problem> {
    gd::register(r)?;
    cg::register(r)?;
    lbfgs::register(r)?;
    quasi_newton::register(r)?;
    ellipsoid::register(r)?;
    bundle::register(r)?;
    gradient_sampling::register(r)?;
    penalty_solvers::register(r)?;
    ipm::register(r)?;
    universal::register(r)?;
    Ok(())
}
