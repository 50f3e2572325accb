//! Property laws from spec §8, as `rstest`-parameterized integration tests,
//! the way `src/tests/maros_mezaros.rs` parameterizes over case names.

use faer::Col;
use rstest::rstest;

use nanopt::core::constraint::{full_rank_reduce, remove_zero_rows};
use nanopt::core::function::{Rosenbrock, SumSquares, convex_accuracy, grad_accuracy};
use nanopt::{Function, SolverHooks, Status, registry};

fn smooth_fixtures() -> Vec<Box<dyn Function>> {
    vec![
        Box::new(SumSquares::new(Col::from_fn(3, |i| i as f64 - 1.0))),
        Box::new(Rosenbrock::new(4)),
    ]
}

/// Law 1: for every registered smooth function and a handful of points,
/// the closed-form gradient matches a central finite difference.
#[rstest]
fn law1_gradient_matches_finite_difference(
    #[values(0.0, 0.3, -1.7, 4.2)] scale: f64,
) {
    for mut f in smooth_fixtures() {
        if !f.is_smooth() {
            continue;
        }
        let n = f.size();
        let x = Col::from_fn(n, |i| scale * (i as f64 + 1.0));
        assert!(grad_accuracy(f.as_mut(), &x) < 1e-7, "{}", f.name());
    }
}

/// Law 2: for every convex fixture, the chord lies above the (possibly
/// strongly) convex function along 20 interior points, for several pairs.
#[rstest]
fn law2_convexity_holds_along_chords(
    #[values((0.0, 1.0), (-2.0, 3.0), (5.0, -5.0))] pair: (f64, f64),
) {
    let mut f = SumSquares::new(Col::from_fn(3, |i| i as f64));
    assert!(f.is_convex());
    let n = f.size();
    let x1 = Col::from_fn(n, |i| pair.0 + i as f64);
    let x2 = Col::from_fn(n, |i| pair.1 - i as f64);
    assert!(convex_accuracy(&mut f, &x1, &x2, 20) <= 1e-10);
}

/// Law 3: whenever a solver reports `converged` on a smooth unconstrained
/// fixture with a bounded optimum, the gradient test actually holds.
#[rstest]
fn law3_converged_implies_small_gradient(
    #[values(
        "gd", "lbfgs", "quasi-bfgs", "cgd-fr", "cgd-prp", "sgm", "asgm", "pgm", "dgm", "fgm",
        "osga", "cocob"
    )]
    id: &str,
) {
    let mut f = SumSquares::new(Col::from_fn(2, |i| 1.0 + i as f64));
    let mut solver = registry().get(id).unwrap();
    let mut hooks = SolverHooks::noop();
    let x0 = Col::<f64>::zeros(2);
    let state = solver.minimize(&mut f, &x0, &mut hooks).unwrap();

    if state.status == Status::Converged {
        let mut g = Col::<f64>::zeros(2);
        let fx = f.eval(&state.x_best, Some(&mut g), None);
        let gnorm = (0..2).fold(0.0_f64, |acc, i| acc.max(g[i].abs()));
        assert!(gnorm / (1.0 + fx.abs()) < 1e-3, "{id} reported converged with ||g||inf={gnorm}");
    }
}

/// Law 4: `minimize` is deterministic given the same seed parameter.
#[rstest]
fn law4_deterministic_given_same_seed(#[values("gs", "ags-lbfgs")] id: &str) {
    let mut f1 = SumSquares::new(Col::from_fn(2, |i| i as f64));
    let mut f2 = SumSquares::new(Col::from_fn(2, |i| i as f64));
    let mut s1 = registry().get(id).unwrap();
    let mut s2 = registry().get(id).unwrap();
    let x0 = Col::<f64>::zeros(2);

    let r1 = s1.minimize(&mut f1, &x0, &mut SolverHooks::noop()).unwrap();
    let r2 = s2.minimize(&mut f2, &x0, &mut SolverHooks::noop()).unwrap();

    assert_eq!(r1.f_best, r2.f_best);
    for i in 0..2 {
        assert_eq!(r1.x_best[i], r2.x_best[i]);
    }
}

/// Law 5: `full_rank_reduce` followed by a rank check is idempotent — the
/// reduced system is already full row rank.
#[rstest]
fn law5_full_rank_reduce_is_idempotent(
    #[values(2, 3, 5)] extra_dependent_rows: usize,
) {
    let n = 3;
    let mut rows = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
    let mut rhs = vec![1.0, 2.0];
    for k in 0..extra_dependent_rows {
        let scale = (k + 2) as f64;
        rows.push(rows[0].iter().map(|v| v * scale).collect());
        rhs.push(rhs[0] * scale);
    }

    let m = rows.len();
    let mut a = faer::Mat::<f64>::zeros(m, n);
    let mut b = Col::<f64>::zeros(m);
    for (i, row) in rows.iter().enumerate() {
        for j in 0..n {
            a[(i, j)] = row[j];
        }
        b[i] = rhs[i];
    }

    let (a1, b1) = full_rank_reduce(&a, &b);
    assert_eq!(a1.nrows(), 2);

    let (a2, _b2) = full_rank_reduce(&a1, &b1);
    assert_eq!(a2.nrows(), a1.nrows());
}

/// Law 6: `remove_zero_rows` for an inequality system drops exactly the
/// zero rows and signals inconsistency iff the corresponding rhs is
/// negative (a `0 ≤ b` row with `b < 0` can never be satisfied).
#[rstest]
fn law6_remove_zero_rows_drops_exactly_the_zero_rows(
    #[values(true, false)] consistent: bool,
) {
    let n = 2;
    let mut a = faer::Mat::<f64>::zeros(3, n);
    a[(0, 0)] = 1.0;
    a[(1, 1)] = 0.0; // zero row
    a[(2, 0)] = 1.0;
    a[(2, 1)] = 1.0;

    let mut b = Col::<f64>::zeros(3);
    b[0] = 1.0;
    b[1] = if consistent { 1.0 } else { -1.0 };
    b[2] = 2.0;

    let result = remove_zero_rows(&a, &b, false);
    if consistent {
        let (a1, _b1) = result.unwrap();
        assert_eq!(a1.nrows(), 2);
    } else {
        assert!(result.is_err());
    }
}

/// Law 7: a finite interpolated step lies within `[min(tu,tv), max(tu,tv)]`
/// whenever bisection is the fallback actually used.
#[rstest]
fn law7_bisection_fallback_stays_in_the_hull(
    #[values((0.0, 2.0), (-1.0, 1.0), (3.0, 3.0))] ts: (f64, f64),
) {
    use nanopt::linesearch::{Step, bisection};

    let u = Step::new(ts.0, 1.0, -1.0);
    let v = Step::new(ts.1, 1.0, -1.0); // identical slopes: cubic/secant/quadratic all degenerate
    let t = bisection(u, v);
    assert!(t.is_finite());
    let lo = ts.0.min(ts.1);
    let hi = ts.0.max(ts.1);
    assert!(t >= lo - 1e-12 && t <= hi + 1e-12);
}
