use faer::Col;

use nanopt::SolverHooks;
use nanopt::core::function::{Rosenbrock, SumSquares};
use nanopt::registry;

fn main() {
    divan::main();
}

macro_rules! solver_bench {
    ($case:ident, $id:literal) => {
        #[divan::bench]
        fn $case() {
            let mut f = Rosenbrock::new(8);
            let mut solver = registry().get($id).unwrap();
            let x0 = Col::<f64>::zeros(8);
            let _ = solver.minimize(&mut f, &x0, &mut SolverHooks::noop());
        }
    };
}

solver_bench!(gd_rosenbrock, "gd");
solver_bench!(lbfgs_rosenbrock, "lbfgs");
solver_bench!(cgd_fr_rosenbrock, "cgd-fr");
solver_bench!(quasi_bfgs_rosenbrock, "quasi-bfgs");
solver_bench!(fgm_rosenbrock, "fgm");

#[divan::bench(args = [4, 16, 64])]
fn lbfgs_sum_squares(n: usize) {
    let mut f = SumSquares::new(Col::from_fn(n, |i| i as f64));
    let mut solver = registry().get("lbfgs").unwrap();
    let x0 = Col::<f64>::zeros(n);
    let _ = solver.minimize(&mut f, &x0, &mut SolverHooks::noop());
}

#[divan::bench(args = [4, 16, 64])]
fn ipm_random_bound_qp(n: usize) {
    use nanopt::core::constraint::{BoundSide, Constraint};
    use nanopt::core::function::Quadratic;
    use nanopt::core::linalg::identity;
    use nanopt::Function;

    let p = identity(n);
    let q = Col::from_fn(n, |i| (i as f64 * 0.37).sin());
    let mut f = Quadratic::new(p, q, 0.0);
    for i in 0..n {
        f.append(Constraint::Bound { i, side: BoundSide::Lower, v: -1.0 });
        f.append(Constraint::Bound { i, side: BoundSide::Upper, v: 1.0 });
    }
    let mut solver = registry().get("ipm").unwrap();
    let x0 = Col::<f64>::zeros(n);
    let _ = solver.minimize(&mut f, &x0, &mut SolverHooks::noop());
}
