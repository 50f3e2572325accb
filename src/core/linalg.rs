//! Dense vector/matrix helpers and LDLT factorization (§3).
//!
//! Sparse linear algebra is explicitly out of scope; every solver in this
//! crate works against `faer::Col<f64>`/`faer::Mat<f64>` directly. This
//! module adds the handful of norms the teacher's `linalg::vector_ops`
//! provided plus a symmetric-indefinite LDLT factorization with a
//! reciprocal-condition estimate, which the primal-dual interior-point
//! method (§4.16) and the bundle QP rely on.

use faer::{Col, Mat};
use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::LinearSolverError;

/// `xᵀy`.
pub fn dot(x: &Col<f64>, y: &Col<f64>) -> f64 {
    let mut s = 0.0;
    for i in 0..x.nrows() {
        s += x[i] * y[i];
    }
    s
}

/// `‖x‖₁`.
pub fn norm1(x: &Col<f64>) -> f64 {
    (0..x.nrows()).map(|i| x[i].abs()).sum()
}

/// `‖x‖₂`.
pub fn norm2(x: &Col<f64>) -> f64 {
    x.norm_l2()
}

/// `‖x‖∞`.
pub fn norm_inf(x: &Col<f64>) -> f64 {
    (0..x.nrows()).fold(0.0_f64, |acc, i| acc.max(x[i].abs()))
}

/// `n×n` identity.
pub fn identity(n: usize) -> Mat<f64> {
    Mat::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.0 })
}

/// `M x`.
pub fn mat_vec(m: &Mat<f64>, x: &Col<f64>) -> Col<f64> {
    let n = x.nrows();
    let mut out = Col::<f64>::zeros(n);
    for i in 0..n {
        let mut s = 0.0;
        for j in 0..n {
            s += m[(i, j)] * x[j];
        }
        out[i] = s;
    }
    out
}

/// `M += scale · u vᵀ`.
pub fn outer_add(m: &mut Mat<f64>, u: &Col<f64>, v: &Col<f64>, scale: f64) {
    let n = u.nrows();
    for i in 0..n {
        for j in 0..n {
            m[(i, j)] += scale * u[i] * v[j];
        }
    }
}

/// The standard dense BFGS update of an approximate-inverse-Hessian `H`,
/// `H ← (I − ρsyᵀ)H(I − ρysᵀ) + ρssᵀ`, `ρ = 1/(sᵀy)`. A no-op when
/// `sᵀy ≤ 0` (curvature condition fails). Shared by the dense quasi-Newton
/// solver and the gradient-sampling LBFGS preconditioner.
pub fn bfgs_rank2_update(h: &Mat<f64>, s: &Col<f64>, y: &Col<f64>) -> Mat<f64> {
    let n = s.nrows();
    let sy = dot(s, y);
    if sy.abs() <= f64::EPSILON {
        return h.clone();
    }
    let rho = 1.0 / sy;
    let hy = mat_vec(h, y);
    let yhy = dot(y, &hy);

    let mut next = h.clone();
    for i in 0..n {
        for j in 0..n {
            next[(i, j)] -= rho * (s[i] * hy[j] + hy[i] * s[j]);
        }
    }
    outer_add(&mut next, s, s, rho * rho * yhy + rho);
    next
}

/// Dense LDLT (Bunch–Kaufman-free, diagonal-pivoted) factorization of a
/// symmetric matrix `A = L D Lᵀ` with unit lower-triangular `L` and diagonal
/// `D`. Uses complete diagonal pivoting to keep the factorization stable for
/// the indefinite KKT systems produced by the interior-point method.
#[derive(Debug, Clone)]
pub struct Ldlt {
    n: usize,
    /// Packed unit-lower-triangular factor, row-major, strict lower part only.
    l: Mat<f64>,
    d: Col<f64>,
    perm: Vec<usize>,
    rcond: f64,
}

impl Ldlt {
    /// Factorizes the symmetric matrix `a` (only the lower triangle is read).
    pub fn factorize(a: &Mat<f64>) -> Result<Self, Problem> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(()).via(LinearSolverError::NotSquare);
        }

        let mut work = Mat::<f64>::zeros(n, n);
        for i in 0..n {
            for j in 0..=i {
                work[(i, j)] = a[(i, j)];
                work[(j, i)] = a[(i, j)];
            }
        }

        let mut perm: Vec<usize> = (0..n).collect();
        let mut l = Mat::<f64>::zeros(n, n);
        let mut d = Col::<f64>::zeros(n);

        let max_abs_diag = (0..n).fold(1.0_f64, |acc, i| acc.max(work[(i, i)].abs()));
        let eps_pivot = f64::EPSILON * max_abs_diag.max(1.0) * (n as f64);

        for k in 0..n {
            // complete diagonal pivot: largest remaining |diag| entry.
            let mut piv = k;
            let mut piv_val = work[(k, k)].abs();
            for i in (k + 1)..n {
                if work[(i, i)].abs() > piv_val {
                    piv = i;
                    piv_val = work[(i, i)].abs();
                }
            }
            if piv != k {
                perm.swap(k, piv);
                for j in 0..n {
                    let tmp = work[(k, j)];
                    work[(k, j)] = work[(piv, j)];
                    work[(piv, j)] = tmp;
                }
                for j in 0..n {
                    let tmp = work[(j, k)];
                    work[(j, k)] = work[(j, piv)];
                    work[(j, piv)] = tmp;
                }
                for j in 0..k {
                    let tmp = l[(k, j)];
                    l[(k, j)] = l[(piv, j)];
                    l[(piv, j)] = tmp;
                }
            }

            let dk = work[(k, k)];
            d[k] = dk;
            l[(k, k)] = 1.0;

            if dk.abs() <= eps_pivot {
                // singular direction: leave the column zeroed, continue so the
                // caller can still inspect rcond.
                continue;
            }

            for i in (k + 1)..n {
                let lik = work[(i, k)] / dk;
                l[(i, k)] = lik;
                for j in (k + 1)..=i {
                    work[(i, j)] -= lik * work[(j, k)];
                    work[(j, i)] = work[(i, j)];
                }
            }
        }

        let dmax = (0..n).fold(0.0_f64, |acc, i| acc.max(d[i].abs()));
        let dmin = (0..n).fold(f64::INFINITY, |acc, i| acc.min(d[i].abs()));
        let rcond = if dmax == 0.0 { 0.0 } else { dmin / dmax };

        Ok(Self { n, l, d, perm, rcond })
    }

    /// Reciprocal condition number estimate, `min|dᵢ| / max|dᵢ|`.
    pub fn rcond(&self) -> f64 {
        self.rcond
    }

    /// Solves `A x = b` in place using the stored factorization.
    pub fn solve(&self, b: &Col<f64>) -> Result<Col<f64>, Problem> {
        if self.rcond < 1e-12 {
            return Err(()).via(LinearSolverError::RankDeficient);
        }
        if b.nrows() != self.n {
            return Err(()).via(LinearSolverError::NotSquare);
        }

        let n = self.n;
        let mut pb = Col::<f64>::zeros(n);
        for i in 0..n {
            pb[i] = b[self.perm[i]];
        }

        // forward solve L y = Pb
        let mut y = Col::<f64>::zeros(n);
        for i in 0..n {
            let mut s = pb[i];
            for j in 0..i {
                s -= self.l[(i, j)] * y[j];
            }
            y[i] = s;
        }

        // diagonal solve D z = y
        let mut z = Col::<f64>::zeros(n);
        for i in 0..n {
            z[i] = y[i] / self.d[i];
        }

        // back solve Lᵀ w = z
        let mut w = Col::<f64>::zeros(n);
        for i in (0..n).rev() {
            let mut s = z[i];
            for j in (i + 1)..n {
                s -= self.l[(j, i)] * w[j];
            }
            w[i] = s;
        }

        let mut x = Col::<f64>::zeros(n);
        for i in 0..n {
            x[self.perm[i]] = w[i];
        }
        Ok(x)
    }
}

/// Solves `minimize_w ½wᵀQw + linearᵀw  s.t. w ≥ 0, 1ᵀw = 1` by Frank-Wolfe
/// (conditional gradient): no projection step needed, and the O(1/k) rate
/// is plenty for the small simplex QPs the bundle and gradient-sampling
/// solvers build (one variable per cut/sample).
pub fn simplex_qp(q: &Mat<f64>, linear: &[f64], iters: usize) -> Vec<f64> {
    let k = linear.len();
    if k == 0 {
        return Vec::new();
    }
    let mut w = vec![1.0 / k as f64; k];
    for t in 0..iters {
        let mut grad = vec![0.0; k];
        for i in 0..k {
            let mut s = 0.0;
            for j in 0..k {
                s += q[(i, j)] * w[j];
            }
            grad[i] = s + linear[i];
        }
        let best = (0..k).min_by(|&a, &b| grad[a].partial_cmp(&grad[b]).unwrap()).unwrap();
        let step = 2.0 / (t as f64 + 2.0);
        for i in 0..k {
            let vertex = if i == best { 1.0 } else { 0.0 };
            w[i] += step * (vertex - w[i]);
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_spd_system() {
        let n = 3;
        let mut a = Mat::<f64>::zeros(n, n);
        a[(0, 0)] = 4.0;
        a[(1, 1)] = 3.0;
        a[(2, 2)] = 2.0;
        a[(1, 0)] = 1.0;
        a[(0, 1)] = 1.0;
        a[(2, 1)] = 0.5;
        a[(1, 2)] = 0.5;

        let mut b = Col::<f64>::zeros(n);
        b[0] = 1.0;
        b[1] = 2.0;
        b[2] = 3.0;

        let ldlt = Ldlt::factorize(&a).unwrap();
        let x = ldlt.solve(&b).unwrap();

        let mut resid = Col::<f64>::zeros(n);
        for i in 0..n {
            let mut s = 0.0;
            for j in 0..n {
                s += a[(i, j)] * x[j];
            }
            resid[i] = s - b[i];
        }
        assert!(norm_inf(&resid) < 1e-9);
    }

    #[test]
    fn flags_rank_deficient_matrix() {
        let n = 2;
        let a = Mat::<f64>::zeros(n, n);
        let ldlt = Ldlt::factorize(&a).unwrap();
        let b = Col::<f64>::ones(n);
        assert!(ldlt.solve(&b).is_err());
    }
}
