//! Constraint system: equality, inequality, bound and functional variants,
//! and the zero-row / full-rank normalization of a stacked system (§3, §4.2).

use std::sync::Arc;

use faer::{Col, Mat};
use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::ConstraintError;

/// Which side of a scalar value a [`Constraint::Bound`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Lower,
    Upper,
}

/// The relation a [`Constraint::Functional`] enforces on its wrapped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Equality,
    Inequality,
}

/// A constraint on a function's domain.
#[derive(Clone)]
pub enum Constraint {
    /// `A x = b`.
    Equality { a: Mat<f64>, b: Col<f64> },
    /// `A x ≤ b`.
    Inequality { a: Mat<f64>, b: Col<f64> },
    /// `xᵢ ≥ v` (Lower) or `xᵢ ≤ v` (Upper).
    Bound { i: usize, side: BoundSide, v: f64 },
    /// Wraps an arbitrary scalar function with an `=0` or `≤0` relation.
    Functional {
        g: Arc<dyn Fn(&Col<f64>) -> f64 + Send + Sync>,
        relation: Relation,
    },
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Equality { a, b } => {
                f.debug_struct("Equality").field("rows", &a.nrows()).field("b", b).finish()
            }
            Constraint::Inequality { a, b } => {
                f.debug_struct("Inequality").field("rows", &a.nrows()).field("b", b).finish()
            }
            Constraint::Bound { i, side, v } => {
                f.debug_struct("Bound").field("i", i).field("side", side).field("v", v).finish()
            }
            Constraint::Functional { relation, .. } => {
                f.debug_struct("Functional").field("relation", relation).finish()
            }
        }
    }
}

impl Constraint {
    /// Nonnegative violation magnitude of this constraint at `x`.
    pub fn violation(&self, x: &Col<f64>) -> f64 {
        match self {
            Constraint::Equality { a, b } => {
                let mut worst = 0.0_f64;
                for i in 0..a.nrows() {
                    let mut row = 0.0;
                    for j in 0..a.ncols() {
                        row += a[(i, j)] * x[j];
                    }
                    worst = worst.max((row - b[i]).abs());
                }
                worst
            }
            Constraint::Inequality { a, b } => {
                let mut worst = 0.0_f64;
                for i in 0..a.nrows() {
                    let mut row = 0.0;
                    for j in 0..a.ncols() {
                        row += a[(i, j)] * x[j];
                    }
                    worst = worst.max((row - b[i]).max(0.0));
                }
                worst
            }
            Constraint::Bound { i, side, v } => match side {
                BoundSide::Lower => (v - x[*i]).max(0.0),
                BoundSide::Upper => (x[*i] - v).max(0.0),
            },
            Constraint::Functional { g, relation } => {
                let val = g(x);
                match relation {
                    Relation::Equality => val.abs(),
                    Relation::Inequality => val.max(0.0),
                }
            }
        }
    }
}

/// Removes all-zero rows of `A` (matched against `b`), flagging
/// inconsistency per spec: for equality a dropped row's `bᵢ` must be zero,
/// for inequality it must be `bᵢ ≥ 0`.
pub fn remove_zero_rows(a: &Mat<f64>, b: &Col<f64>, equality: bool) -> Result<(Mat<f64>, Col<f64>), Problem> {
    let m = a.nrows();
    let n = a.ncols();
    let mut kept = Vec::with_capacity(m);
    for i in 0..m {
        let zero_row = (0..n).all(|j| a[(i, j)] == 0.0);
        if zero_row {
            let consistent = if equality { b[i] == 0.0 } else { b[i] >= 0.0 };
            if !consistent {
                return Err(()).via(ConstraintError::Inconsistent);
            }
        } else {
            kept.push(i);
        }
    }

    let mut a2 = Mat::<f64>::zeros(kept.len(), n);
    let mut b2 = Col::<f64>::zeros(kept.len());
    for (new_i, &old_i) in kept.iter().enumerate() {
        for j in 0..n {
            a2[(new_i, j)] = a[(old_i, j)];
        }
        b2[new_i] = b[old_i];
    }
    Ok((a2, b2))
}

/// Reduces `[A | b]` to a full-row-rank system spanning the same row space,
/// via Gaussian elimination with partial pivoting on the augmented matrix.
/// Functionally equivalent to factoring `Aᵀ` with pivoted LU and keeping the
/// first `rank` rows, but avoids a second dense-LU code path.
pub fn full_rank_reduce(a: &Mat<f64>, b: &Col<f64>) -> (Mat<f64>, Col<f64>) {
    let m = a.nrows();
    let n = a.ncols();
    let mut aug = Mat::<f64>::zeros(m, n + 1);
    for i in 0..m {
        for j in 0..n {
            aug[(i, j)] = a[(i, j)];
        }
        aug[(i, n)] = b[i];
    }

    let tol = 1e-10 * (0..m).fold(1.0_f64, |acc, i| {
        acc.max((0..n).fold(0.0_f64, |a2, j| a2.max(aug[(i, j)].abs())))
    });

    let mut rank = 0;
    for col in 0..n {
        if rank >= m {
            break;
        }
        let mut piv = rank;
        let mut piv_val = aug[(rank, col)].abs();
        for i in (rank + 1)..m {
            if aug[(i, col)].abs() > piv_val {
                piv = i;
                piv_val = aug[(i, col)].abs();
            }
        }
        if piv_val <= tol {
            continue;
        }
        if piv != rank {
            for j in 0..=n {
                let tmp = aug[(rank, j)];
                aug[(rank, j)] = aug[(piv, j)];
                aug[(piv, j)] = tmp;
            }
        }
        for i in (rank + 1)..m {
            let factor = aug[(i, col)] / aug[(rank, col)];
            if factor != 0.0 {
                for j in col..=n {
                    aug[(i, j)] -= factor * aug[(rank, j)];
                }
            }
        }
        rank += 1;
    }

    let mut a2 = Mat::<f64>::zeros(rank, n);
    let mut b2 = Col::<f64>::zeros(rank);
    for i in 0..rank {
        for j in 0..n {
            a2[(i, j)] = aug[(i, j)];
        }
        b2[i] = aug[(i, n)];
    }
    (a2, b2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_exact_zero_rows() {
        let mut a = Mat::<f64>::zeros(3, 2);
        a[(0, 0)] = 1.0;
        a[(1, 1)] = 0.0; // row 1 is all zero
        a[(2, 0)] = 2.0;
        let mut b = Col::<f64>::zeros(3);
        b[1] = 0.0;
        let (a2, b2) = remove_zero_rows(&a, &b, true).unwrap();
        assert_eq!(a2.nrows(), 2);
        assert_eq!(b2.nrows(), 2);
    }

    #[test]
    fn flags_inconsistent_zero_row() {
        let a = Mat::<f64>::zeros(1, 2);
        let mut b = Col::<f64>::zeros(1);
        b[0] = 5.0;
        assert!(remove_zero_rows(&a, &b, true).is_err());
    }

    #[test]
    fn full_rank_reduce_drops_dependent_row() {
        let mut a = Mat::<f64>::zeros(2, 2);
        a[(0, 0)] = 1.0;
        a[(0, 1)] = 1.0;
        a[(1, 0)] = 2.0;
        a[(1, 1)] = 2.0; // linearly dependent on row 0
        let b = Col::<f64>::zeros(2);
        let (a2, _) = full_rank_reduce(&a, &b);
        assert_eq!(a2.nrows(), 1);
    }
}
