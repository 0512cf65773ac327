//! Dense linear algebra helpers.
//!
//! `nalgebra` only exposes the thin QR factorization, so the full
//! factorization needed to split an orthonormal basis into range and
//! null-space blocks (Nocedal & Wright, ch. 15.2) lives here.

use nalgebra::{DMatrix, DVector};

const PIVOT_TOL: f64 = 1e-12;

/// Full Householder QR factorization `A = Q R` with square `Q` (m×m)
/// and `R` (m×n) upper triangular; requires m ≥ n.
pub fn full_qr(a: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let (m, n) = a.shape();
    let mut r = a.clone();
    let mut q = DMatrix::<f64>::identity(m, m);
    for k in 0..n.min(m) {
        let tail = m - k;
        let mut v = DVector::<f64>::zeros(tail);
        for i in 0..tail {
            v[i] = r[(k + i, k)];
        }
        let norm = v.norm();
        if norm <= PIVOT_TOL {
            continue;
        }
        let alpha = -v[0].signum() * norm;
        v[0] -= alpha;
        let vnorm = v.norm();
        if vnorm <= PIVOT_TOL {
            continue;
        }
        v /= vnorm;
        // R <- H R on the trailing block
        for j in k..n {
            let mut w = 0.0;
            for i in 0..tail {
                w += v[i] * r[(k + i, j)];
            }
            for i in 0..tail {
                r[(k + i, j)] -= 2.0 * w * v[i];
            }
        }
        // Q <- Q H
        for row in 0..m {
            let mut w = 0.0;
            for i in 0..tail {
                w += q[(row, k + i)] * v[i];
            }
            for i in 0..tail {
                q[(row, k + i)] -= 2.0 * w * v[i];
            }
        }
    }
    (q, r)
}

/// Split the full QR of `Aᵀ` (n_vars × n_cons) into the range basis `Y`
/// (first n_cons columns of Q) and the null-space basis `Z` (remaining
/// columns), satisfying `A Z = 0`.
pub fn constraint_basis(a_transpose: &DMatrix<f64>) -> (DMatrix<f64>, DMatrix<f64>) {
    let (nvars, ncons) = a_transpose.shape();
    let (q, _) = full_qr(a_transpose);
    let y = q.columns(0, ncons).into_owned();
    let z = q.columns(ncons, nvars - ncons).into_owned();
    (y, z)
}

/// Unit normal of the hyperplane through `d` points in `R^d`: the last
/// column of the full Q of the edge-matrix transpose. `None` when the
/// points are affinely dependent.
pub fn hyperplane_normal(simplex: &[DVector<f64>]) -> Option<DVector<f64>> {
    let d = simplex.len();
    debug_assert!(simplex.iter().all(|p| p.len() == d));
    if d < 2 {
        return None;
    }
    let mut edges = DMatrix::<f64>::zeros(d, d - 1);
    for (j, point) in simplex.iter().skip(1).enumerate() {
        let edge = point - &simplex[0];
        edges.set_column(j, &edge);
    }
    let (q, r) = full_qr(&edges);
    // A rank-deficient edge matrix has no well-defined normal.
    for k in 0..d - 1 {
        if r[(k, k)].abs() <= PIVOT_TOL {
            return None;
        }
    }
    Some(q.column(d - 1).into_owned())
}
