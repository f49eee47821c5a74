//! Small dense linear algebra for the fitted-value regression.
//!
//! Matrices are row-major `Vec<Vec<f64>>`. Dimensions here are tiny (state
//! length + 1), so the pseudo-inverse uses a cyclic Jacobi eigen-decomposition
//! of the symmetric normal matrix rather than a general SVD.

use crate::constants::{EPSILON, PINV_RCOND};

/// Maximum Jacobi sweeps before accepting the current rotation.
const MAX_SWEEPS: usize = 100;

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `m · v`
pub fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

/// `Xᵀ X` for a design matrix with `cols` columns.
pub fn gram(x: &[Vec<f64>], cols: usize) -> Vec<Vec<f64>> {
    let mut g = vec![vec![0.0; cols]; cols];
    for row in x {
        for i in 0..cols {
            let ri = row[i];
            if ri == 0.0 {
                continue;
            }
            for j in 0..cols {
                g[i][j] += ri * row[j];
            }
        }
    }
    g
}

/// `Xᵀ y`
pub fn transpose_mul_vec(x: &[Vec<f64>], y: &[f64], cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; cols];
    for (row, &target) in x.iter().zip(y) {
        for (o, r) in out.iter_mut().zip(row) {
            *o += r * target;
        }
    }
    out
}

/// Eigen-decomposition of a symmetric matrix: `(eigenvalues, eigenvectors)`,
/// eigenvector `k` stored in column `k`.
pub fn symmetric_eigen(a: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut a: Vec<Vec<f64>> = a.to_vec();
    let mut v = identity(n);

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
    if scale < EPSILON {
        return (vec![0.0; n], v);
    }

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off.sqrt() <= EPSILON * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() <= f64::MIN_POSITIVE {
                    continue;
                }
                // Rotation angle chosen so the (p, q) entry vanishes.
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}

/// Moore-Penrose pseudo-inverse of a symmetric positive semi-definite matrix.
///
/// Eigenvalues at or below `PINV_RCOND * max|λ|` are treated as zero, so
/// rank-deficient normal matrices yield the minimum-norm solution.
pub fn pseudo_inverse_symmetric(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = a.len();
    let (eigenvalues, v) = symmetric_eigen(a);
    let max_abs = eigenvalues.iter().fold(0.0_f64, |m, l| m.max(l.abs()));
    let cutoff = PINV_RCOND * max_abs;

    let inv: Vec<f64> = eigenvalues
        .iter()
        .map(|&l| {
            if l.abs() > cutoff && l.abs() > 0.0 {
                1.0 / l
            } else {
                0.0
            }
        })
        .collect();

    let mut out = vec![vec![0.0; n]; n];
    for (i, out_row) in out.iter_mut().enumerate() {
        for (j, cell) in out_row.iter_mut().enumerate() {
            *cell = (0..n).map(|k| v[i][k] * inv[k] * v[j][k]).sum();
        }
    }
    out
}

/// Least-squares solution of `X w = y` through the normal equations.
pub fn least_squares(x: &[Vec<f64>], y: &[f64], cols: usize) -> Vec<f64> {
    let pinv = pseudo_inverse_symmetric(&gram(x, cols));
    mat_vec(&pinv, &transpose_mul_vec(x, y, cols))
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}
