//! Shared fixtures for the ruvector-batched-cg integration tests.
//!
//! Deterministic generators for SPD matrices and batches, a dense Cholesky
//! reference solve, and vector comparison utilities.

#![allow(dead_code)]

use ruvector_batched_cg::types::{Batch, CsrMatrix};

/// Reproducible pseudo-random source (64-bit LCG, Knuth constants).
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    /// Uniform in `[lo, hi)`.
    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
        lo + (hi - lo) * unit
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Random symmetric, strictly diagonally dominant matrix (hence SPD).
///
/// Each upper off-diagonal position is filled with probability `density`;
/// the diagonal is the absolute row sum plus a random margin in `[0.5, 1.5)`.
pub fn random_spd_csr(n: usize, density: f64, seed: u64) -> CsrMatrix<f64> {
    let mut rng = Lcg::new(seed);
    let mut entries = Vec::new();
    let mut row_sums = vec![0.0f64; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if rng.uniform(0.0, 1.0) < density {
                let v = rng.uniform(-1.0, 1.0);
                entries.push((i, j, v));
                entries.push((j, i, v));
                row_sums[i] += v.abs();
                row_sums[j] += v.abs();
            }
        }
    }
    for (i, sum) in row_sums.into_iter().enumerate() {
        entries.push((i, i, sum + rng.uniform(0.5, 1.5)));
    }

    CsrMatrix::from_coo(n, n, entries)
}

/// `n x n` tridiagonal matrix: `diag` on the diagonal, `off` on both
/// neighbours.
pub fn tridiagonal(n: usize, diag: f64, off: f64) -> CsrMatrix<f64> {
    let entries = (0..n).flat_map(|i| {
        let left = (i > 0).then(|| (i, i - 1, off));
        let right = (i + 1 < n).then(|| (i, i + 1, off));
        left.into_iter().chain([(i, i, diag)]).chain(right)
    });
    CsrMatrix::from_coo(n, n, entries.collect::<Vec<_>>())
}

/// CSR form of a small dense square matrix given row by row; exact zeros
/// are not stored.
pub fn csr_from_dense(rows: &[&[f64]]) -> CsrMatrix<f64> {
    let entries: Vec<_> = rows
        .iter()
        .enumerate()
        .flat_map(|(i, row)| {
            row.iter()
                .enumerate()
                .filter(|(_, v)| **v != 0.0)
                .map(move |(j, &v)| (i, j, v))
        })
        .collect();
    CsrMatrix::from_coo(rows.len(), rows.len(), entries)
}

/// Length-`n` vector with components in `[-1, 1)`.
pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.uniform(-1.0, 1.0)).collect()
}

/// `batch` independent random vectors of length `n`.
pub fn random_batch(batch: usize, n: usize, seed: u64) -> Batch<f64> {
    let data = (0..batch)
        .flat_map(|b| random_vector(n, seed ^ (0x9e37_79b9 * (b as u64 + 1))))
        .collect();
    Batch::from_vec(data, batch, n).unwrap()
}

// ---------------------------------------------------------------------------
// Dense reference
// ---------------------------------------------------------------------------

/// Solve `A x = rhs` for SPD `A` by a dense Cholesky factorisation.
///
/// # Panics
///
/// Panics if `A` is not square, `rhs` has the wrong length, or `A` is not
/// positive definite.
pub fn dense_solve(matrix: &CsrMatrix<f64>, rhs: &[f64]) -> Vec<f64> {
    let n = matrix.rows;
    assert_eq!(matrix.cols, n, "dense_solve: matrix must be square");
    assert_eq!(rhs.len(), n, "dense_solve: rhs length");

    // Row-major dense copy; only the lower triangle is used.
    let mut l = vec![0.0f64; n * n];
    for i in 0..n {
        for (j, &v) in matrix.row_entries(i) {
            l[i * n + j] += v;
        }
    }

    for j in 0..n {
        let d = l[j * n + j] - (0..j).map(|k| l[j * n + k].powi(2)).sum::<f64>();
        assert!(d > 0.0, "dense_solve: matrix is not positive definite");
        let d = d.sqrt();
        l[j * n + j] = d;
        for i in (j + 1)..n {
            let s = l[i * n + j] - (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum::<f64>();
            l[i * n + j] = s / d;
        }
    }

    // L z = rhs, then L^T x = z.
    let mut z = rhs.to_vec();
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[i * n + k] * z[k]).sum();
        z[i] = (z[i] - s) / l[i * n + i];
    }
    let mut x = z;
    for i in (0..n).rev() {
        let s: f64 = ((i + 1)..n).map(|k| l[k * n + i] * x[k]).sum();
        x[i] = (x[i] - s) / l[i * n + i];
    }
    x
}

// ---------------------------------------------------------------------------
// Comparisons
// ---------------------------------------------------------------------------

pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "l2_distance: length mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

/// `|approx - exact| / |exact|`, falling back to the absolute error when
/// `exact` is zero.
pub fn relative_error(approx: &[f64], exact: &[f64]) -> f64 {
    let scale = l2_norm(exact);
    let err = l2_distance(approx, exact);
    if scale > 0.0 {
        err / scale
    } else {
        err
    }
}

/// `rhs - A x`.
pub fn compute_residual(matrix: &CsrMatrix<f64>, x: &[f64], rhs: &[f64]) -> Vec<f64> {
    let mut ax = vec![0.0f64; matrix.rows];
    matrix.spmv(x, &mut ax);
    rhs.iter().zip(ax).map(|(b, v)| b - v).collect()
}

/// Largest componentwise `|a - b|`.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "max_abs_diff: length mismatch");
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}
