//! Sparse × dense matrix products.
//!
//! Standalone companions of the solver: `A B` and `A^T B` for a CSR matrix
//! `A` and a row-major dense `B`. The CG loop does not use them.

use tracing::debug;

use crate::element::Element;
use crate::error::{SolverError, ValidationError};
use crate::types::{CsrMatrix, DenseMatrix};
use crate::validation::validate_csr_matrix;

/// `C = A B` with `A` of shape `rows x cols` and `B` of shape `cols x k`.
///
/// # Errors
///
/// [`SolverError::InvalidInput`] if `A` is malformed or `B.rows != A.cols`.
pub fn spmm<T: Element>(a: &CsrMatrix<T>, b: &DenseMatrix<T>) -> Result<DenseMatrix<T>, SolverError> {
    validate_csr_matrix(a)?;
    if b.rows != a.cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "spmm: A is {}x{} but B has {} rows",
            a.rows, a.cols, b.rows,
        ))
        .into());
    }
    debug!(rows = a.rows, cols = a.cols, k = b.cols, nnz = a.nnz(), "spmm");

    let k = b.cols;
    let mut c = DenseMatrix::zeros(a.rows, k);
    if k == 0 {
        return Ok(c);
    }

    for (i, out) in c.data.chunks_mut(k).enumerate() {
        for (j, &v) in a.row_entries(i) {
            T::axpy(v, b.row(j), out);
        }
    }
    Ok(c)
}

/// `C = A^T B` with `A` of shape `rows x cols` and `B` of shape `rows x k`.
///
/// Scatters each row of `A` instead of materialising the transpose.
///
/// # Errors
///
/// [`SolverError::InvalidInput`] if `A` is malformed or `B.rows != A.rows`.
pub fn spmm_transpose<T: Element>(
    a: &CsrMatrix<T>,
    b: &DenseMatrix<T>,
) -> Result<DenseMatrix<T>, SolverError> {
    validate_csr_matrix(a)?;
    if b.rows != a.rows {
        return Err(ValidationError::DimensionMismatch(format!(
            "spmm_transpose: A is {}x{} but B has {} rows",
            a.rows, a.cols, b.rows,
        ))
        .into());
    }
    debug!(rows = a.rows, cols = a.cols, k = b.cols, nnz = a.nnz(), "spmm_transpose");

    let k = b.cols;
    let mut c = DenseMatrix::zeros(a.cols, k);
    if k == 0 {
        return Ok(c);
    }

    for i in 0..a.rows {
        let b_row = b.row(i);
        for (j, &v) in a.row_entries(i) {
            T::axpy(v, b_row, &mut c.data[j * k..(j + 1) * k]);
        }
    }
    Ok(c)
}
