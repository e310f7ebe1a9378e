//! Input validation for batched solves.
//!
//! All checks run eagerly before the first operator application, so callers
//! get a [`ValidationError`] instead of a numerical failure halfway through a
//! solve. Every function returns [`ValidationError`], which converts into
//! [`SolverError::InvalidInput`](crate::error::SolverError::InvalidInput).
//!
//! | Resource       | Limit       | Constant           |
//! |----------------|-------------|--------------------|
//! | Rows / columns | 10,000,000  | [`MAX_NODES`]      |
//! | Non-zeros      | 100,000,000 | [`MAX_EDGES`]      |
//! | Iterations     | 1,000,000   | [`MAX_ITERATIONS`] |

use crate::config::CgConfig;
use crate::element::Element;
use crate::error::ValidationError;
use crate::types::{Batch, CsrMatrix};

/// Maximum number of rows or columns.
pub const MAX_NODES: usize = 10_000_000;

/// Maximum number of non-zero entries.
pub const MAX_EDGES: usize = 100_000_000;

/// Maximum per-entry iteration budget.
pub const MAX_ITERATIONS: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// CSR matrix validation
// ---------------------------------------------------------------------------

/// Validate the structural integrity of a CSR matrix.
///
/// Checks, in order:
///
/// 1. `rows` and `cols` are within [`MAX_NODES`].
/// 2. `nnz` is within [`MAX_EDGES`].
/// 3. `row_ptr` has length `rows + 1`, starts at 0, never decreases and ends
///    at `nnz`.
/// 4. `col_indices` and `values` have the same length.
/// 5. Every column index is below `cols`.
/// 6. Every value is finite.
///
/// Unsorted column indices within a row only emit a [`tracing::warn`].
///
/// # Errors
///
/// Returns [`ValidationError`] describing the first violation found.
///
/// # Examples
///
/// ```
/// use ruvector_batched_cg::types::CsrMatrix;
/// use ruvector_batched_cg::validation::validate_csr_matrix;
///
/// let m = CsrMatrix::<f32>::from_coo(2, 2, vec![(0, 0, 1.0), (1, 1, 2.0)]);
/// assert!(validate_csr_matrix(&m).is_ok());
/// ```
pub fn validate_csr_matrix<T: Element>(matrix: &CsrMatrix<T>) -> Result<(), ValidationError> {
    if matrix.rows > MAX_NODES || matrix.cols > MAX_NODES {
        return Err(ValidationError::MatrixTooLarge {
            rows: matrix.rows,
            cols: matrix.cols,
            max_dim: MAX_NODES,
        });
    }

    let nnz = matrix.values.len();
    if nnz > MAX_EDGES {
        return Err(ValidationError::DimensionMismatch(format!(
            "nnz {nnz} exceeds maximum allowed {MAX_EDGES}",
        )));
    }

    if matrix.row_ptr.len() != matrix.rows + 1 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr length {} does not equal rows + 1 = {}",
            matrix.row_ptr.len(),
            matrix.rows + 1,
        )));
    }

    if let Some(position) = matrix.row_ptr.windows(2).position(|w| w[1] < w[0]) {
        return Err(ValidationError::NonMonotonicRowPtrs {
            position: position + 1,
        });
    }

    if matrix.row_ptr[0] != 0 {
        return Err(ValidationError::DimensionMismatch(format!(
            "row_ptr[0] = {} (expected 0)",
            matrix.row_ptr[0],
        )));
    }
    if matrix.row_ptr[matrix.rows] != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "values length {nnz} does not match row_ptr[rows] = {}",
            matrix.row_ptr[matrix.rows],
        )));
    }

    if matrix.col_indices.len() != nnz {
        return Err(ValidationError::DimensionMismatch(format!(
            "col_indices length {} does not match values length {nnz}",
            matrix.col_indices.len(),
        )));
    }

    for row in 0..matrix.rows {
        let mut prev_col: Option<usize> = None;
        for (col, &val) in matrix.row_entries(row) {
            if col >= matrix.cols {
                return Err(ValidationError::IndexOutOfBounds {
                    index: col,
                    row,
                    cols: matrix.cols,
                });
            }

            if !val.is_finite() {
                return Err(ValidationError::NonFiniteValue(format!(
                    "matrix[{row}, {col}] = {val:?}",
                )));
            }

            if let Some(pc) = prev_col {
                if col < pc {
                    tracing::warn!(
                        row = row,
                        "column indices not sorted within row (col {} follows {})",
                        col,
                        pc,
                    );
                }
            }
            prev_col = Some(col);
        }
    }

    Ok(())
}

/// Reject non-square matrices; CG needs `A` square.
pub fn validate_square<T>(matrix: &CsrMatrix<T>) -> Result<(), ValidationError> {
    if matrix.rows != matrix.cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "solver requires a square matrix but got {}x{}",
            matrix.rows, matrix.cols,
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch validation
// ---------------------------------------------------------------------------

/// Check that every entry of `batch` has length `expected_dim`.
pub fn validate_batch<T>(
    batch: &Batch<T>,
    expected_dim: usize,
    name: &str,
) -> Result<(), ValidationError> {
    if batch.dim() != expected_dim {
        return Err(ValidationError::DimensionMismatch(format!(
            "{name} entries have length {} but the operator expects {expected_dim}",
            batch.dim(),
        )));
    }
    Ok(())
}

/// Validate a batch of right-hand sides.
///
/// Each entry must have length `expected_dim`, contain only finite values,
/// and have a squared norm representable in `T`; the convergence tolerance
/// and initial residual are both derived from it. An all-zero entry is
/// accepted with a [`tracing::warn`].
pub fn validate_rhs<T: Element>(y: &Batch<T>, expected_dim: usize) -> Result<(), ValidationError> {
    validate_batch(y, expected_dim, "rhs")?;

    for b in 0..y.batch_size() {
        let entry = y.entry(b);
        if let Some((i, v)) = entry.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::NonFiniteValue(format!("rhs[{b}][{i}] = {v:?}")));
        }
        let norm_squared = T::sum_squares(entry);
        if !norm_squared.is_finite() {
            return Err(ValidationError::NonFiniteValue(format!(
                "|rhs[{b}]|^2 overflows {}",
                T::DTYPE,
            )));
        }
        if !entry.is_empty() && entry.iter().all(|v| v.is_zero()) {
            tracing::warn!(entry = b, "rhs vector is all zeros");
        }
    }

    Ok(())
}

/// Check that the initial guess matches the right-hand sides in batch size
/// and the operator in dimension. Non-finite values are allowed; such entries
/// start out diverged.
pub fn validate_initial_guess<T>(
    x0: &Batch<T>,
    y: &Batch<T>,
    expected_dim: usize,
) -> Result<(), ValidationError> {
    validate_batch(x0, expected_dim, "x0")?;
    if x0.batch_size() != y.batch_size() {
        return Err(ValidationError::DimensionMismatch(format!(
            "x0 has {} entries but rhs has {}",
            x0.batch_size(),
            y.batch_size(),
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parameter validation
// ---------------------------------------------------------------------------

/// Resolve per-entry iteration budgets.
///
/// `max_iterations` holds either one value per batch entry or a single value
/// that is broadcast to every entry. Each budget must not exceed
/// [`MAX_ITERATIONS`]. A budget of zero is valid and finishes the entry
/// before the first iteration.
///
/// # Errors
///
/// [`ValidationError::DimensionMismatch`] for any other length,
/// [`ValidationError::ParameterOutOfRange`] for an oversized budget.
pub fn validate_max_iterations(
    max_iterations: &[u32],
    batch_size: usize,
) -> Result<Vec<u32>, ValidationError> {
    let resolved = match max_iterations.len() {
        n if n == batch_size => max_iterations.to_vec(),
        1 => vec![max_iterations[0]; batch_size],
        n => {
            return Err(ValidationError::DimensionMismatch(format!(
                "max_iterations has {n} entries; expected 1 or {batch_size}",
            )));
        }
    };

    if let Some(&too_many) = resolved.iter().find(|&&m| m > MAX_ITERATIONS) {
        return Err(ValidationError::ParameterOutOfRange {
            name: "max_iterations".into(),
            value: too_many.to_string(),
            expected: format!("[0, {MAX_ITERATIONS}]"),
        });
    }

    Ok(resolved)
}

/// Validate the complete input of one solve and resolve the iteration
/// budgets.
///
/// # Errors
///
/// Returns the first failing check.
pub fn validate_solver_input<T: Element>(
    rows: usize,
    cols: usize,
    y: &Batch<T>,
    x0: &Batch<T>,
    max_iterations: &[u32],
    config: &CgConfig,
) -> Result<Vec<u32>, ValidationError> {
    if rows != cols {
        return Err(ValidationError::DimensionMismatch(format!(
            "solver requires a square operator but got {rows}x{cols}",
        )));
    }
    config.validate()?;
    validate_rhs(y, rows)?;
    validate_initial_guess(x0, y, cols)?;
    validate_max_iterations(max_iterations, y.batch_size())
}
