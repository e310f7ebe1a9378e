//! Error types for the batched CG crate.
//!
//! Only structural problems are errors: malformed input, a wrong raw element
//! type, or a failing sparse backend. Non-convergence and divergence are not
//! errors; they are reported per batch entry through the snapshot flags.

use crate::element::DType;

/// Primary error type for solver operations.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// A sparse or dense primitive reported a failure. The solve that issued
    /// the call is aborted; there is no retry.
    #[error("backend failure in {operation}: {detail}")]
    Backend {
        /// Primitive that failed (e.g. `"spmv"`).
        operation: &'static str,
        /// Human-readable explanation.
        detail: String,
    },

    /// Raw input data carried an element type the target container does not
    /// accept.
    #[error("element type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Element type the container requires.
        expected: DType,
        /// Element type that was supplied.
        found: DType,
    },

    /// The caller supplied invalid input (dimensions, parameters, etc.).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),
}

impl SolverError {
    /// Shorthand for a [`SolverError::Backend`] failure.
    pub fn backend(operation: &'static str, detail: impl Into<String>) -> Self {
        SolverError::Backend {
            operation,
            detail: detail.into(),
        }
    }
}

/// Validation errors for solver inputs.
///
/// These are raised eagerly before any computation begins so that callers get
/// clear diagnostics rather than mysterious numerical failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Dimensions are inconsistent (e.g. row_ptr length vs rows, batch length
    /// vs matrix dimension).
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A column index is out of bounds for the declared number of columns.
    #[error("column index {index} out of bounds for {cols} columns (row {row})")]
    IndexOutOfBounds {
        /// Offending column index.
        index: usize,
        /// Row containing the offending entry.
        row: usize,
        /// Declared column count.
        cols: usize,
    },

    /// A raw index array contained a negative value.
    #[error("negative index {value} at position {position}")]
    NegativeIndex {
        /// Position in the raw index array.
        position: usize,
        /// The negative value.
        value: i64,
    },

    /// The `row_ptr` array is not monotonically non-decreasing.
    #[error("row_ptr is not monotonically non-decreasing at position {position}")]
    NonMonotonicRowPtrs {
        /// Position in `row_ptr` where the violation was detected.
        position: usize,
    },

    /// A parameter is outside its valid range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    ParameterOutOfRange {
        /// Name of the parameter.
        name: String,
        /// The invalid value (as a string for flexibility).
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },

    /// Matrix size exceeds the implementation limit.
    #[error("matrix size {rows}x{cols} exceeds maximum supported {max_dim}x{max_dim}")]
    MatrixTooLarge {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
        /// Maximum supported dimension.
        max_dim: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_message() {
        let err = SolverError::backend("spmv", "output buffer too small");
        assert_eq!(
            err.to_string(),
            "backend failure in spmv: output buffer too small"
        );
    }

    #[test]
    fn validation_converts_into_invalid_input() {
        let err: SolverError = ValidationError::NonMonotonicRowPtrs { position: 3 }.into();
        assert!(matches!(err, SolverError::InvalidInput(_)));
        assert!(err.to_string().contains("position 3"));
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let err = SolverError::TypeMismatch {
            expected: DType::F32,
            found: DType::I32,
        };
        let msg = err.to_string();
        assert!(msg.contains("f32") && msg.contains("i32"), "{msg}");
    }
}
