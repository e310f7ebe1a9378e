//! CPU sparse operator over a borrowed CSR matrix.
//!
//! [`CsrOperator`] is the reference [`SparseOperator`]: it validates the
//! matrix once when it is built and then applies it to every entry of a
//! packed batch. With the `parallel` feature the batch entries are spread
//! over the rayon thread pool; each entry writes only its own output slice.

use tracing::trace;

use crate::element::Element;
use crate::error::SolverError;
use crate::traits::SparseOperator;
use crate::types::CsrMatrix;
use crate::validation::validate_csr_matrix;

/// Sparse operator backed by a [`CsrMatrix`] borrowed for `'m`.
#[derive(Debug)]
pub struct CsrOperator<'m, T> {
    matrix: &'m CsrMatrix<T>,
    applications: u64,
}

impl<'m, T: Element> CsrOperator<'m, T> {
    /// Wrap `matrix` after validating its structure.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] if the matrix is malformed.
    pub fn new(matrix: &'m CsrMatrix<T>) -> Result<Self, SolverError> {
        validate_csr_matrix(matrix)?;
        Ok(Self {
            matrix,
            applications: 0,
        })
    }

    /// The wrapped matrix.
    pub fn matrix(&self) -> &'m CsrMatrix<T> {
        self.matrix
    }

    /// Number of successful [`apply`](SparseOperator::apply) calls so far.
    pub fn applications(&self) -> u64 {
        self.applications
    }

    fn batch_size(&self, input: &[T], output: &[T]) -> Result<usize, SolverError> {
        let (rows, cols) = (self.matrix.rows, self.matrix.cols);
        let batch = if cols > 0 {
            input.len() / cols
        } else if rows > 0 {
            output.len() / rows
        } else {
            0
        };

        if input.len() != batch * cols || output.len() != batch * rows {
            return Err(SolverError::backend(
                "spmv",
                format!(
                    "buffer sizes (input {}, output {}) do not fit a {rows}x{cols} operator",
                    input.len(),
                    output.len(),
                ),
            ));
        }
        Ok(batch)
    }
}

impl<T: Element> SparseOperator<T> for CsrOperator<'_, T> {
    fn rows(&self) -> usize {
        self.matrix.rows
    }

    fn cols(&self) -> usize {
        self.matrix.cols
    }

    fn nnz(&self) -> usize {
        self.matrix.nnz()
    }

    fn apply(&mut self, input: &[T], output: &mut [T]) -> Result<(), SolverError> {
        let batch = self.batch_size(input, output)?;
        let (rows, cols) = (self.matrix.rows, self.matrix.cols);
        trace!(batch, rows, cols, "csr apply");

        if rows == 0 {
            self.applications += 1;
            return Ok(());
        }
        if cols == 0 {
            output.fill(T::zero());
            self.applications += 1;
            return Ok(());
        }

        let matrix = self.matrix;

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            output
                .par_chunks_mut(rows)
                .zip(input.par_chunks(cols))
                .for_each(|(out, x)| matrix.spmv(x, out));
        }

        #[cfg(not(feature = "parallel"))]
        {
            for (out, x) in output.chunks_mut(rows).zip(input.chunks(cols)) {
                matrix.spmv(x, out);
            }
        }

        self.applications += 1;
        Ok(())
    }
}
