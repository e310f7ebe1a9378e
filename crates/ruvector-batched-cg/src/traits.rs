//! Operator abstraction consumed by the CG driver.
//!
//! The driver never touches matrix storage directly; it only needs `A v` for
//! a packed batch of vectors. [`SparseOperator`] is that seam. The crate ships
//! [`CsrOperator`](crate::operator::CsrOperator) as the CPU implementation;
//! other sparse backends implement the trait outside this crate.

use crate::element::Element;
use crate::error::SolverError;

/// A linear operator `A` of shape `rows x cols` applied to batches of vectors.
pub trait SparseOperator<T: Element> {
    /// Number of rows of `A`.
    fn rows(&self) -> usize;

    /// Number of columns of `A`.
    fn cols(&self) -> usize;

    /// Number of stored non-zeros (used for logging and events).
    fn nnz(&self) -> usize;

    /// Compute `output_b = A input_b` for every batch entry `b`.
    ///
    /// `input` packs `batch` vectors of length [`cols`](Self::cols) and
    /// `output` packs the same number of vectors of length
    /// [`rows`](Self::rows); the batch size is `input.len() / cols`.
    ///
    /// # Errors
    ///
    /// Any error aborts the solve that issued the call.
    fn apply(&mut self, input: &[T], output: &mut [T]) -> Result<(), SolverError>;
}

impl<T: Element, O: SparseOperator<T> + ?Sized> SparseOperator<T> for &mut O {
    fn rows(&self) -> usize {
        (**self).rows()
    }

    fn cols(&self) -> usize {
        (**self).cols()
    }

    fn nnz(&self) -> usize {
        (**self).nnz()
    }

    fn apply(&mut self, input: &[T], output: &mut [T]) -> Result<(), SolverError> {
        (**self).apply(input, output)
    }
}
