//! Mutable per-entry iteration state.

use crate::element::Element;
use crate::types::{Batch, Snapshot};

/// Iterate, residual and search direction for every batch entry, plus the
/// scalars and counters CG carries between iterations.
///
/// Entry `b` of each batch and index `b` of each per-entry vector describe the
/// same right-hand side. Nothing here couples two entries.
#[derive(Debug, Clone)]
pub struct ResidualState<T> {
    /// Current solution estimates.
    pub x: Batch<T>,
    /// `y - A x`, maintained by recurrence between re-synchronisations.
    pub residual: Batch<T>,
    /// Search directions.
    pub dx: Batch<T>,
    /// `|residual|^2` per entry.
    pub residual_squared: Vec<T>,
    /// `|y - A x0|^2` per entry, fixed for the solve.
    pub initial_residual_squared: Vec<T>,
    /// Operator applications charged to each entry.
    pub function_evaluations: Vec<u32>,
    /// Iterations each entry has taken.
    pub iterations: Vec<u32>,
}

impl<T: Element> ResidualState<T> {
    /// Initial state from `x0` and the first residual `y - A x0`.
    ///
    /// The first search direction is the residual itself, and every entry is
    /// charged one operator application for computing it.
    ///
    /// # Panics
    ///
    /// Panics if `x0` and `residual` differ in shape.
    pub fn new(x0: Batch<T>, residual: Batch<T>) -> Self {
        assert_eq!(x0.batch_size(), residual.batch_size(), "state batch size mismatch");
        assert_eq!(x0.dim(), residual.dim(), "state dimension mismatch");

        let batch = x0.batch_size();
        let residual_squared: Vec<T> = (0..batch)
            .map(|b| T::sum_squares(residual.entry(b)))
            .collect();

        Self {
            x: x0,
            dx: residual.clone(),
            residual,
            initial_residual_squared: residual_squared.clone(),
            residual_squared,
            function_evaluations: vec![1; batch],
            iterations: vec![0; batch],
        }
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.iterations.len()
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.x.dim()
    }

    /// Copy out the reportable part of the state.
    pub fn snapshot(&self, converged: &[bool], diverged: &[bool]) -> Snapshot<T> {
        Snapshot {
            x: self.x.clone(),
            residual: self.residual.clone(),
            iterations: self.iterations.clone(),
            function_evaluations: self.function_evaluations.clone(),
            converged: converged.to_vec(),
            diverged: diverged.to_vec(),
        }
    }

    /// Consume the state into its final snapshot.
    pub fn into_snapshot(self, converged: &[bool], diverged: &[bool]) -> Snapshot<T> {
        Snapshot {
            x: self.x,
            residual: self.residual,
            iterations: self.iterations,
            function_evaluations: self.function_evaluations,
            converged: converged.to_vec(),
            diverged: diverged.to_vec(),
        }
    }
}
