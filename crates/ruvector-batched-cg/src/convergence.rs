//! Per-entry convergence and divergence tracking.
//!
//! All criteria work on squared residual norms:
//!
//! ```text
//! tolerance = max(rtol^2 * |y|^2, atol^2)        (fixed for the solve)
//! converged = |r|^2 <= tolerance
//! diverged  = |r|^2 / |r_0|^2 > ratio  and  iterations >= min_iterations
//! finished  = converged or diverged or iterations >= max_iterations
//! ```
//!
//! Divergence compares against the residual captured before the first
//! iteration, not against the previous one. An entry whose initial guess
//! contains a non-finite value starts out diverged.

use crate::config::CgConfig;
use crate::element::Element;
use crate::types::Batch;

/// Convergence threshold on `|r|^2` for one right-hand side.
///
/// With `rtol == 0` this is exactly `atol^2`, whatever `y` holds.
#[inline]
pub fn tolerance<T: Element>(y: &[T], rtol: T, atol: T) -> T {
    let relative = rtol * rtol * T::sum_squares(y);
    // Float::max ignores a NaN operand, so an overflowing |y|^2 with rtol = 0
    // still yields atol^2.
    relative.max(atol * atol)
}

#[inline]
pub fn converged<T: Element>(residual_squared: T, tolerance: T) -> bool {
    residual_squared <= tolerance
}

/// Divergence test against the initial residual.
///
/// A zero initial residual makes any non-zero residual diverge (the ratio is
/// infinite) while `0 / 0` never does.
#[inline]
pub fn diverged<T: Element>(
    residual_squared: T,
    initial_residual_squared: T,
    iterations: u32,
    ratio: T,
    min_iterations: u32,
) -> bool {
    iterations >= min_iterations && residual_squared / initial_residual_squared > ratio
}

/// Status flags of one batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryFlags {
    pub converged: bool,
    pub diverged: bool,
    pub finished: bool,
}

/// Tracks tolerances and status flags for every batch entry of one solve.
#[derive(Debug, Clone)]
pub struct ConvergenceTracker<T> {
    tolerance: Vec<T>,
    initial_residual_squared: Vec<T>,
    max_iterations: Vec<u32>,
    divergence_ratio: T,
    divergence_min_iterations: u32,
    converged: Vec<bool>,
    diverged: Vec<bool>,
    finished: Vec<bool>,
}

impl<T: Element> ConvergenceTracker<T> {
    /// Compute tolerances and the initial flags.
    ///
    /// `initial_residual_squared` is `|y - A x0|^2` per entry and
    /// `max_iterations` holds one budget per entry.
    ///
    /// # Panics
    ///
    /// Panics if the per-entry inputs disagree on the batch size.
    pub fn new(
        y: &Batch<T>,
        x0: &Batch<T>,
        initial_residual_squared: &[T],
        max_iterations: Vec<u32>,
        config: &CgConfig,
    ) -> Self {
        let batch = y.batch_size();
        assert_eq!(x0.batch_size(), batch, "x0 batch size mismatch");
        assert_eq!(initial_residual_squared.len(), batch, "residual batch size mismatch");
        assert_eq!(max_iterations.len(), batch, "max_iterations batch size mismatch");

        let rtol = T::from_f64(config.rtol);
        let atol = T::from_f64(config.atol);
        let tolerance: Vec<T> = (0..batch).map(|b| tolerance(y.entry(b), rtol, atol)).collect();

        let mut tracker = Self {
            tolerance,
            initial_residual_squared: initial_residual_squared.to_vec(),
            max_iterations,
            divergence_ratio: T::from_f64(config.divergence_ratio),
            divergence_min_iterations: config.divergence_min_iterations,
            converged: vec![false; batch],
            diverged: vec![false; batch],
            finished: vec![false; batch],
        };

        for b in 0..batch {
            let non_finite_guess = x0.entry(b).iter().any(|v| !v.is_finite());
            let conv = converged(initial_residual_squared[b], tracker.tolerance[b]);
            tracker.set(b, conv, non_finite_guess, 0);
        }
        tracker
    }

    /// Re-evaluate the flags of entry `b` after it took a step.
    ///
    /// Only call this for entries that were active in the step; finished
    /// entries keep their flags.
    pub fn evaluate(&mut self, b: usize, residual_squared: T, iterations: u32) -> EntryFlags {
        let conv = converged(residual_squared, self.tolerance[b]);
        let div = diverged(
            residual_squared,
            self.initial_residual_squared[b],
            iterations,
            self.divergence_ratio,
            self.divergence_min_iterations,
        );
        self.set(b, conv, div, iterations)
    }

    fn set(&mut self, b: usize, conv: bool, div: bool, iterations: u32) -> EntryFlags {
        let finished = conv || div || iterations >= self.max_iterations[b];
        self.converged[b] = conv;
        self.diverged[b] = div;
        self.finished[b] = finished;
        EntryFlags {
            converged: conv,
            diverged: div,
            finished,
        }
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.finished.len()
    }

    #[inline]
    pub fn is_finished(&self, b: usize) -> bool {
        self.finished[b]
    }

    /// Whether every entry has finished.
    #[inline]
    pub fn all_finished(&self) -> bool {
        self.finished.iter().all(|&f| f)
    }

    /// Number of entries still iterating.
    pub fn active_count(&self) -> usize {
        self.finished.iter().filter(|&&f| !f).count()
    }

    /// Snapshot of the `not_finished` mask.
    pub fn active_mask(&self) -> Vec<bool> {
        self.finished.iter().map(|&f| !f).collect()
    }

    /// Threshold on `|r|^2` for entry `b`.
    #[inline]
    pub fn tolerance(&self, b: usize) -> T {
        self.tolerance[b]
    }

    pub fn flags(&self, b: usize) -> EntryFlags {
        EntryFlags {
            converged: self.converged[b],
            diverged: self.diverged[b],
            finished: self.finished[b],
        }
    }

    pub fn converged_flags(&self) -> &[bool] {
        &self.converged
    }

    pub fn diverged_flags(&self) -> &[bool] {
        &self.diverged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn batch(rows: &[&[f64]]) -> Batch<f64> {
        Batch::from_rows(rows).unwrap()
    }

    #[test]
    fn tolerance_relative_dominates() {
        // rtol^2 * |y|^2 = 0.01 * 25 = 0.25 > atol^2 = 0.01
        assert!((tolerance(&[3.0f64, 4.0], 0.1, 0.1) - 0.25).abs() < 1e-15);
    }

    #[test]
    fn tolerance_zero_rtol_is_atol_squared() {
        assert_eq!(tolerance(&[1e3f64, -7.0, 2.5], 0.0, 1e-3), 1e-3 * 1e-3);
        assert_eq!(tolerance(&[f64::MAX, f64::MAX], 0.0, 2.0), 4.0);
    }

    proptest! {
        #[test]
        fn zero_rtol_ignores_rhs(
            y in proptest::collection::vec(-1e150f64..1e150, 0..16),
            atol in 0.0f64..1e3,
        ) {
            prop_assert_eq!(tolerance(&y, 0.0, atol), atol * atol);
        }

        #[test]
        fn tolerance_bounds_both_criteria(
            y in proptest::collection::vec(-1e3f64..1e3, 1..16),
            rtol in 0.0f64..1.0,
            atol in 0.0f64..1.0,
        ) {
            let tol = tolerance(&y, rtol, atol);
            prop_assert!(tol >= atol * atol);
            prop_assert!(tol >= rtol * rtol * f64::sum_squares(&y));
        }
    }

    #[test]
    fn divergence_guard_suppresses_early_growth() {
        assert!(!diverged(1e6f64, 1.0, 7, 100.0, 8));
        assert!(diverged(1e6f64, 1.0, 8, 100.0, 8));
        assert!(!diverged(100.0f64, 1.0, 20, 100.0, 8));
    }

    #[test]
    fn divergence_with_zero_initial_residual() {
        assert!(diverged(1.0f64, 0.0, 8, 100.0, 8));
        assert!(!diverged(0.0f64, 0.0, 8, 100.0, 8));
    }

    #[test]
    fn non_finite_guess_starts_diverged() {
        let y = batch(&[&[1.0, 1.0], &[1.0, 1.0]]);
        let x0 = batch(&[&[f64::NAN, 0.0], &[0.0, 0.0]]);
        let tracker = ConvergenceTracker::new(&y, &x0, &[2.0, 2.0], vec![10, 10], &CgConfig::new(0.0, 1e-8));

        assert_eq!(
            tracker.flags(0),
            EntryFlags { converged: false, diverged: true, finished: true }
        );
        assert!(!tracker.is_finished(1));
        assert_eq!(tracker.active_count(), 1);
        assert_eq!(tracker.active_mask(), vec![false, true]);
    }

    #[test]
    fn zero_budget_finishes_immediately() {
        let y = batch(&[&[1.0]]);
        let x0 = batch(&[&[0.0]]);
        let tracker = ConvergenceTracker::new(&y, &x0, &[1.0], vec![0], &CgConfig::new(0.0, 1e-8));
        let flags = tracker.flags(0);
        assert!(flags.finished && !flags.converged && !flags.diverged);
        assert!(tracker.all_finished());
    }

    #[test]
    fn evaluate_reaches_iteration_budget() {
        let y = batch(&[&[1.0]]);
        let x0 = batch(&[&[0.0]]);
        let mut tracker = ConvergenceTracker::new(&y, &x0, &[1.0], vec![3], &CgConfig::new(0.0, 1e-8));

        assert!(!tracker.evaluate(0, 0.5, 2).finished);
        let flags = tracker.evaluate(0, 0.5, 3);
        assert!(flags.finished && !flags.converged && !flags.diverged);
    }

    #[test]
    fn evaluate_flags_divergence_after_guard() {
        let y = batch(&[&[1.0]]);
        let x0 = batch(&[&[0.0]]);
        let mut tracker = ConvergenceTracker::new(&y, &x0, &[1.0], vec![100], &CgConfig::new(0.0, 1e-8));

        assert!(!tracker.evaluate(0, 400.0, 1).diverged);
        let flags = tracker.evaluate(0, 400.0, 9);
        assert!(flags.diverged && !flags.converged && flags.finished);
        assert_eq!(tracker.diverged_flags(), &[true]);
    }
}
