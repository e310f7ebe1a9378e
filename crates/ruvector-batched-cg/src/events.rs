//! Structured events recorded during a solve.
//!
//! A session created with
//! [`with_event_log`](crate::session::SolverSession::with_event_log) appends a
//! [`SolverEvent`] for each milestone of the iteration, so callers can audit
//! what happened per batch entry without a tracing subscriber.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::element::DType;

/// How a batch entry finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// The residual dropped below the entry's tolerance.
    Converged,
    /// The residual grew past the divergence ratio, or `x0` was not finite.
    Diverged,
    /// The entry used up its iteration budget.
    MaxIterations,
}

/// Events emitted during a batched solve.
///
/// Tagged with `#[serde(tag = "type")]` so they serialise as
/// `{ "type": "SolveStarted", ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SolverEvent {
    /// Inputs were validated and the initial residuals computed.
    SolveStarted {
        /// Element type of the solve.
        dtype: DType,
        /// Number of batch entries.
        batch_size: usize,
        /// Operator dimension.
        dim: usize,
        /// Non-zeros of the operator.
        nnz: usize,
        /// Entries still active after the initial checks.
        active: usize,
    },

    /// The residual of the active entries was recomputed as `y - A x`.
    ResidualResynchronized {
        /// Loop iteration (1-based) at which the recompute happened.
        iteration: u32,
        /// Entries whose residual was recomputed.
        active: usize,
    },

    /// A batch entry stopped iterating.
    EntryFinished {
        /// Batch index.
        entry: usize,
        /// Iterations the entry took.
        iterations: u32,
        /// Final `|r|^2`, widened to `f64`.
        residual_squared: f64,
        /// Why it stopped.
        reason: FinishReason,
    },

    /// Every entry finished.
    SolveTerminated {
        /// Loop iterations executed.
        iterations: u32,
        /// Entries that converged.
        converged: usize,
        /// Entries flagged as diverged.
        diverged: usize,
        /// Wall time of the solve.
        wall_time: Duration,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_with_type_tag() {
        let ev = SolverEvent::EntryFinished {
            entry: 3,
            iterations: 9,
            residual_squared: 400.0,
            reason: FinishReason::Diverged,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "EntryFinished");
        assert_eq!(json["reason"], "Diverged");

        let back: SolverEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, ev);
    }
}
