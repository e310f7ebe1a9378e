//! Batched Conjugate Gradient iteration.
//!
//! Solves `A x_b = y_b` for every batch entry `b` at once, sharing one sparse
//! operator. There is no preconditioner. Each entry carries its own
//! tolerance, iteration budget and status flags; once an entry is finished
//! its state is frozen and later iterations skip it entirely.
//!
//! # Algorithm
//!
//! ```text
//! r = y - A x0;  dx = r;  rs = r . r
//!
//! k = 0
//! while any entry is active:
//!     k += 1
//!     dy    = A dx                           (one operator call, whole batch)
//!     step  = safe_div(rs, r . dy)           (per active entry)
//!     x    += step dx
//!     if resync_interval > 0 and k % resync_interval == 0:
//!         r = y - A x                        (second operator call)
//!     else:
//!         r -= step dy
//!     rs_old = rs;  rs = r . r
//!     dx = r + safe_div(rs, rs_old) dx
//!     re-evaluate converged / diverged / finished
//! ```
//!
//! `safe_div` is [`nan_safe_div`]: degenerate quotients become zero instead of
//! spreading NaN. The periodic exact recompute bounds the drift of the
//! recurrence; `k` is the global loop counter, not a per-entry count.
//!
//! # Counters
//!
//! An entry is charged one function evaluation for `y - A x0`, one per
//! iteration it takes part in, and one more for every re-synchronisation it
//! takes part in.

use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::CgConfig;
use crate::convergence::{ConvergenceTracker, EntryFlags};
use crate::division::nan_safe_div;
use crate::element::Element;
use crate::error::SolverError;
use crate::events::{FinishReason, SolverEvent};
use crate::state::ResidualState;
use crate::traits::SparseOperator;
use crate::types::{Batch, Snapshot};
use crate::workspace::Workspace;

/// Driver state between two iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// At least one entry is still iterating.
    Running,
    /// Every entry finished.
    Terminated,
}

/// One batched CG solve over borrowed session resources.
///
/// The driver owns nothing: the operator, scratch workspace and event log
/// belong to the caller (normally a
/// [`SolverSession`](crate::session::SolverSession)).
pub struct CgDriver<'a, T, O: ?Sized> {
    operator: &'a mut O,
    workspace: &'a mut Workspace<T>,
    config: &'a CgConfig,
    events: Option<&'a mut Vec<SolverEvent>>,
}

impl<'a, T, O> CgDriver<'a, T, O>
where
    T: Element,
    O: SparseOperator<T> + ?Sized,
{
    pub fn new(operator: &'a mut O, workspace: &'a mut Workspace<T>, config: &'a CgConfig) -> Self {
        Self {
            operator,
            workspace,
            config,
            events: None,
        }
    }

    /// Append [`SolverEvent`]s to `log` while solving.
    pub fn with_events(mut self, log: &'a mut Vec<SolverEvent>) -> Self {
        self.events = Some(log);
        self
    }

    /// Run CG until every entry has finished.
    ///
    /// Inputs are assumed validated: `y` and `x0` share batch size and
    /// operator dimension, and `max_iterations` has one budget per entry.
    ///
    /// Returns one snapshot per loop iteration when
    /// [`CgConfig::record_trajectory`] is set, otherwise a single snapshot of
    /// the final state. A recorded solve in which no iteration runs returns
    /// an empty trajectory.
    ///
    /// # Errors
    ///
    /// Propagates the first operator failure; the solve is abandoned.
    pub fn run(
        self,
        y: &Batch<T>,
        x0: Batch<T>,
        max_iterations: Vec<u32>,
    ) -> Result<Vec<Snapshot<T>>, SolverError> {
        let Self {
            operator,
            workspace,
            config,
            events,
        } = self;
        let mut events = EventSink(events);

        let start = Instant::now();
        let batch = y.batch_size();
        let dim = y.dim();
        let (dy, ax) = workspace.split_pair(batch * dim);

        // r = y - A x0
        operator.apply(x0.as_slice(), ax)?;
        let mut residual = Batch::zeros(batch, dim);
        for ((r, &yi), &axi) in residual.as_mut_slice().iter_mut().zip(y.as_slice()).zip(ax.iter()) {
            *r = yi - axi;
        }

        let mut state = ResidualState::new(x0, residual);
        let mut tracker = ConvergenceTracker::new(
            y,
            &state.x,
            &state.initial_residual_squared,
            max_iterations,
            config,
        );

        let dtype = T::DTYPE;
        let nnz = operator.nnz();
        let active = tracker.active_count();
        debug!(
            dtype = %dtype,
            batch,
            dim,
            nnz,
            active,
            rtol = config.rtol,
            atol = config.atol,
            "batched CG: start"
        );
        events.emit(SolverEvent::SolveStarted {
            dtype,
            batch_size: batch,
            dim,
            nnz,
            active,
        });
        for b in 0..batch {
            if tracker.is_finished(b) {
                events.entry_finished(b, tracker.flags(b), &state);
            }
        }

        let record = config.record_trajectory;
        let resync_interval = config.resync_interval;
        let mut snapshots = Vec::new();
        let mut steps = vec![T::zero(); batch];
        let mut k: u32 = 0;
        let mut driver_state = Self::state_of(&tracker);

        while driver_state == DriverState::Running {
            k += 1;
            let active = tracker.active_mask();
            trace!(iteration = k, active = tracker.active_count(), "batched CG: iteration");

            for b in active_entries(&active) {
                state.iterations[b] += 1;
            }

            // dy = A dx
            operator.apply(state.dx.as_slice(), dy)?;
            for b in active_entries(&active) {
                state.function_evaluations[b] += 1;
            }

            // step = rs / (r . dy); x += step dx
            for b in active_entries(&active) {
                let dy_b = &dy[b * dim..(b + 1) * dim];
                let curvature = T::dot(state.residual.entry(b), dy_b);
                let step = nan_safe_div(state.residual_squared[b], curvature);
                T::axpy(step, state.dx.entry(b), state.x.entry_mut(b));
                steps[b] = step;
            }

            let resync = resync_interval > 0 && k % resync_interval == 0;
            if resync {
                // r = y - A x
                operator.apply(state.x.as_slice(), ax)?;
                for b in active_entries(&active) {
                    let range = b * dim..(b + 1) * dim;
                    for ((r, &yi), &axi) in state
                        .residual
                        .entry_mut(b)
                        .iter_mut()
                        .zip(y.entry(b))
                        .zip(&ax[range])
                    {
                        *r = yi - axi;
                    }
                    state.function_evaluations[b] += 1;
                }
                let resynced = active.iter().filter(|&&a| a).count();
                debug!(iteration = k, active = resynced, "batched CG: residual resync");
                events.emit(SolverEvent::ResidualResynchronized {
                    iteration: k,
                    active: resynced,
                });
            } else {
                // r -= step dy
                for b in active_entries(&active) {
                    T::axpy(-steps[b], &dy[b * dim..(b + 1) * dim], state.residual.entry_mut(b));
                }
            }

            for b in active_entries(&active) {
                let rs_old = state.residual_squared[b];
                let rs = T::sum_squares(state.residual.entry(b));
                state.residual_squared[b] = rs;

                // dx = r + beta dx
                let beta = nan_safe_div(rs, rs_old);
                for (d, &r) in state.dx.entry_mut(b).iter_mut().zip(state.residual.entry(b)) {
                    *d = r + beta * *d;
                }

                let flags = tracker.evaluate(b, rs, state.iterations[b]);
                if flags.finished {
                    events.entry_finished(b, flags, &state);
                }
            }

            if record {
                snapshots.push(state.snapshot(tracker.converged_flags(), tracker.diverged_flags()));
            }
            driver_state = Self::state_of(&tracker);
        }

        let converged = tracker.converged_flags().iter().filter(|&&c| c).count();
        let diverged = tracker.diverged_flags().iter().filter(|&&d| d).count();
        let wall_time = start.elapsed();
        debug!(
            iterations = k,
            converged,
            diverged,
            batch,
            ?wall_time,
            "batched CG: terminated"
        );
        events.emit(SolverEvent::SolveTerminated {
            iterations: k,
            converged,
            diverged,
            wall_time,
        });

        if !record {
            snapshots.push(state.into_snapshot(tracker.converged_flags(), tracker.diverged_flags()));
        }
        Ok(snapshots)
    }

    fn state_of(tracker: &ConvergenceTracker<T>) -> DriverState {
        if tracker.all_finished() {
            DriverState::Terminated
        } else {
            DriverState::Running
        }
    }
}

/// Optional event log borrowed from the caller.
struct EventSink<'a>(Option<&'a mut Vec<SolverEvent>>);

impl EventSink<'_> {
    fn emit(&mut self, event: SolverEvent) {
        if let Some(log) = self.0.as_deref_mut() {
            log.push(event);
        }
    }

    fn entry_finished<T: Element>(&mut self, b: usize, flags: EntryFlags, state: &ResidualState<T>) {
        let reason = if flags.converged {
            FinishReason::Converged
        } else if flags.diverged {
            FinishReason::Diverged
        } else {
            FinishReason::MaxIterations
        };
        let iterations = state.iterations[b];
        let residual_squared = state.residual_squared[b].as_f64();

        match reason {
            FinishReason::Diverged => warn!(
                entry = b,
                iterations,
                residual_squared,
                initial = state.initial_residual_squared[b].as_f64(),
                "batched CG: entry diverged"
            ),
            _ => trace!(entry = b, iterations, residual_squared, ?reason, "batched CG: entry finished"),
        }

        self.emit(SolverEvent::EntryFinished {
            entry: b,
            iterations,
            residual_squared,
            reason,
        });
    }
}

fn active_entries(mask: &[bool]) -> impl Iterator<Item = usize> + '_ {
    mask.iter().enumerate().filter_map(|(b, &a)| a.then_some(b))
}
