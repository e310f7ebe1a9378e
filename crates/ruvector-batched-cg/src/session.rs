//! Caller-owned solver sessions.
//!
//! A [`SolverSession`] bundles everything one or more solves share: the
//! sparse operator (and through it the borrowed matrix), the grow-only
//! scratch [`Workspace`], the [`CgConfig`] and an optional event log. There is
//! no process-wide state; two sessions never interact. Dropping a session
//! releases its workspace, on every exit path including an early `?` return
//! after a backend failure.

use std::marker::PhantomData;

use tracing::debug;

use crate::cg::CgDriver;
use crate::config::CgConfig;
use crate::element::Element;
use crate::error::SolverError;
use crate::events::SolverEvent;
use crate::operator::CsrOperator;
use crate::traits::SparseOperator;
use crate::types::{Batch, CsrMatrix, Snapshot};
use crate::validation::{validate_solver_input, validate_square};
use crate::workspace::Workspace;

/// A solve session over one operator.
///
/// `'m` is the lifetime of the borrowed matrix when the default
/// [`CsrOperator`] is used.
///
/// # Example
///
/// ```
/// use ruvector_batched_cg::{Batch, CgConfig, CsrMatrix, SolverSession};
///
/// let a = CsrMatrix::<f64>::from_coo(2, 2, vec![
///     (0, 0, 4.0), (0, 1, 1.0),
///     (1, 0, 1.0), (1, 1, 3.0),
/// ]);
/// let mut session = SolverSession::new(&a, CgConfig::new(0.0, 1e-10)).unwrap();
///
/// let y = Batch::from_rows(&[[1.0, 2.0], [0.5, -1.0]]).unwrap();
/// let x0 = Batch::zeros(2, 2);
/// let snapshots = session.solve(&y, &x0, &[50]).unwrap();
///
/// assert_eq!(snapshots.len(), 1);
/// assert!(snapshots[0].all_converged());
/// ```
pub struct SolverSession<'m, T, O = CsrOperator<'m, T>>
where
    T: Element,
    O: SparseOperator<T>,
{
    operator: O,
    workspace: Workspace<T>,
    config: CgConfig,
    events: Option<Vec<SolverEvent>>,
    solves: u64,
    _matrix: PhantomData<&'m ()>,
}

impl<'m, T: Element> SolverSession<'m, T> {
    /// Session over a CSR matrix borrowed for the session's lifetime.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] if the matrix is malformed or not
    /// square, or if `config` is out of range.
    pub fn new(matrix: &'m CsrMatrix<T>, config: CgConfig) -> Result<Self, SolverError> {
        validate_square(matrix)?;
        Self::with_operator(CsrOperator::new(matrix)?, config)
    }
}

impl<'m, T, O> SolverSession<'m, T, O>
where
    T: Element,
    O: SparseOperator<T>,
{
    /// Session over any [`SparseOperator`].
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] if `config` is out of range.
    pub fn with_operator(operator: O, config: CgConfig) -> Result<Self, SolverError> {
        config.validate()?;
        debug!(
            rows = operator.rows(),
            cols = operator.cols(),
            nnz = operator.nnz(),
            "solver session created"
        );
        Ok(Self {
            operator,
            workspace: Workspace::new(),
            config,
            events: None,
            solves: 0,
            _matrix: PhantomData,
        })
    }

    /// Record [`SolverEvent`]s for every subsequent solve.
    pub fn with_event_log(mut self) -> Self {
        self.events.get_or_insert_with(Vec::new);
        self
    }

    /// Events recorded so far (empty without an event log).
    pub fn events(&self) -> &[SolverEvent] {
        self.events.as_deref().unwrap_or(&[])
    }

    /// Drain the recorded events.
    pub fn take_events(&mut self) -> Vec<SolverEvent> {
        self.events.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn config(&self) -> &CgConfig {
        &self.config
    }

    /// Replace the configuration for later solves.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] if `config` is out of range; the old
    /// configuration stays in place.
    pub fn set_config(&mut self, config: CgConfig) -> Result<(), SolverError> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    /// Scratch space shared by all solves of this session.
    pub fn workspace(&self) -> &Workspace<T> {
        &self.workspace
    }

    /// Number of solves that ran to completion.
    pub fn solves(&self) -> u64 {
        self.solves
    }

    /// Solve `A x_b = y_b` for every batch entry.
    ///
    /// `max_iterations` holds one budget per entry or a single budget for
    /// all of them. Returns one snapshot per iteration when the config
    /// records trajectories, otherwise one snapshot of the final state.
    ///
    /// # Errors
    ///
    /// [`SolverError::InvalidInput`] for inconsistent input, or the first
    /// operator failure.
    pub fn solve(
        &mut self,
        y: &Batch<T>,
        x0: &Batch<T>,
        max_iterations: &[u32],
    ) -> Result<Vec<Snapshot<T>>, SolverError> {
        let budgets = validate_solver_input(
            self.operator.rows(),
            self.operator.cols(),
            y,
            x0,
            max_iterations,
            &self.config,
        )?;

        let mut driver = CgDriver::new(&mut self.operator, &mut self.workspace, &self.config);
        if let Some(log) = self.events.as_mut() {
            driver = driver.with_events(log);
        }
        let snapshots = driver.run(y, x0.clone(), budgets)?;

        self.solves += 1;
        Ok(snapshots)
    }
}

impl<T, O> Drop for SolverSession<'_, T, O>
where
    T: Element,
    O: SparseOperator<T>,
{
    fn drop(&mut self) {
        debug!(
            solves = self.solves,
            high_water_mark = self.workspace.high_water_mark(),
            grow_count = self.workspace.grow_count(),
            bytes = self.workspace.bytes(),
            "solver session released"
        );
    }
}

/// Solve a batch of systems sharing one CSR matrix.
///
/// Creates a session with tolerances `rtol`/`atol` and default stabilisation
/// constants, runs one solve and drops the session.
///
/// # Errors
///
/// See [`SolverSession::new`] and [`SolverSession::solve`].
pub fn solve<T: Element>(
    matrix: &CsrMatrix<T>,
    y: &Batch<T>,
    x0: &Batch<T>,
    rtol: f64,
    atol: f64,
    max_iterations: &[u32],
    record_trajectory: bool,
) -> Result<Vec<Snapshot<T>>, SolverError> {
    let config = CgConfig::new(rtol, atol).with_trajectory(record_trajectory);
    let mut session = SolverSession::new(matrix, config)?;
    session.solve(y, x0, max_iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn laplacian_1d(n: usize) -> CsrMatrix<f64> {
        let mut entries = Vec::new();
        for i in 0..n {
            entries.push((i, i, 2.0));
            if i > 0 {
                entries.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                entries.push((i, i + 1, -1.0));
            }
        }
        CsrMatrix::from_coo(n, n, entries)
    }

    #[test]
    fn rejects_rectangular_matrix() {
        let m = CsrMatrix::<f64>::from_coo(2, 3, vec![(0, 0, 1.0)]);
        assert!(matches!(
            SolverSession::new(&m, CgConfig::default()),
            Err(SolverError::InvalidInput(ValidationError::DimensionMismatch(_)))
        ));
    }

    #[test]
    fn rejects_invalid_config() {
        let m = laplacian_1d(3);
        assert!(SolverSession::new(&m, CgConfig::new(-1.0, 0.0)).is_err());
    }

    #[test]
    fn workspace_reused_across_solves() {
        let m = laplacian_1d(8);
        let mut session = SolverSession::new(&m, CgConfig::new(0.0, 1e-10)).unwrap();
        let y = Batch::from_rows(&[vec![1.0; 8], vec![0.5; 8]]).unwrap();
        let x0 = Batch::zeros(2, 8);

        session.solve(&y, &x0, &[20]).unwrap();
        let mark = session.workspace().high_water_mark();
        session.solve(&y, &x0, &[20]).unwrap();

        assert_eq!(mark, 2 * 2 * 8);
        assert_eq!(session.workspace().high_water_mark(), mark);
        assert_eq!(session.workspace().grow_count(), 1);
        assert_eq!(session.solves(), 2);
    }

    #[test]
    fn event_log_is_opt_in() {
        let m = laplacian_1d(4);
        let y = Batch::from_rows(&[vec![1.0; 4]]).unwrap();
        let x0 = Batch::zeros(1, 4);

        let mut quiet = SolverSession::new(&m, CgConfig::default()).unwrap();
        quiet.solve(&y, &x0, &[10]).unwrap();
        assert!(quiet.events().is_empty());

        let mut logged = SolverSession::new(&m, CgConfig::default()).unwrap().with_event_log();
        logged.solve(&y, &x0, &[10]).unwrap();
        let events = logged.take_events();
        assert!(matches!(events.first(), Some(SolverEvent::SolveStarted { .. })));
        assert!(matches!(events.last(), Some(SolverEvent::SolveTerminated { .. })));
        assert!(logged.events().is_empty());
    }

    #[test]
    fn set_config_keeps_old_on_error() {
        let m = laplacian_1d(2);
        let mut session = SolverSession::new(&m, CgConfig::default()).unwrap();
        assert!(session.set_config(CgConfig::new(f64::INFINITY, 0.0)).is_err());
        assert_eq!(session.config(), &CgConfig::default());
    }

    #[test]
    fn free_solve_broadcasts_budget() {
        let m = laplacian_1d(5);
        let y = Batch::from_rows(&[vec![1.0; 5], vec![2.0; 5], vec![0.0; 5]]).unwrap();
        let snaps = solve(&m, &y, &Batch::zeros(3, 5), 0.0, 1e-10, &[25], false).unwrap();
        assert_eq!(snaps.len(), 1);
        assert!(snaps[0].all_converged());
    }
}
