//! Solver configuration.
//!
//! [`CgConfig`] carries the tolerances together with the stabilisation
//! constants of the iteration. The divergence ratio, the divergence guard and
//! the residual re-synchronisation period are empirical; they default to 100,
//! 8 and 50 and can be overridden per session.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default residual² growth ratio that flags an entry as diverged.
pub const DEFAULT_DIVERGENCE_RATIO: f64 = 100.0;

/// Default number of iterations before divergence may be flagged.
pub const DEFAULT_DIVERGENCE_MIN_ITERATIONS: u32 = 8;

/// Default period (in loop iterations) of the exact residual recompute.
pub const DEFAULT_RESYNC_INTERVAL: u32 = 50;

/// Configuration of a batched CG solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CgConfig {
    /// Relative tolerance on the residual norm.
    pub rtol: f64,
    /// Absolute tolerance on the residual norm.
    pub atol: f64,
    /// An entry diverges once `|r|^2 / |r_0|^2` exceeds this value.
    pub divergence_ratio: f64,
    /// Divergence is never flagged before an entry has taken this many
    /// iterations.
    pub divergence_min_iterations: u32,
    /// Every `resync_interval`-th loop iteration recomputes the residual as
    /// `y - A x` instead of using the recurrence. `0` disables it.
    pub resync_interval: u32,
    /// Emit one snapshot per iteration instead of a single final snapshot.
    pub record_trajectory: bool,
}

impl Default for CgConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-5,
            divergence_ratio: DEFAULT_DIVERGENCE_RATIO,
            divergence_min_iterations: DEFAULT_DIVERGENCE_MIN_ITERATIONS,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            record_trajectory: false,
        }
    }
}

impl CgConfig {
    /// Config with the given tolerances and default stabilisation constants.
    pub fn new(rtol: f64, atol: f64) -> Self {
        Self {
            rtol,
            atol,
            ..Self::default()
        }
    }

    pub fn with_tolerances(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_divergence(mut self, ratio: f64, min_iterations: u32) -> Self {
        self.divergence_ratio = ratio;
        self.divergence_min_iterations = min_iterations;
        self
    }

    pub fn with_resync_interval(mut self, interval: u32) -> Self {
        self.resync_interval = interval;
        self
    }

    pub fn with_trajectory(mut self, record: bool) -> Self {
        self.record_trajectory = record;
        self
    }

    /// Check that the tolerances are finite and non-negative and that the
    /// divergence ratio is finite and positive.
    ///
    /// # Errors
    ///
    /// [`ValidationError::ParameterOutOfRange`] naming the offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [("rtol", self.rtol), ("atol", self.atol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::ParameterOutOfRange {
                    name: name.into(),
                    value: format!("{value:.2e}"),
                    expected: "finite and >= 0".into(),
                });
            }
        }

        if !self.divergence_ratio.is_finite() || self.divergence_ratio <= 0.0 {
            return Err(ValidationError::ParameterOutOfRange {
                name: "divergence_ratio".into(),
                value: self.divergence_ratio.to_string(),
                expected: "finite and > 0".into(),
            });
        }

        Ok(())
    }
}
