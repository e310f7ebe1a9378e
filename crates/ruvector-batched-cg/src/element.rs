//! Supported numeric element types.
//!
//! The solver is generic over [`Element`], a sealed trait implemented for
//! `f32` and `f64` only. Untyped input arrives as [`RawValues`], a closed enum
//! over the element types the crate understands; converting it into a typed
//! container fails with [`SolverError::TypeMismatch`] instead of guessing.

use std::fmt;
use std::ops::{AddAssign, SubAssign};

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::error::{SolverError, ValidationError};

/// Element type tag for raw data and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DType {
    /// 32-bit IEEE float.
    F32,
    /// 64-bit IEEE float.
    F64,
    /// 32-bit signed integer (CSR offsets and column indices).
    I32,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
            DType::I32 => write!(f, "i32"),
        }
    }
}

/// Untyped numeric data as handed over by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValues {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
}

impl RawValues {
    /// Element type of the payload.
    pub fn dtype(&self) -> DType {
        match self {
            RawValues::F32(_) => DType::F32,
            RawValues::F64(_) => DType::F64,
            RawValues::I32(_) => DType::I32,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            RawValues::F32(v) => v.len(),
            RawValues::F64(v) => v.len(),
            RawValues::I32(v) => v.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert 32-bit integer data into `usize` indices.
    ///
    /// # Errors
    ///
    /// [`SolverError::TypeMismatch`] for float payloads, and
    /// [`ValidationError::NegativeIndex`] for negative entries.
    pub fn into_indices(self) -> Result<Vec<usize>, SolverError> {
        match self {
            RawValues::I32(v) => v
                .into_iter()
                .enumerate()
                .map(|(position, value)| {
                    usize::try_from(value).map_err(|_| {
                        SolverError::from(ValidationError::NegativeIndex {
                            position,
                            value: value as i64,
                        })
                    })
                })
                .collect(),
            other => Err(SolverError::TypeMismatch {
                expected: DType::I32,
                found: other.dtype(),
            }),
        }
    }
}

impl From<Vec<f32>> for RawValues {
    fn from(v: Vec<f32>) -> Self {
        RawValues::F32(v)
    }
}

impl From<Vec<f64>> for RawValues {
    fn from(v: Vec<f64>) -> Self {
        RawValues::F64(v)
    }
}

impl From<Vec<i32>> for RawValues {
    fn from(v: Vec<i32>) -> Self {
        RawValues::I32(v)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Floating-point element type the solver can run on.
///
/// Sealed: only `f32` and `f64` implement it. The reduction helpers use a
/// 4-wide accumulator to shorten the dependency chain; reductions never mix
/// data from different batch entries.
pub trait Element:
    Float + Default + fmt::Debug + AddAssign + SubAssign + Send + Sync + sealed::Sealed + 'static
{
    /// Type tag matching this element.
    const DTYPE: DType;

    /// Take ownership of raw data if it carries this element type.
    fn from_raw(raw: RawValues) -> Result<Vec<Self>, SolverError>;

    /// Convert a configuration scalar into this element type.
    fn from_f64(v: f64) -> Self;

    /// Widen to `f64` for logging and events.
    fn as_f64(self) -> f64;

    /// Dot product `a . b`.
    #[inline]
    fn dot(a: &[Self], b: &[Self]) -> Self {
        assert_eq!(a.len(), b.len(), "dot: length mismatch");

        let chunks = a.len() / 4;
        let mut acc = [Self::zero(); 4];
        for i in 0..chunks {
            let j = i * 4;
            acc[0] += a[j] * b[j];
            acc[1] += a[j + 1] * b[j + 1];
            acc[2] += a[j + 2] * b[j + 2];
            acc[3] += a[j + 3] * b[j + 3];
        }
        for j in chunks * 4..a.len() {
            acc[0] += a[j] * b[j];
        }

        (acc[0] + acc[1]) + (acc[2] + acc[3])
    }

    /// Squared L2 norm.
    #[inline]
    fn sum_squares(a: &[Self]) -> Self {
        Self::dot(a, a)
    }

    /// `y += alpha * x`.
    #[inline]
    fn axpy(alpha: Self, x: &[Self], y: &mut [Self]) {
        assert_eq!(x.len(), y.len(), "axpy: length mismatch");
        for (yi, &xi) in y.iter_mut().zip(x) {
            *yi += alpha * xi;
        }
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn from_raw(raw: RawValues) -> Result<Vec<Self>, SolverError> {
        match raw {
            RawValues::F32(v) => Ok(v),
            other => Err(SolverError::TypeMismatch {
                expected: DType::F32,
                found: other.dtype(),
            }),
        }
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn from_raw(raw: RawValues) -> Result<Vec<Self>, SolverError> {
        match raw {
            RawValues::F64(v) => Ok(v),
            other => Err(SolverError::TypeMismatch {
                expected: DType::F64,
                found: other.dtype(),
            }),
        }
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}
