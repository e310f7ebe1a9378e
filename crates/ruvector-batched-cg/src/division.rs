//! Division that maps non-finite quotients to zero.
//!
//! Finished batch entries can carry a zero residual and a zero curvature, so
//! the CG step size becomes `0 / 0`. The same happens to `beta` when a
//! residual vanishes exactly. Zeroing those quotients keeps masked entries
//! frozen instead of spreading NaN through the batch.

use crate::element::Element;

/// `a / b`, with NaN and ±infinity replaced by zero.
#[inline]
pub fn nan_safe_div<T: Element>(a: T, b: T) -> T {
    let q = a / b;
    if q.is_finite() {
        q
    } else {
        T::zero()
    }
}

/// Elementwise [`nan_safe_div`]: `out[i] = a[i] / b[i]`.
///
/// # Panics
///
/// Panics if the three slices differ in length.
pub fn nan_safe_div_into<T: Element>(a: &[T], b: &[T], out: &mut [T]) {
    assert_eq!(a.len(), b.len(), "nan_safe_div_into: length mismatch");
    assert_eq!(a.len(), out.len(), "nan_safe_div_into: output length mismatch");
    for ((o, &ai), &bi) in out.iter_mut().zip(a).zip(b) {
        *o = nan_safe_div(ai, bi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn degenerate_quotients_are_zero() {
        assert_eq!(nan_safe_div(1.0f64, 0.0), 0.0);
        assert_eq!(nan_safe_div(-1.0f64, 0.0), 0.0);
        assert_eq!(nan_safe_div(0.0f64, 0.0), 0.0);
        assert_eq!(nan_safe_div(f64::INFINITY, 1.0), 0.0);
        assert_eq!(nan_safe_div(f64::NAN, 1.0), 0.0);
    }

    #[test]
    fn regular_quotient_passes_through() {
        assert_eq!(nan_safe_div(4.0f32, 2.0), 2.0);
        assert_eq!(nan_safe_div(1.0f64, f64::INFINITY), 0.0);
    }

    #[test]
    fn overflowing_quotient_is_zero() {
        assert_eq!(nan_safe_div(f32::MAX, 0.5), 0.0);
    }

    #[test]
    fn elementwise() {
        let a = [1.0f64, 0.0, 4.0, f64::INFINITY];
        let b = [0.0f64, 0.0, 2.0, 1.0];
        let mut out = [9.0f64; 4];
        nan_safe_div_into(&a, &b, &mut out);
        assert_eq!(out, [0.0, 0.0, 2.0, 0.0]);
    }

    proptest! {
        #[test]
        fn result_is_always_finite(a in proptest::num::f64::ANY, b in proptest::num::f64::ANY) {
            prop_assert!(nan_safe_div(a, b).is_finite());
        }

        #[test]
        fn matches_plain_division_when_finite(a in -1e6f64..1e6, b in 1e-3f64..1e3) {
            prop_assert_eq!(nan_safe_div(a, b), a / b);
        }
    }
}
