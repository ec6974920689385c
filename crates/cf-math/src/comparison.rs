//! Floating-point comparison utilities.

use cf_core::Real;

/// Relative change `|new - old| / max(|old|, floor)`.
///
/// Used by the optimizers' function and step tolerance checks.
#[inline]
pub fn relative_change(old: Real, new: Real, floor: Real) -> Real {
    (new - old).abs() / old.abs().max(floor)
}

/// Equality that also treats two NaNs as equal.
///
/// Parameter declarations compare bounds with this; re-declaring
/// `(-inf, inf)` or identical finite bounds counts as the same.
#[inline]
pub fn same_value(a: Real, b: Real) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_change_uses_floor() {
        assert!((relative_change(2.0, 3.0, 1e-12) - 0.5).abs() < 1e-15);
        assert!((relative_change(0.0, 1e-3, 1.0) - 1e-3).abs() < 1e-15);
    }

    #[test]
    fn same_value_handles_infinities_and_nan() {
        assert!(same_value(f64::INFINITY, f64::INFINITY));
        assert!(same_value(f64::NAN, f64::NAN));
        assert!(!same_value(f64::NEG_INFINITY, f64::INFINITY));
    }
}
