//! crates/rd_core/src/rounding.rs
//! Numeric policy: needs and remaining quantities round up, availability
//! rounds down. Non-finite and non-positive inputs collapse to zero.

/// `ceil(x)` as whole units; 0 for NaN or x ≤ 0.
#[inline]
pub fn ceil_units(x: f64) -> u64 {
    if !(x > 0.0) {
        return 0;
    }
    if x.is_infinite() {
        return u64::MAX;
    }
    x.ceil() as u64
}

/// `floor(x)` as whole units; 0 for NaN or x ≤ 0.
#[inline]
pub fn floor_units(x: f64) -> u64 {
    if !(x > 0.0) {
        return 0;
    }
    if x.is_infinite() {
        return u64::MAX;
    }
    x.floor() as u64
}

/// `ceil(max(0, x))` kept in f64 for running totals.
#[inline]
pub fn ceil_non_negative(x: f64) -> f64 {
    if !(x > 0.0) {
        0.0
    } else {
        x.ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_policy() {
        assert_eq!(ceil_units(2.1), 3);
        assert_eq!(ceil_units(2.0), 2);
        assert_eq!(ceil_units(0.0), 0);
        assert_eq!(ceil_units(-1.5), 0);
        assert_eq!(ceil_units(f64::NAN), 0);
    }

    #[test]
    fn floor_policy() {
        assert_eq!(floor_units(7.9), 7);
        assert_eq!(floor_units(0.4), 0);
        assert_eq!(floor_units(-3.0), 0);
    }

    #[test]
    fn ceil_non_negative_clips() {
        assert_eq!(ceil_non_negative(4.2), 5.0);
        assert_eq!(ceil_non_negative(-0.5), 0.0);
        assert_eq!(ceil_non_negative(f64::NAN), 0.0);
    }
}
