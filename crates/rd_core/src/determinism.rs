//! Determinism utilities: total orders over floats.
//!
//! This module is **I/O-free**. Every sort in the engine that involves
//! quantities goes through these comparators so NaN never breaks ordering.

use core::cmp::Ordering;

/* -------------------------------------------------------------------------- */
/*                               Float ordering                               */
/* -------------------------------------------------------------------------- */

/// Ascending total order on f64.
#[inline]
pub fn cmp_f64_asc(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

/// Descending total order on f64.
#[inline]
pub fn cmp_f64_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

/* ---------------------------------- Tests --------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_orders_are_total() {
        let mut v = vec![2.0, f64::NAN, -1.0, 5.5];
        v.sort_by(|a, b| cmp_f64_desc(*a, *b));
        assert!(v[0].is_nan());
        assert_eq!(&v[1..], &[5.5, 2.0, -1.0]);
        assert_eq!(cmp_f64_asc(1.0, 2.0), Ordering::Less);
    }
}
