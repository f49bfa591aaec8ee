//! Float ordering for sort keys.
//!
//! Leaderboard ranks and pick tie-breaks both sort on `f64`; the order must
//! not depend on the sign of zero or on which NaN payload arrived.

use core::cmp::Ordering;

/// Collapse `-0.0` onto `0.0` and every NaN onto one NaN.
pub fn canonical_f64(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else if v.is_nan() {
        f64::NAN
    } else {
        v
    }
}

/// Total order over canonicalized values; NaN sorts above every number.
pub fn stable_total_cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}
