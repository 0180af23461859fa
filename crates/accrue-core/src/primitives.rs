//! Multiplier primitives shared by every reward formula.
//!
//! Pure computation: no storage, no IO. Every function is total: bad input
//! (negative, NaN, infinite) maps to a documented value instead of panicking
//! or propagating NaN into a rate.

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::constants::REGRESSION_FLOOR;

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// `e^(-coefficient × x)`, floored at [`REGRESSION_FLOOR`].
///
/// Negative or non-finite `x` and `coefficient` are treated as zero, so the
/// result is always in `[REGRESSION_FLOOR, 1.0]`.
///
/// # Examples
///
/// ```
/// use accrue_core::primitives::exponential_regression;
///
/// assert_eq!(exponential_regression(0.0, 0.001), 1.0);
/// assert!((exponential_regression(1000.0, 0.001) - (-1.0f64).exp()).abs() < 1e-12);
/// assert_eq!(exponential_regression(1e12, 1.0), 0.0001);
/// ```
pub fn exponential_regression(x: f64, coefficient: f64) -> f64 {
    exponential_regression_floored(x, coefficient, REGRESSION_FLOOR)
}

/// Same as [`exponential_regression`] with an explicit floor.
pub fn exponential_regression_floored(x: f64, coefficient: f64, floor: f64) -> f64 {
    let x = non_negative(x);
    let coefficient = non_negative(coefficient);
    let floor = clamp(floor, 0.0, 1.0);
    (-coefficient * x).exp().max(floor).min(1.0)
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

// ---------------------------------------------------------------------------
// Tier lookup
// ---------------------------------------------------------------------------

/// Index of the tier whose half-open interval `[lower, next_lower)` contains
/// `value`. The last tier is unbounded above.
///
/// `lower_bounds` must be ascending. Returns `None` when `value` is below the
/// first bound (or NaN).
///
/// # Examples
///
/// ```
/// use accrue_core::primitives::tier_lookup;
///
/// let bounds = [0.0, 1_000.0, 5_000.0];
/// assert_eq!(tier_lookup(999.9, &bounds), Some(0));
/// assert_eq!(tier_lookup(1_000.0, &bounds), Some(1));
/// assert_eq!(tier_lookup(1e9, &bounds), Some(2));
/// assert_eq!(tier_lookup(-1.0, &bounds), None);
/// ```
pub fn tier_lookup(value: f64, lower_bounds: &[f64]) -> Option<usize> {
    let idx = lower_bounds.partition_point(|b| *b <= value);
    idx.checked_sub(1)
}

// ---------------------------------------------------------------------------
// Clamping and combination
// ---------------------------------------------------------------------------

/// Clamp `x` into `[min, max]`. NaN maps to `min`.
pub fn clamp<F: Float>(x: F, min: F, max: F) -> F {
    if x.is_nan() {
        return min;
    }
    x.max(min).min(max)
}

/// Named clamp range carried by each multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn apply(&self, x: f64) -> f64 {
        clamp(x, self.min, self.max)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }
}

/// Turn an additive bonus into a multiplicative factor: `+20%` → `1.2`.
pub fn bonus(fraction: f64) -> f64 {
    1.0 + fraction
}

/// Product of all factors. The empty product is `1.0`.
pub fn combine(factors: &[f64]) -> f64 {
    factors.iter().product()
}
