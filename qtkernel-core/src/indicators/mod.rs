//! Rolling window statistics consumed by the band signal generators.
//!
//! Only the statistics the state machines need are computed here: a rolling
//! mean/std band and a rolling high/low channel. Both skip missing values
//! inside the window and report `None` until `min_periods` valid values exist.

pub mod bollinger;
pub mod donchian;

pub use bollinger::{rolling_band, BandState};
pub use donchian::{rolling_channel, ChannelState};

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Element-wise `assert_approx` that also treats NaN == NaN.
#[cfg(test)]
pub fn assert_series_approx(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len(), "series length differs");
    for (i, (&a, &e)) in actual.iter().zip(expected).enumerate() {
        if e.is_nan() {
            assert!(a.is_nan(), "index {i}: expected NaN, got {a}");
            continue;
        }
        assert!(
            (a - e).abs() < epsilon,
            "index {i}: actual={a}, expected={e}, diff={}",
            (a - e).abs()
        );
    }
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
