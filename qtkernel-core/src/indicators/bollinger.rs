//! Rolling mean / sample standard deviation band.
//!
//! For each bar the window covers the last `window` values including the
//! current one. NaN values are skipped, so a window may hold fewer than
//! `window` valid observations. Std uses the sample estimator (ddof = 1),
//! which is undefined (NaN) for a single observation.

/// Band statistics for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandState {
    pub mean: f64,
    pub std: f64,
    /// Number of valid observations in the window.
    pub count: usize,
}

impl BandState {
    /// Distance of `value` from the mean in units of std.
    ///
    /// `None` when the value is missing or the std is undefined or zero.
    pub fn zscore(&self, value: f64) -> Option<f64> {
        if value.is_nan() || !(self.std > 0.0) {
            return None;
        }
        Some((value - self.mean) / self.std)
    }
}

/// Compute the band for every bar. Bars with fewer than `min_periods` valid
/// values in their window are `None`.
pub fn rolling_band(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<BandState>> {
    let window = window.max(1);
    let min_periods = min_periods.max(1);

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];

            let (count, sum) = slice
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0usize, 0.0), |(c, s), &v| (c + 1, s + v));
            if count < min_periods {
                return None;
            }

            let mean = sum / count as f64;
            let std = if count > 1 {
                let ss: f64 = slice
                    .iter()
                    .filter(|v| !v.is_nan())
                    .map(|&v| (v - mean) * (v - mean))
                    .sum();
                (ss / (count - 1) as f64).sqrt()
            } else {
                f64::NAN
            };

            Some(BandState { mean, std, count })
        })
        .collect()
}
