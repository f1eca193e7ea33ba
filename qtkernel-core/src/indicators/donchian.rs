//! Rolling high/low channel over a window that includes the current bar.

/// Channel statistics for one bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelState {
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

impl ChannelState {
    pub fn mid(&self) -> f64 {
        (self.max + self.min) / 2.0
    }

    pub fn half_width(&self) -> f64 {
        (self.max - self.min) / 2.0
    }

    /// Position of `value` inside the channel, scaled to [-1, 1].
    ///
    /// `None` for missing values or a zero-width channel.
    pub fn position(&self, value: f64) -> Option<f64> {
        let half = self.half_width();
        if value.is_nan() || !(half > 0.0) {
            return None;
        }
        Some((value - self.mid()) / half)
    }
}

pub fn rolling_channel(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<ChannelState>> {
    let window = window.max(1);
    let min_periods = min_periods.max(1);

    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let mut state = ChannelState {
                max: f64::NEG_INFINITY,
                min: f64::INFINITY,
                count: 0,
            };
            for &v in values[start..=i].iter().filter(|v| !v.is_nan()) {
                state.max = state.max.max(v);
                state.min = state.min.min(v);
                state.count += 1;
            }
            (state.count >= min_periods).then_some(state)
        })
        .collect()
}
