//! Bollinger band mean/std breakout.
//!
//! Opens when the factor crosses outside `mean ± open_width·std`, closes when
//! it reverts through `mean ± close_width·std`, and optionally stops out
//! beyond `mean ± stop_width·std` (the fourth band parameter).

use serde::{Deserialize, Serialize};

use super::band::{BandMachine, Thresholds};
use super::filter::{self, flags_at, StrategyFilter};
use super::{BandParams, SignalGenerator, SignalValues};
use crate::error::KernelError;
use crate::indicators::rolling_band;

pub(crate) fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollConfig {
    /// `(window, open_width, close_width, stop_width)`.
    pub params: BandParams,
    #[serde(default)]
    pub min_periods: Option<usize>,
    /// Keep a filter-blocked open armed until the filter clears.
    #[serde(default = "default_true")]
    pub delay_open: bool,
    /// Trade against the band: swap long/short signals and filter roles.
    #[serde(default)]
    pub rev: bool,
    #[serde(flatten)]
    pub signals: SignalValues,
}

impl BollConfig {
    pub fn new(params: BandParams) -> Self {
        Self {
            params,
            min_periods: None,
            delay_open: true,
            rev: false,
            signals: SignalValues::default(),
        }
    }

    pub fn with_delay_open(mut self, delay_open: bool) -> Self {
        self.delay_open = delay_open;
        self
    }

    pub fn with_rev(mut self, rev: bool) -> Self {
        self.rev = rev;
        self
    }

    pub fn with_min_periods(mut self, min_periods: usize) -> Self {
        self.min_periods = Some(min_periods);
        self
    }

    pub fn with_signals(mut self, signals: SignalValues) -> Self {
        self.signals = signals;
        self
    }
}

impl SignalGenerator for BollConfig {
    fn name(&self) -> &'static str {
        "boll"
    }

    fn generate(
        &self,
        factor: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.params.validate()?;
        self.signals.validate()?;
        if self.params.extra.is_some_and(|s| !s.is_finite()) {
            return Err(KernelError::invalid("stop_width", "must be finite"));
        }
        let filter = filter::prepare(filter, factor.len(), self.rev)?;

        let p = self.params;
        let th = Thresholds {
            open: p.open_width,
            close: p.close_width,
            stop: p.extra,
        };
        let bands = rolling_band(factor, p.window, p.min_periods(self.min_periods));
        let mut machine = BandMachine::new(self.signals.oriented(self.rev), self.delay_open);

        Ok(bands
            .iter()
            .enumerate()
            .map(|(i, band)| match band {
                None => f64::NAN,
                Some(b) => machine.step(b.zscore(factor[i]), th, flags_at(filter.as_ref(), i)),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAC: [f64; 20] = [
        10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 13.0, 14.0, 10.0, 7.0, 5.0, 4.0, 3.0,
        4.0, 4.0, 3.0, 2.0,
    ];

    fn boll_4_1() -> BollConfig {
        BollConfig::new(BandParams::new(4, 1.0)).with_delay_open(false)
    }

    #[test]
    fn warmup_bar_is_missing() {
        let out = boll_4_1().generate(&FAC, None).unwrap();
        assert!(out[0].is_nan());
        assert!(out[1..].iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn breakout_sequence() {
        let out = boll_4_1().generate(&FAC, None).unwrap();
        let expected = [
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 0.0,
            0.0, 0.0, -1.0,
        ];
        assert_eq!(&out[1..], &expected);
    }

    #[test]
    fn reversed_without_filters_mirrors_output() {
        let fwd = boll_4_1().generate(&FAC, None).unwrap();
        let rev = boll_4_1().with_rev(true).generate(&FAC, None).unwrap();
        for (a, b) in fwd.iter().zip(&rev).skip(1) {
            assert_eq!(*a, -*b);
        }
    }

    #[test]
    fn missing_factor_holds_signal() {
        let mut fac = FAC;
        fac[10] = f64::NAN;
        let out = boll_4_1().generate(&fac, None).unwrap();
        // long opened at bar 9 survives the missing bar
        assert_eq!(out[9], 1.0);
        assert_eq!(out[10], 1.0);
    }

    #[test]
    fn custom_signal_values() {
        let signals = SignalValues {
            long: 0.5,
            short: -0.5,
            close: 0.0,
        };
        let out = boll_4_1().with_signals(signals).generate(&FAC, None).unwrap();
        assert_eq!(out[9], 0.5);
        assert_eq!(out[11], -0.5);
    }

    #[test]
    fn filter_length_checked() {
        let short = [true; 3];
        let f = StrategyFilter::new(&short, &short, &short, &short);
        let err = boll_4_1().generate(&FAC, Some(&f)).unwrap_err();
        assert!(matches!(err, KernelError::LengthMismatch { .. }));
    }

    #[test]
    fn empty_factor_gives_empty_output() {
        assert!(boll_4_1().generate(&[], None).unwrap().is_empty());
    }
}
