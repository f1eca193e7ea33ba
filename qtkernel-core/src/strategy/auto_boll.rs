//! Bollinger breakout with an open width chosen from recent performance.
//!
//! The fourth band parameter is the number of closed trades to average.
//! Each closed trade scores `(exit_factor - entry_factor) · sign(signal)`; the
//! mean of the last `trade_num` scores picks the next open width from
//! `pos_map`. Until enough trades exist (or without a map) the configured
//! `open_width` is used.

use serde::{Deserialize, Serialize};

use super::band::{BandMachine, PosMap, Thresholds, TradeTracker};
use super::boll::default_true;
use super::filter::{self, flags_at, StrategyFilter};
use super::params::extra_as_count;
use super::{BandParams, SignalGenerator, SignalValues};
use crate::error::KernelError;
use crate::indicators::rolling_band;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoBollConfig {
    /// `(window, open_width, close_width, trade_num)`.
    pub params: BandParams,
    #[serde(default)]
    pub pos_map: Option<PosMap>,
    #[serde(default)]
    pub min_periods: Option<usize>,
    #[serde(default = "default_true")]
    pub delay_open: bool,
    #[serde(default)]
    pub rev: bool,
    #[serde(flatten)]
    pub signals: SignalValues,
}

impl AutoBollConfig {
    pub fn new(params: BandParams, pos_map: Option<PosMap>) -> Self {
        Self {
            params,
            pos_map,
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
}

impl SignalGenerator for AutoBollConfig {
    fn name(&self) -> &'static str {
        "auto_boll"
    }

    fn generate(
        &self,
        factor: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.params.validate()?;
        self.signals.validate()?;
        if let Some(map) = &self.pos_map {
            map.validate()?;
        }
        let trade_num = extra_as_count("trade_num", self.params.extra)?.unwrap_or(0);
        let filter = filter::prepare(filter, factor.len(), self.rev)?;

        let p = self.params;
        let values = self.signals.oriented(self.rev);
        let bands = rolling_band(factor, p.window, p.min_periods(self.min_periods));
        let mut machine = BandMachine::new(values, self.delay_open);
        let mut tracker = TradeTracker::new(trade_num);

        let mut out = Vec::with_capacity(factor.len());
        for (i, band) in bands.iter().enumerate() {
            let Some(b) = band else {
                out.push(f64::NAN);
                continue;
            };
            let th = Thresholds {
                open: tracker.open_width(p.open_width, self.pos_map.as_ref()),
                close: p.close_width,
                stop: None,
            };
            let prev = machine.signal();
            let next = machine.step(b.zscore(factor[i]), th, flags_at(filter.as_ref(), i));
            tracker.record(prev, next, factor[i], values.close);
            out.push(next);
        }
        Ok(out)
    }
}
