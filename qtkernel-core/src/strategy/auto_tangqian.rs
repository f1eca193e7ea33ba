//! Donchian channel breakout with adaptive open width.
//!
//! The factor is placed inside its rolling high/low channel,
//! `z = (factor - mid) / half_width` in [-1, 1]. Crossing `±open_width` opens,
//! crossing back through the midline closes. Open width adapts to recent trade
//! performance exactly as in auto_boll. There is no delayed open and no stop
//! width.

use serde::{Deserialize, Serialize};

use super::band::{BandMachine, PosMap, Thresholds, TradeTracker};
use super::filter::{self, flags_at, StrategyFilter};
use super::{SignalGenerator, SignalValues};
use crate::error::KernelError;
use crate::indicators::rolling_channel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTangqianConfig {
    pub window: usize,
    pub open_width: f64,
    #[serde(default)]
    pub trade_num: Option<usize>,
    #[serde(default)]
    pub pos_map: Option<PosMap>,
    #[serde(default)]
    pub min_periods: Option<usize>,
    #[serde(default)]
    pub rev: bool,
    #[serde(flatten)]
    pub signals: SignalValues,
}

impl AutoTangqianConfig {
    pub fn new(window: usize, open_width: f64) -> Self {
        Self {
            window,
            open_width,
            trade_num: None,
            pos_map: None,
            min_periods: None,
            rev: false,
            signals: SignalValues::default(),
        }
    }

    pub fn with_pos_map(mut self, trade_num: usize, pos_map: PosMap) -> Self {
        self.trade_num = Some(trade_num);
        self.pos_map = Some(pos_map);
        self
    }

    fn validate(&self) -> Result<(), KernelError> {
        if self.window == 0 {
            return Err(KernelError::invalid("window", "must be >= 1"));
        }
        if !(self.open_width > 0.0 && self.open_width <= 1.0) {
            return Err(KernelError::invalid(
                "open_width",
                format!("must be in (0, 1] for a channel position, got {}", self.open_width),
            ));
        }
        if self.trade_num == Some(0) {
            return Err(KernelError::invalid("trade_num", "must be >= 1"));
        }
        if let Some(map) = &self.pos_map {
            map.validate()?;
        }
        self.signals.validate()
    }
}

impl SignalGenerator for AutoTangqianConfig {
    fn name(&self) -> &'static str {
        "auto_tangqian"
    }

    fn generate(
        &self,
        factor: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.validate()?;
        let filter = filter::prepare(filter, factor.len(), self.rev)?;

        let values = self.signals.oriented(self.rev);
        let min_periods = self.min_periods.unwrap_or(self.window / 2).max(1);
        let channels = rolling_channel(factor, self.window, min_periods);
        let mut machine = BandMachine::new(values, false);
        let mut tracker = TradeTracker::new(self.trade_num.unwrap_or(0));

        let mut out = Vec::with_capacity(factor.len());
        for (i, channel) in channels.iter().enumerate() {
            let Some(ch) = channel else {
                out.push(f64::NAN);
                continue;
            };
            let th = Thresholds {
                open: tracker.open_width(self.open_width, self.pos_map.as_ref()),
                close: 0.0,
                stop: None,
            };
            let prev = machine.signal();
            let next = machine.step(ch.position(factor[i]), th, flags_at(filter.as_ref(), i));
            tracker.record(prev, next, factor[i], values.close);
            out.push(next);
        }
        Ok(out)
    }
}
