//! Bollinger breakout with a return-volatility exit.
//!
//! Band params are `(window, open_width, close_width, vol_k)`. Entries and
//! midline exits follow boll, except that with `delay_open` the open is
//! level based: any bar beyond the open band opens once the side's filter
//! allows. An open position also closes when the factor moves
//! `vol_k · ret_vol` away from its entry value in either direction, which
//! acts as take-profit and stop at once.

use serde::{Deserialize, Serialize};

use super::boll::default_true;
use super::filter::{self, flags_at, FilterFlags, StrategyFilter};
use super::{BandParams, SignalValues};
use crate::error::{check_len, KernelError};
use crate::indicators::rolling_band;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BollVolStopConfig {
    /// `(window, open_width, close_width, vol_k)`. Without `vol_k` there is
    /// no volatility exit.
    pub params: BandParams,
    #[serde(default)]
    pub min_periods: Option<usize>,
    #[serde(default = "default_true")]
    pub delay_open: bool,
    #[serde(default)]
    pub rev: bool,
    #[serde(flatten)]
    pub signals: SignalValues,
}

impl BollVolStopConfig {
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

    pub fn name(&self) -> &'static str {
        "boll_vol_stop"
    }

    /// Run over `factor` with a per-bar return volatility. Missing
    /// volatility disables the volatility exit for that bar only.
    pub fn generate(
        &self,
        factor: &[f64],
        ret_vol: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.params.validate()?;
        self.signals.validate()?;
        if self.params.extra.is_some_and(|k| !(k > 0.0) || !k.is_finite()) {
            return Err(KernelError::invalid("vol_k", "must be finite and > 0"));
        }
        check_len("ret_vol", factor.len(), ret_vol.len())?;
        let filter = filter::prepare(filter, factor.len(), self.rev)?;

        let p = self.params;
        let bands = rolling_band(factor, p.window, p.min_periods(self.min_periods));
        let mut machine = VolStopMachine::new(
            self.signals.oriented(self.rev),
            p.open_width,
            p.close_width,
            p.extra,
            self.delay_open,
        );

        Ok(bands
            .iter()
            .enumerate()
            .map(|(i, band)| match band {
                None => f64::NAN,
                Some(b) => machine.step(
                    b.zscore(factor[i]),
                    factor[i],
                    ret_vol[i],
                    flags_at(filter.as_ref(), i),
                ),
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct VolStopMachine {
    values: SignalValues,
    open: f64,
    close: f64,
    vol_k: Option<f64>,
    delay_open: bool,
    prev: f64,
    last_z: f64,
    entry: f64,
}

impl VolStopMachine {
    fn new(values: SignalValues, open: f64, close: f64, vol_k: Option<f64>, delay_open: bool) -> Self {
        Self {
            values,
            open,
            close,
            vol_k,
            delay_open,
            prev: values.close,
            last_z: 0.0,
            entry: f64::NAN,
        }
    }

    fn step(&mut self, z: Option<f64>, factor: f64, vol: f64, flags: FilterFlags) -> f64 {
        let Some(z) = z else {
            return self.prev;
        };
        let v = self.values;
        let (o, c, last) = (self.open, self.close, self.last_z);

        let long_open = self.prev != v.long
            && z >= o
            && flags.long_open
            && (self.delay_open || last < o);
        let short_open = self.prev != v.short
            && z <= -o
            && flags.short_open
            && (self.delay_open || last > -o);

        let mut next = self.prev;
        if long_open {
            next = v.long;
            self.entry = factor;
        } else if short_open {
            next = v.short;
            self.entry = factor;
        } else if self.prev != v.close {
            let reverted = if self.prev == v.long {
                (last > c && z <= c) || flags.long_stop
            } else {
                (last < -c && z >= -c) || flags.short_stop
            };
            let vol_exit = match self.vol_k {
                Some(k) if !vol.is_nan() && !self.entry.is_nan() => {
                    factor >= self.entry + k * vol || factor <= self.entry - k * vol
                }
                _ => false,
            };
            if reverted || vol_exit {
                next = v.close;
                self.entry = f64::NAN;
            }
        }

        self.prev = next;
        self.last_z = z;
        next
    }
}
