//! Bollinger breakout that waits for a pull-back before entering.
//!
//! A band crossing arms an entry and starts tracking the most extreme `z`
//! reached since. The entry fires once `z` has retraced at least
//! `delay_open_width` from that extreme while still beyond the close
//! threshold, or at once when `z` runs past `chase_bound`. Reverting through
//! the close threshold disarms it. Closes follow the plain boll rules.

use serde::{Deserialize, Serialize};

use super::band::Thresholds;
use super::filter::{self, flags_at, FilterFlags, StrategyFilter};
use super::{BandParams, SignalGenerator, SignalValues};
use crate::domain::Side;
use crate::error::KernelError;
use crate::indicators::rolling_band;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayBollConfig {
    /// `(window, open_width, close_width, stop_width)`.
    pub params: BandParams,
    pub delay_open_width: f64,
    #[serde(default)]
    pub chase_bound: Option<f64>,
    #[serde(default)]
    pub min_periods: Option<usize>,
    #[serde(default)]
    pub rev: bool,
    #[serde(flatten)]
    pub signals: SignalValues,
}

impl DelayBollConfig {
    pub fn new(params: BandParams, delay_open_width: f64) -> Self {
        Self {
            params,
            delay_open_width,
            chase_bound: None,
            min_periods: None,
            rev: false,
            signals: SignalValues::default(),
        }
    }

    pub fn with_chase_bound(mut self, chase_bound: f64) -> Self {
        self.chase_bound = Some(chase_bound);
        self
    }

    fn validate(&self) -> Result<(), KernelError> {
        self.params.validate()?;
        self.signals.validate()?;
        if !(self.delay_open_width >= 0.0) || !self.delay_open_width.is_finite() {
            return Err(KernelError::invalid("delay_open_width", "must be finite and >= 0"));
        }
        if let Some(b) = self.chase_bound {
            if !(b >= self.params.open_width) {
                return Err(KernelError::invalid(
                    "chase_bound",
                    format!("must be >= open_width ({}), got {b}", self.params.open_width),
                ));
            }
        }
        Ok(())
    }
}

impl SignalGenerator for DelayBollConfig {
    fn name(&self) -> &'static str {
        "delay_boll"
    }

    fn generate(
        &self,
        factor: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.validate()?;
        let filter = filter::prepare(filter, factor.len(), self.rev)?;

        let p = self.params;
        let th = Thresholds {
            open: p.open_width,
            close: p.close_width,
            stop: p.extra,
        };
        let bands = rolling_band(factor, p.window, p.min_periods(self.min_periods));
        let mut machine = PullbackMachine::new(
            self.signals.oriented(self.rev),
            self.delay_open_width,
            self.chase_bound,
        );

        Ok(bands
            .iter()
            .enumerate()
            .map(|(i, band)| match band {
                None => f64::NAN,
                Some(b) => match b.zscore(factor[i]) {
                    Some(z) => machine.step(z, th, flags_at(filter.as_ref(), i)),
                    None => machine.prev,
                },
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct PullbackMachine {
    values: SignalValues,
    pullback: f64,
    chase_bound: Option<f64>,
    prev: f64,
    last_z: f64,
    /// Armed side and the extreme `z` seen since the crossing.
    pending: Option<(Side, f64)>,
}

impl PullbackMachine {
    fn new(values: SignalValues, pullback: f64, chase_bound: Option<f64>) -> Self {
        Self {
            values,
            pullback,
            chase_bound,
            prev: values.close,
            last_z: 0.0,
            pending: None,
        }
    }

    fn step(&mut self, z: f64, th: Thresholds, flags: FilterFlags) -> f64 {
        let v = self.values;
        let (o, c) = (th.open, th.close);
        let last = self.last_z;

        if last < o && z >= o {
            self.pending = Some((Side::Long, z));
        } else if last > -o && z <= -o {
            self.pending = Some((Side::Short, z));
        } else {
            self.pending = match self.pending {
                Some((Side::Long, ext)) if z > c => Some((Side::Long, ext.max(z))),
                Some((Side::Short, ext)) if z < -c => Some((Side::Short, ext.min(z))),
                _ => None,
            };
        }

        let mut next = self.prev;
        let mut opened = false;
        if let Some((side, ext)) = self.pending {
            let (target, allowed, pulled, chased) = match side {
                Side::Long => (
                    v.long,
                    flags.long_open,
                    ext - z >= self.pullback,
                    self.chase_bound.is_some_and(|b| z >= b),
                ),
                Side::Short => (
                    v.short,
                    flags.short_open,
                    z - ext >= self.pullback,
                    self.chase_bound.is_some_and(|b| z <= -b),
                ),
            };
            if self.prev == target {
                self.pending = None;
            } else if allowed && (pulled || chased) {
                next = target;
                opened = true;
                self.pending = None;
            }
        }

        if !opened {
            if self.prev == v.long {
                let reverted = last > c && z <= c;
                if reverted || flags.long_stop || th.stop.is_some_and(|s| z > s) {
                    next = v.close;
                }
            } else if self.prev == v.short {
                let reverted = last < -c && z >= -c;
                if reverted || flags.short_stop || th.stop.is_some_and(|s| z < -s) {
                    next = v.close;
                }
            }
        }

        self.prev = next;
        self.last_z = z;
        next
    }
}
