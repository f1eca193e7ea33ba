//! Shared band state machine for the boll family.
//!
//! The machine works on a normalized factor `z` (distance from the band
//! centre in band units) so the same transitions serve the std band of
//! boll/auto_boll and the high/low channel of auto_tangqian.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::filter::FilterFlags;
use super::SignalValues;
use crate::domain::{signum, Side};
use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Thresholds {
    pub open: f64,
    pub close: f64,
    pub stop: Option<f64>,
}

/// Per-run scratch state of the band state machine.
#[derive(Debug, Clone)]
pub(crate) struct BandMachine {
    values: SignalValues,
    delay_open: bool,
    prev: f64,
    last_z: f64,
    pending: Option<Side>,
}

impl BandMachine {
    pub fn new(values: SignalValues, delay_open: bool) -> Self {
        Self {
            values,
            delay_open,
            prev: values.close,
            last_z: 0.0,
            pending: None,
        }
    }

    pub fn signal(&self) -> f64 {
        self.prev
    }

    /// Advance one bar. A bar without a usable `z` holds the previous signal.
    pub fn step(&mut self, z: Option<f64>, th: Thresholds, flags: FilterFlags) -> f64 {
        let Some(z) = z else {
            return self.prev;
        };
        let v = self.values;
        let (o, c) = (th.open, th.close);
        let last = self.last_z;

        let up = last < o && z >= o;
        let down = last > -o && z <= -o;
        if up {
            self.pending = Some(Side::Long);
        } else if down {
            self.pending = Some(Side::Short);
        } else {
            match self.pending {
                Some(Side::Long) if z <= c => self.pending = None,
                Some(Side::Short) if z >= -c => self.pending = None,
                _ => {}
            }
        }

        let mut next = self.prev;
        let mut opened = false;
        match self.pending {
            Some(Side::Long) if self.prev == v.long => self.pending = None,
            Some(Side::Long) if flags.long_open && (up || self.delay_open) => {
                next = v.long;
                opened = true;
                self.pending = None;
            }
            Some(Side::Short) if self.prev == v.short => self.pending = None,
            Some(Side::Short) if flags.short_open && (down || self.delay_open) => {
                next = v.short;
                opened = true;
                self.pending = None;
            }
            _ => {}
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

        if !self.delay_open {
            self.pending = None;
        }
        self.prev = next;
        self.last_z = z;
        next
    }
}

// ─── Adaptive open width ─────────────────────────────────────────────

/// Lookup from recent trade performance to an open width.
///
/// `widths[k]` is used for the first `k` with `mean_profit < buckets[k]`;
/// above every bucket the last width applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosMap {
    pub buckets: Vec<f64>,
    pub widths: Vec<f64>,
}

impl PosMap {
    pub fn new(buckets: Vec<f64>, widths: Vec<f64>) -> Result<Self, KernelError> {
        let map = Self { buckets, widths };
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.widths.len() != self.buckets.len() + 1 {
            return Err(KernelError::invalid(
                "pos_map",
                format!(
                    "expected {} widths for {} buckets, got {}",
                    self.buckets.len() + 1,
                    self.buckets.len(),
                    self.widths.len()
                ),
            ));
        }
        if self.buckets.windows(2).any(|w| !(w[0] < w[1])) {
            return Err(KernelError::invalid("pos_map", "buckets must be strictly increasing"));
        }
        if self.widths.iter().any(|w| !w.is_finite()) {
            return Err(KernelError::invalid("pos_map", "widths must be finite"));
        }
        Ok(())
    }

    pub fn width_for(&self, mean_profit: f64) -> f64 {
        let k = self
            .buckets
            .iter()
            .position(|&b| mean_profit < b)
            .unwrap_or(self.buckets.len());
        self.widths[k]
    }
}

/// Records factor-space profit of closed band trades.
#[derive(Debug, Clone)]
pub(crate) struct TradeTracker {
    trade_num: usize,
    profits: VecDeque<f64>,
    /// Factor and signal at the open of the current trade.
    entry: Option<(f64, f64)>,
}

impl TradeTracker {
    pub fn new(trade_num: usize) -> Self {
        Self {
            trade_num,
            profits: VecDeque::with_capacity(trade_num + 1),
            entry: None,
        }
    }

    /// Observe the signal moving from `prev` to `next` at `factor`.
    pub fn record(&mut self, prev: f64, next: f64, factor: f64, close: f64) {
        if next == prev {
            return;
        }
        if let Some((entry_factor, held)) = self.entry.take() {
            self.profits.push_back((factor - entry_factor) * signum(held - close));
            if self.profits.len() > self.trade_num {
                self.profits.pop_front();
            }
        }
        if next != close {
            self.entry = Some((factor, next));
        }
    }

    /// Mean of the last `trade_num` profits, once that many trades exist.
    pub fn mean_profit(&self) -> Option<f64> {
        (self.trade_num > 0 && self.profits.len() >= self.trade_num)
            .then(|| self.profits.iter().sum::<f64>() / self.profits.len() as f64)
    }

    pub fn open_width(&self, base: f64, pos_map: Option<&PosMap>) -> f64 {
        match (pos_map, self.mean_profit()) {
            (Some(map), Some(mean)) => map.width_for(mean),
            _ => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TH: Thresholds = Thresholds {
        open: 1.0,
        close: 0.0,
        stop: None,
    };

    fn run(zs: &[f64], delay: bool, flags: &[FilterFlags], th: Thresholds) -> Vec<f64> {
        let mut m = BandMachine::new(SignalValues::default(), delay);
        zs.iter()
            .zip(flags)
            .map(|(&z, &f)| m.step(Some(z), th, f))
            .collect()
    }

    #[test]
    fn up_cross_opens_long_and_midline_closes() {
        let zs = [0.5, 1.2, 0.8, -0.1];
        let out = run(&zs, false, &[FilterFlags::default(); 4], TH);
        assert_eq!(out, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn down_cross_flips_long_to_short() {
        let zs = [0.5, 1.2, -1.5];
        let out = run(&zs, false, &[FilterFlags::default(); 3], TH);
        assert_eq!(out, vec![0.0, 1.0, -1.0]);
    }

    #[test]
    fn blocked_open_is_delayed_until_filter_clears() {
        let blocked = FilterFlags {
            long_open: false,
            ..FilterFlags::default()
        };
        let flags = [FilterFlags::default(), blocked, FilterFlags::default()];
        let zs = [0.0, 1.5, 0.7];
        assert_eq!(run(&zs, true, &flags, TH), vec![0.0, 0.0, 1.0]);
        assert_eq!(run(&zs, false, &flags, TH), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn delayed_open_cancelled_by_reversion() {
        let blocked = FilterFlags {
            long_open: false,
            ..FilterFlags::default()
        };
        let flags = [FilterFlags::default(), blocked, blocked, FilterFlags::default()];
        let zs = [0.0, 1.5, -0.2, 0.3];
        assert_eq!(run(&zs, true, &flags, TH), vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn stop_filter_and_stop_width_close() {
        let stop = FilterFlags {
            long_stop: true,
            ..FilterFlags::default()
        };
        let flags = [FilterFlags::default(), FilterFlags::default(), stop];
        assert_eq!(run(&[0.0, 1.5, 1.4], false, &flags, TH), vec![0.0, 1.0, 0.0]);

        let th = Thresholds {
            stop: Some(2.0),
            ..TH
        };
        let out = run(&[0.0, 1.5, 2.5], false, &[FilterFlags::default(); 3], th);
        assert_eq!(out, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_z_holds() {
        let mut m = BandMachine::new(SignalValues::default(), false);
        m.step(Some(1.5), TH, FilterFlags::default());
        assert_eq!(m.step(None, TH, FilterFlags::default()), 1.0);
        assert_eq!(m.signal(), 1.0);
    }

    #[test]
    fn pos_map_lookup() {
        let map = PosMap::new(vec![0.0, 1.0], vec![2.0, 1.5, 1.0]).unwrap();
        assert_eq!(map.width_for(-0.5), 2.0);
        assert_eq!(map.width_for(0.5), 1.5);
        assert_eq!(map.width_for(1.0), 1.0);
        assert!(PosMap::new(vec![0.0], vec![1.0]).is_err());
        assert!(PosMap::new(vec![1.0, 0.0], vec![1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn tracker_averages_last_trades() {
        let mut t = TradeTracker::new(2);
        t.record(0.0, 1.0, 10.0, 0.0); // open long
        t.record(1.0, 0.0, 12.0, 0.0); // +2
        assert_eq!(t.mean_profit(), None);
        t.record(0.0, -1.0, 12.0, 0.0); // open short
        t.record(-1.0, 1.0, 13.0, 0.0); // -1, flip to long
        assert_eq!(t.mean_profit(), Some(0.5));
        t.record(1.0, 0.0, 16.0, 0.0); // +3, oldest dropped
        assert_eq!(t.mean_profit(), Some(1.0));
    }
}
