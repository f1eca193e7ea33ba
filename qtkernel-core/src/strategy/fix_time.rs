//! Fixed holding period.
//!
//! The input is an entry-signal series. A non-zero value opens a position of
//! that value (if the side's open filter allows) and holds it for exactly `n`
//! bars regardless of price. With `extend_time`, an expiring position is
//! renewed when the entry signal still points the same way and the open
//! filter is still active. The side's stop filter closes early.

use serde::{Deserialize, Serialize};

use super::filter::{flags_at, FilterFlags, StrategyFilter};
use super::SignalGenerator;
use crate::domain::Side;
use crate::error::KernelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixTimeConfig {
    pub n: usize,
    #[serde(default)]
    pub extend_time: bool,
}

impl FixTimeConfig {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            extend_time: false,
        }
    }

    pub fn with_extend_time(mut self, extend_time: bool) -> Self {
        self.extend_time = extend_time;
        self
    }
}

fn can_open(side: Side, flags: FilterFlags) -> bool {
    match side {
        Side::Long => flags.long_open,
        Side::Short => flags.short_open,
    }
}

fn is_stopped(side: Side, flags: FilterFlags) -> bool {
    match side {
        Side::Long => flags.long_stop,
        Side::Short => flags.short_stop,
    }
}

impl SignalGenerator for FixTimeConfig {
    fn name(&self) -> &'static str {
        "fix_time"
    }

    fn generate(
        &self,
        entry: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        if self.n == 0 {
            return Err(KernelError::invalid("n", "must be >= 1"));
        }
        if let Some(f) = filter {
            f.check_len(entry.len())?;
        }

        let mut pos = 0.0;
        // bars held including the current one
        let mut held = 0usize;
        let mut out = Vec::with_capacity(entry.len());

        for (i, &sig) in entry.iter().enumerate() {
            let flags = flags_at(filter, i);
            let wanted = Side::from_signal(sig).filter(|&s| can_open(s, flags));

            match Side::from_signal(pos) {
                Some(side) if is_stopped(side, flags) => {
                    pos = 0.0;
                    held = 0;
                }
                Some(side) if held >= self.n => {
                    if self.extend_time && wanted == Some(side) {
                        pos = sig;
                        held = 1;
                    } else {
                        pos = 0.0;
                        held = 0;
                    }
                }
                Some(side) => match wanted {
                    Some(w) if w != side => {
                        pos = sig;
                        held = 1;
                    }
                    _ => held += 1,
                },
                None => {
                    if wanted.is_some() {
                        pos = sig;
                        held = 1;
                    }
                }
            }
            out.push(pos);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_exactly_n_bars() {
        let entry = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let out = FixTimeConfig::new(3).generate(&entry, None).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn repeated_entry_does_not_extend_by_default() {
        let entry = [1.0, 1.0, 1.0, 1.0];
        let out = FixTimeConfig::new(2).generate(&entry, None).unwrap();
        // expiry bar closes; the next bar re-enters
        assert_eq!(out, vec![1.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn extend_time_renews_while_signal_persists() {
        let entry = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let out = FixTimeConfig::new(2)
            .with_extend_time(true)
            .generate(&entry, None)
            .unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn opposite_entry_flips_and_restarts_clock() {
        let entry = [0.5, 0.0, -1.0, 0.0, 0.0];
        let out = FixTimeConfig::new(3).generate(&entry, None).unwrap();
        assert_eq!(out, vec![0.5, 0.5, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn filters_gate_and_stop() {
        let long_open = [false, true, true, true];
        let long_stop = [false, false, true, false];
        let short = [false; 4];
        let f = StrategyFilter::new(&long_open, &long_stop, &short, &short);
        let out = FixTimeConfig::new(5)
            .generate(&[1.0, 1.0, 0.0, 0.0], Some(&f))
            .unwrap();
        assert_eq!(out, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn zero_hold_rejected() {
        assert!(FixTimeConfig::new(0).generate(&[1.0], None).is_err());
    }
}
