//! Probability thresholds to a lot count.
//!
//! Purely elementwise apart from the carried lot count: no rolling window.
//! Closes are checked before opens, so a bar can close a short and open a
//! long at once.

use serde::{Deserialize, Serialize};

use super::filter::{flags_at, StrategyFilter};
use super::SignalGenerator;
use crate::error::KernelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbThresholdConfig {
    pub open_long: f64,
    pub close_long: f64,
    pub open_short: f64,
    pub close_short: f64,
    #[serde(default = "default_hand")]
    pub per_hand: f64,
    #[serde(default = "default_hand")]
    pub max_hand: f64,
}

fn default_hand() -> f64 {
    1.0
}

impl Default for ProbThresholdConfig {
    fn default() -> Self {
        Self::from_thresholds([0.6, 0.5, 0.4, 0.5], 1.0, 1.0)
    }
}

impl ProbThresholdConfig {
    /// Thresholds in `(open_long, close_long, open_short, close_short)` order.
    pub fn from_thresholds(thresholds: [f64; 4], per_hand: f64, max_hand: f64) -> Self {
        let [open_long, close_long, open_short, close_short] = thresholds;
        Self {
            open_long,
            close_long,
            open_short,
            close_short,
            per_hand,
            max_hand,
        }
    }

    fn validate(&self) -> Result<(), KernelError> {
        if !(self.close_long <= self.open_long) {
            return Err(KernelError::invalid("close_long", "must be <= open_long"));
        }
        if !(self.close_short >= self.open_short) {
            return Err(KernelError::invalid("close_short", "must be >= open_short"));
        }
        if !(self.per_hand > 0.0) {
            return Err(KernelError::invalid("per_hand", "must be > 0"));
        }
        if !(self.max_hand >= self.per_hand) {
            return Err(KernelError::invalid("max_hand", "must be >= per_hand"));
        }
        Ok(())
    }
}

impl SignalGenerator for ProbThresholdConfig {
    fn name(&self) -> &'static str {
        "prob_threshold"
    }

    fn generate(
        &self,
        prob: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.validate()?;
        if let Some(f) = filter {
            f.check_len(prob.len())?;
        }

        let mut lots = 0.0_f64;
        let mut out = Vec::with_capacity(prob.len());
        for (i, &p) in prob.iter().enumerate() {
            if p.is_nan() {
                out.push(lots);
                continue;
            }
            let flags = flags_at(filter, i);

            if lots > 0.0 && (p <= self.close_long || flags.long_stop) {
                lots = 0.0;
            } else if lots < 0.0 && (p >= self.close_short || flags.short_stop) {
                lots = 0.0;
            }

            if p >= self.open_long && flags.long_open {
                lots = if lots < 0.0 {
                    self.per_hand
                } else {
                    (lots + self.per_hand).min(self.max_hand)
                };
            } else if p <= self.open_short && flags.short_open {
                lots = if lots > 0.0 {
                    -self.per_hand
                } else {
                    (lots - self.per_hand).max(-self.max_hand)
                };
            }
            out.push(lots);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_ladder() {
        let cfg = ProbThresholdConfig::from_thresholds([0.6, 0.5, 0.4, 0.5], 1.0, 2.0);
        let prob = [0.3, 0.6, 0.7, 0.6, 0.4, 0.2, 0.5, 0.4];
        let out = cfg.generate(&prob, None).unwrap();
        assert_eq!(out, vec![-1.0, 1.0, 2.0, 2.0, -1.0, -2.0, 0.0, -1.0]);
    }

    #[test]
    fn missing_probability_holds_lots() {
        let cfg = ProbThresholdConfig::default();
        let out = cfg.generate(&[0.7, f64::NAN, 0.55], None).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn open_filter_blocks_adding() {
        let cfg = ProbThresholdConfig::from_thresholds([0.6, 0.5, 0.4, 0.5], 1.0, 3.0);
        let long_open = [true, false, true];
        let other = [false; 3];
        let yes = [true; 3];
        let f = StrategyFilter::new(&long_open, &other, &yes, &other);
        let out = cfg.generate(&[0.9, 0.9, 0.9], Some(&f)).unwrap();
        assert_eq!(out, vec![1.0, 1.0, 2.0]);
    }

    #[test]
    fn inconsistent_thresholds_rejected() {
        let cfg = ProbThresholdConfig::from_thresholds([0.4, 0.5, 0.4, 0.5], 1.0, 1.0);
        assert!(cfg.generate(&[0.5], None).is_err());
    }
}
