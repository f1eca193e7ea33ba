//! Martingale position sizing on a price series.
//!
//! Not a band detector: the strategy is always in the market while the
//! long-open filter allows it, starting from `init_pos`. A losing position
//! is scaled by `pos_mul` every `step` bars, at most `n` times per cycle. A
//! gain of `take_profit` (as a return on the average cost) starts a new cycle
//! at `init_pos`. With `stop_loss_m`, an open loss larger than
//! `stop_loss_m · |init_pos| · first_entry_price` ends trading for the rest of
//! the series.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::filter::{flags_at, StrategyFilter};
use super::SignalGenerator;
use crate::domain::signum;
use crate::error::KernelError;

fn default_pos_mul() -> f64 {
    2.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MartingaleConfig {
    /// Maximum number of scale-ups per cycle.
    pub n: usize,
    /// Minimum bars between scale-ups. Defaults to 1.
    #[serde(default)]
    pub step: Option<usize>,
    pub init_pos: f64,
    pub take_profit: f64,
    #[serde(default = "default_pos_mul")]
    pub pos_mul: f64,
    #[serde(default)]
    pub stop_loss_m: Option<f64>,
}

impl MartingaleConfig {
    pub fn new(n: usize, init_pos: f64, take_profit: f64) -> Self {
        Self {
            n,
            step: None,
            init_pos,
            take_profit,
            pos_mul: default_pos_mul(),
            stop_loss_m: None,
        }
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_stop_loss(mut self, stop_loss_m: f64) -> Self {
        self.stop_loss_m = Some(stop_loss_m);
        self
    }

    fn validate(&self) -> Result<(), KernelError> {
        if !self.init_pos.is_finite() || self.init_pos == 0.0 {
            return Err(KernelError::invalid("init_pos", "must be finite and non-zero"));
        }
        if !(self.take_profit > 0.0) {
            return Err(KernelError::invalid("take_profit", "must be > 0"));
        }
        if !(self.pos_mul > 0.0) || !self.pos_mul.is_finite() {
            return Err(KernelError::invalid("pos_mul", "must be finite and > 0"));
        }
        if self.step == Some(0) {
            return Err(KernelError::invalid("step", "must be >= 1"));
        }
        if self.stop_loss_m.is_some_and(|m| !(m > 0.0)) {
            return Err(KernelError::invalid("stop_loss_m", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Cycle {
    pos: f64,
    /// Lot-weighted average entry price.
    cost: f64,
    first_price: f64,
    adds: usize,
    since_add: usize,
}

impl Cycle {
    fn start(pos: f64, price: f64) -> Self {
        Self {
            pos,
            cost: price,
            first_price: price,
            adds: 0,
            since_add: 0,
        }
    }
}

impl SignalGenerator for MartingaleConfig {
    fn name(&self) -> &'static str {
        "martingale"
    }

    /// `factor` is the price series. Only the long-side filters apply.
    fn generate(
        &self,
        price: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.validate()?;
        if let Some(f) = filter {
            f.check_len(price.len())?;
        }
        let step = self.step.unwrap_or(1);

        let mut cycle: Option<Cycle> = None;
        let mut halted = false;
        let mut out = Vec::with_capacity(price.len());

        for (i, &p) in price.iter().enumerate() {
            if halted {
                out.push(0.0);
                continue;
            }
            let flags = flags_at(filter, i);
            if p.is_nan() || p <= 0.0 {
                out.push(cycle.map_or(0.0, |c| c.pos));
                continue;
            }

            cycle = match cycle {
                None => flags.long_open.then(|| Cycle::start(self.init_pos, p)),
                Some(_) if flags.long_stop => None,
                Some(mut c) => {
                    c.since_add += 1;
                    let ret = (p / c.cost - 1.0) * signum(c.pos);
                    let open_loss = (c.cost - p) * c.pos;
                    let stop_level = self
                        .stop_loss_m
                        .map(|m| m * self.init_pos.abs() * c.first_price);

                    if stop_level.is_some_and(|level| open_loss > level) {
                        debug!(bar = i, open_loss, "martingale stop loss, halting");
                        halted = true;
                        None
                    } else if ret >= self.take_profit {
                        flags.long_open.then(|| Cycle::start(self.init_pos, p))
                    } else if ret < 0.0 && c.since_add >= step && c.adds < self.n {
                        let new_pos = c.pos * self.pos_mul;
                        let added = (new_pos - c.pos).abs();
                        c.cost = (c.cost * c.pos.abs() + p * added) / new_pos.abs();
                        c.pos = new_pos;
                        c.adds += 1;
                        c.since_add = 0;
                        Some(c)
                    } else {
                        Some(c)
                    }
                }
            };
            out.push(cycle.map_or(0.0, |c| c.pos));
        }
        Ok(out)
    }
}
