//! Tick-level futures equity simulation (`calc_tick_future_ret`).
//!
//! Positions are marked at their liquidation price: longs at the bid, shorts
//! at the ask. Buys fill at the ask and sells at the bid, so the quoted spread
//! is paid the moment exposure is opened and nothing extra is paid to close.
//! An optional commission is charged on top of the spread.
//!
//! The signal at tick `i` executes against the quotes of tick `i`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{position_to_signal, CommissionType, CostModel, SignalType};
use crate::domain::{signum, AccountState};
use crate::error::{check_len, KernelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickRetConfig {
    pub init_cash: f64,
    pub multiplier: f64,
    pub c_rate: f64,
    pub commission_type: CommissionType,
    pub signal_type: SignalType,
    pub blowup: bool,
    /// Input is a signal. When false it is a position series and is shifted
    /// one tick earlier before execution.
    pub is_signal: bool,
}

impl Default for TickRetConfig {
    fn default() -> Self {
        Self {
            init_cash: 10_000_000.0,
            multiplier: 1.0,
            c_rate: 3e-4,
            commission_type: CommissionType::Percent,
            signal_type: SignalType::Percent,
            blowup: false,
            is_signal: true,
        }
    }
}

pub(crate) fn validate_common(init_cash: f64, multiplier: f64, c_rate: f64) -> Result<(), KernelError> {
    if !init_cash.is_finite() {
        return Err(KernelError::invalid("init_cash", "must be finite"));
    }
    if !(multiplier > 0.0) || !multiplier.is_finite() {
        return Err(KernelError::invalid("multiplier", "must be finite and > 0"));
    }
    if !(c_rate >= 0.0) {
        return Err(KernelError::invalid("c_rate", "must be >= 0"));
    }
    Ok(())
}

/// Validate quote lengths and resolve the executed signal series.
pub(crate) fn prepare_inputs<'a>(
    signal: &'a [f64],
    bid: &[f64],
    ask: &[f64],
    contract_chg: Option<&[bool]>,
    is_signal: bool,
) -> Result<Cow<'a, [f64]>, KernelError> {
    let n = signal.len();
    check_len("bid", n, bid.len())?;
    check_len("ask", n, ask.len())?;
    if let Some(flags) = contract_chg {
        check_len("contract_chg_signal", n, flags.len())?;
    }
    Ok(if is_signal {
        Cow::Borrowed(signal)
    } else {
        Cow::Owned(position_to_signal(signal))
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn is_valid(&self) -> bool {
        !self.bid.is_nan() && !self.ask.is_nan()
    }

    /// Price at which `lots` would be closed.
    pub fn liquidation(&self, lots: f64) -> f64 {
        if lots > 0.0 {
            self.bid
        } else {
            self.ask
        }
    }

    /// Price at which exposure in the direction of `lots` is opened.
    pub fn entry(&self, lots: f64) -> f64 {
        if lots > 0.0 {
            self.ask
        } else {
            self.bid
        }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Account plus quote history for one tick simulation.
#[derive(Debug, Clone)]
pub(crate) struct TickBook {
    pub acc: AccountState,
    cost: CostModel,
    prev_quote: Option<Quote>,
}

impl TickBook {
    pub fn new(init_cash: f64, cost: CostModel) -> Self {
        Self {
            acc: AccountState::new(init_cash),
            cost,
            prev_quote: None,
        }
    }

    /// Revalue held lots from the previous quotes to `q`. A rollover replaces
    /// the contract, so no P&L is taken across it.
    pub fn mark(&mut self, q: Quote, rollover: bool) {
        if self.acc.is_flat() || rollover {
            return;
        }
        if let Some(prev) = self.prev_quote {
            let lots = self.acc.lots;
            self.acc.cash += lots * (q.liquidation(lots) - prev.liquidation(lots)) * self.cost.multiplier;
        }
    }

    /// Lots affordable for a fractional signal at the entry price.
    pub fn percent_lots(&self, signal: f64, q: Quote) -> f64 {
        if signal == 0.0 {
            return 0.0;
        }
        let price = q.entry(signal);
        let size = (self.acc.cash * signal.abs() / (self.cost.multiplier * price)).floor();
        size.max(0.0) * signum(signal)
    }

    /// Move to `target` lots at the quotes of this tick.
    pub fn rebalance(&mut self, target: f64, q: Quote, rollover: bool) {
        let held = self.acc.lots;
        if rollover {
            if held != 0.0 {
                trace!(old = held, new = target, "contract rollover");
                self.acc.cash -= self.cost.commission(held.abs(), q.liquidation(held));
            }
            if target != 0.0 {
                self.acc.cash -= self.cost.commission(target.abs(), q.entry(target));
                self.acc.cash -= target.abs() * q.spread() * self.cost.multiplier;
            }
        } else if target != held {
            let delta = target - held;
            let price = if delta > 0.0 { q.ask } else { q.bid };
            self.acc.cash -= self.cost.commission(delta.abs(), price);
            let opened = if signum(target) == signum(held) || held == 0.0 || target == 0.0 {
                (target.abs() - held.abs()).max(0.0)
            } else {
                target.abs()
            };
            self.acc.cash -= opened * q.spread() * self.cost.multiplier;
        }
        self.acc.lots = target;
    }

    /// Close out the tick: remember quotes and apply the bankruptcy rule.
    pub fn settle(&mut self, q: Quote, blowup: bool, tick: usize) {
        self.prev_quote = Some(q);
        if self.acc.check_blowup(blowup) {
            debug!(tick, "account blown up, trading halted");
        }
    }
}

/// Cash per tick, marked at liquidation prices.
pub fn calc_tick_future_ret(
    signal: &[f64],
    bid: &[f64],
    ask: &[f64],
    contract_chg: Option<&[bool]>,
    config: &TickRetConfig,
) -> Result<Vec<f64>, KernelError> {
    validate_common(config.init_cash, config.multiplier, config.c_rate)?;
    let signal = prepare_inputs(signal, bid, ask, contract_chg, config.is_signal)?;

    let cost = CostModel::new(config.commission_type, config.c_rate, config.multiplier);
    let mut book = TickBook::new(config.init_cash, cost);
    let mut last_signal = 0.0;
    let mut out = Vec::with_capacity(signal.len());

    for i in 0..signal.len() {
        let q = Quote {
            bid: bid[i],
            ask: ask[i],
        };
        if book.acc.blown_up || signal[i].is_nan() || !q.is_valid() {
            out.push(book.acc.cash);
            continue;
        }
        let s = signal[i];
        let rollover = contract_chg.is_some_and(|flags| flags[i]);

        book.mark(q, rollover);
        let resize = match config.signal_type {
            SignalType::Absolute => true,
            SignalType::Percent => s != last_signal || rollover,
        };
        if resize {
            let target = match config.signal_type {
                SignalType::Absolute => s,
                SignalType::Percent => book.percent_lots(s, q),
            };
            book.rebalance(target, q, rollover);
            book.acc.position = s;
            last_signal = s;
        }
        book.settle(q, config.blowup, i);
        out.push(book.acc.cash);
    }
    Ok(out)
}
