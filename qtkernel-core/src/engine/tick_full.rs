//! Tick simulation with a full per-tick account record
//! (`calc_tick_future_ret_full`).
//!
//! Always trades explicit lot counts. Besides cash it reports the lots held
//! after each tick and the cost reference of the open position, chosen by
//! [`OpenPriceMethod`].

use serde::{Deserialize, Serialize};

use super::tick::{prepare_inputs, validate_common, Quote, TickBook};
use super::{CommissionType, CostModel, OpenPriceMethod};
use crate::domain::signum;
use crate::error::KernelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickFullConfig {
    pub init_cash: f64,
    pub multiplier: f64,
    pub c_rate: f64,
    pub commission_type: CommissionType,
    pub open_price_method: OpenPriceMethod,
    pub blowup: bool,
    pub is_signal: bool,
}

impl Default for TickFullConfig {
    fn default() -> Self {
        Self {
            init_cash: 0.0,
            multiplier: 1.0,
            c_rate: 3e-4,
            commission_type: CommissionType::Percent,
            open_price_method: OpenPriceMethod::Average,
            blowup: false,
            is_signal: true,
        }
    }
}

/// Column-wise account record, one entry per tick.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickFullResult {
    pub cash: Vec<f64>,
    pub lots: Vec<f64>,
    /// Cost reference of the open position; NaN when flat.
    pub open_price: Vec<f64>,
}

impl TickFullResult {
    fn with_capacity(n: usize) -> Self {
        Self {
            cash: Vec::with_capacity(n),
            lots: Vec::with_capacity(n),
            open_price: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.cash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cash.is_empty()
    }
}

/// New cost reference after moving from `held` to `target` lots.
fn next_open_price(
    method: OpenPriceMethod,
    current: f64,
    held: f64,
    target: f64,
    q: Quote,
    rollover: bool,
) -> f64 {
    if target == 0.0 {
        return f64::NAN;
    }
    if rollover || held == 0.0 || signum(held) != signum(target) {
        return q.entry(target);
    }
    let (from, to) = (held.abs(), target.abs());
    if to > from {
        let px = q.entry(target);
        match method {
            OpenPriceMethod::First => current,
            OpenPriceMethod::Last => px,
            OpenPriceMethod::Average => (current * from + px * (to - from)) / to,
        }
    } else if to < from {
        match method {
            OpenPriceMethod::Last => q.liquidation(held),
            _ => current,
        }
    } else {
        current
    }
}

pub fn calc_tick_future_ret_full(
    signal: &[f64],
    bid: &[f64],
    ask: &[f64],
    contract_chg: Option<&[bool]>,
    config: &TickFullConfig,
) -> Result<TickFullResult, KernelError> {
    validate_common(config.init_cash, config.multiplier, config.c_rate)?;
    let signal = prepare_inputs(signal, bid, ask, contract_chg, config.is_signal)?;

    let cost = CostModel::new(config.commission_type, config.c_rate, config.multiplier);
    let mut book = TickBook::new(config.init_cash, cost);
    let mut out = TickFullResult::with_capacity(signal.len());

    for i in 0..signal.len() {
        let q = Quote {
            bid: bid[i],
            ask: ask[i],
        };
        if !book.acc.blown_up && !signal[i].is_nan() && q.is_valid() {
            let target = signal[i];
            let rollover = contract_chg.is_some_and(|flags| flags[i]);
            let held = book.acc.lots;

            book.mark(q, rollover);
            if target != held || rollover {
                book.acc.entry_price = next_open_price(
                    config.open_price_method,
                    book.acc.entry_price,
                    held,
                    target,
                    q,
                    rollover,
                );
            }
            book.rebalance(target, q, rollover);
            book.acc.position = target;
            book.settle(q, config.blowup, i);
        }
        out.cash.push(book.acc.cash);
        out.lots.push(book.acc.lots);
        out.open_price.push(book.acc.entry_price);
    }
    Ok(out)
}
