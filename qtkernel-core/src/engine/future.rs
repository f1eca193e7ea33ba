//! Bar-level futures equity simulation (`calc_future_ret`).
//!
//! Lots are whole contracts sized from current cash whenever the target
//! position changes: `floor(cash · leverage · |pos| / (multiplier · open))`.
//! Per bar, in order:
//!
//! 1. gap P&L on held lots from the previous close to this open (skipped on
//!    a contract rollover bar)
//! 2. trade at the open, paying commission and slippage on the traded lots
//!    (a rollover trades the full position out and back in)
//! 3. intra-bar P&L from open to close on the new lots

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{signal_to_position, CommissionType, CostModel, Slippage};
use crate::domain::{signum, AccountState};
use crate::error::{check_len, KernelError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FutureRetConfig {
    pub init_cash: f64,
    pub multiplier: f64,
    /// Scales the cash base used for lot sizing. Must stay constant over a run.
    pub leverage: f64,
    pub c_rate: f64,
    pub commission_type: CommissionType,
    /// Adverse offset per lot in ticks, used when no per-bar series is given.
    pub slippage: f64,
    /// Price value of one slippage tick.
    pub tick_size: f64,
    /// Stop trading for good once cash reaches zero.
    pub blowup: bool,
    /// Input is a signal to execute on the next bar rather than a position.
    pub is_signal: bool,
}

impl Default for FutureRetConfig {
    fn default() -> Self {
        Self {
            init_cash: 10_000_000.0,
            multiplier: 1.0,
            leverage: 1.0,
            c_rate: 3e-4,
            commission_type: CommissionType::Percent,
            slippage: 0.0,
            tick_size: 1.0,
            blowup: false,
            is_signal: true,
        }
    }
}

impl FutureRetConfig {
    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.init_cash.is_finite() {
            return Err(KernelError::invalid("init_cash", "must be finite"));
        }
        if !(self.multiplier > 0.0) || !self.multiplier.is_finite() {
            return Err(KernelError::invalid("multiplier", "must be finite and > 0"));
        }
        if !(self.leverage > 0.0) || !self.leverage.is_finite() {
            return Err(KernelError::invalid("leverage", "must be finite and > 0"));
        }
        if !(self.c_rate >= 0.0) {
            return Err(KernelError::invalid("c_rate", "must be >= 0"));
        }
        if !self.slippage.is_finite() || !self.tick_size.is_finite() {
            return Err(KernelError::invalid("slippage", "must be finite"));
        }
        Ok(())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.commission_type, self.c_rate, self.multiplier)
    }
}

/// Equity per bar with a scalar slippage of `slippage · tick_size` per lot.
pub fn calc_future_ret(
    signal: &[f64],
    open: &[f64],
    close: &[f64],
    contract_chg: Option<&[bool]>,
    config: &FutureRetConfig,
) -> Result<Vec<f64>, KernelError> {
    simulate(
        signal,
        open,
        close,
        Slippage::Fixed(config.slippage * config.tick_size),
        contract_chg,
        config,
    )
}

/// Equity per bar with a per-bar slippage series in price units.
///
/// `tick_size` does not apply to the series.
pub fn calc_future_ret_with_spread(
    signal: &[f64],
    open: &[f64],
    close: &[f64],
    slippage: &[f64],
    contract_chg: Option<&[bool]>,
    config: &FutureRetConfig,
) -> Result<Vec<f64>, KernelError> {
    check_len("slippage", signal.len(), slippage.len())?;
    simulate(
        signal,
        open,
        close,
        Slippage::PerBar(slippage),
        contract_chg,
        config,
    )
}

fn simulate(
    signal: &[f64],
    open: &[f64],
    close: &[f64],
    slippage: Slippage<'_>,
    contract_chg: Option<&[bool]>,
    config: &FutureRetConfig,
) -> Result<Vec<f64>, KernelError> {
    config.validate()?;
    let n = signal.len();
    check_len("open", n, open.len())?;
    check_len("close", n, close.len())?;
    if let Some(flags) = contract_chg {
        check_len("contract_chg_signal", n, flags.len())?;
    }

    let position: Cow<'_, [f64]> = if config.is_signal {
        Cow::Owned(signal_to_position(signal))
    } else {
        Cow::Borrowed(signal)
    };
    let cost = config.cost_model();
    let mult = config.multiplier;

    let mut acc = AccountState::new(config.init_cash);
    let mut last_close = f64::NAN;
    let mut out = Vec::with_capacity(n);

    for i in 0..n {
        if acc.blown_up {
            out.push(acc.cash);
            continue;
        }
        let (pos, o, c) = (position[i], open[i], close[i]);
        if pos.is_nan() || o.is_nan() || c.is_nan() {
            out.push(acc.cash);
            continue;
        }
        let rollover = contract_chg.is_some_and(|flags| flags[i]);

        if !acc.is_flat() && !rollover && !last_close.is_nan() {
            acc.cash += acc.lots * (o - last_close) * mult;
        }

        if pos != acc.position || rollover {
            let size = (acc.cash * config.leverage * pos.abs() / (mult * o)).floor();
            let lots = size.max(0.0) * signum(pos);
            let traded = if rollover {
                trace!(bar = i, old = acc.lots, new = lots, "contract rollover");
                2.0 * lots.abs()
            } else {
                (lots - acc.lots).abs()
            };
            acc.cash -= cost.trade_cost(traded, o, slippage.at(i));
            acc.lots = lots;
            acc.position = pos;
            acc.entry_price = if lots == 0.0 { f64::NAN } else { o };
        }

        if !acc.is_flat() {
            acc.cash += acc.lots * (c - o) * mult;
        }
        last_close = c;

        if acc.check_blowup(config.blowup) {
            debug!(bar = i, "account blown up, trading halted");
        }
        out.push(acc.cash);
    }
    Ok(out)
}
