//! Equity simulators and trade extraction.
//!
//! Every simulator is a single sequential pass: bar `i` depends only on the
//! account state left by bar `i - 1`. Inputs are borrowed slices sharing one
//! time index; outputs have exactly the input length.
//!
//! - [`future`]: bar-level futures P&L from open/close prices
//! - [`tick`]: tick-level P&L from bid/ask quotes
//! - [`tick_full`]: tick-level lots, cash and cost reference
//! - [`trade_extraction`]: signal series to entry/exit records

pub mod cost_model;
pub mod future;
pub mod tick;
pub mod tick_full;
pub mod trade_extraction;

pub use cost_model::CostModel;
pub use future::{calc_future_ret, calc_future_ret_with_spread, FutureRetConfig};
pub use tick::{calc_tick_future_ret, TickRetConfig};
pub use tick_full::{calc_tick_future_ret_full, TickFullConfig, TickFullResult};
pub use trade_extraction::{to_trades, TradePrices};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

// ─── Option enums ────────────────────────────────────────────────────

const PERCENT_OR_ABSOLUTE: &str = "percent, pct, absolute, fixed, fix";

fn parse_percent_or_absolute(kind: &'static str, s: &str) -> Result<bool, KernelError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "percent" | "pct" => Ok(true),
        "absolute" | "fixed" | "fix" => Ok(false),
        _ => Err(KernelError::UnknownVariant {
            kind,
            value: s.to_string(),
            expected: PERCENT_OR_ABSOLUTE,
        }),
    }
}

/// How commission is charged on traded lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum CommissionType {
    /// `c_rate` is a fraction of traded notional.
    #[default]
    Percent,
    /// `c_rate` is a fixed fee per lot.
    Absolute,
}

impl FromStr for CommissionType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_percent_or_absolute("commission_type", s).map(|pct| {
            if pct {
                CommissionType::Percent
            } else {
                CommissionType::Absolute
            }
        })
    }
}

impl TryFrom<String> for CommissionType {
    type Error = KernelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How a tick signal magnitude is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum SignalType {
    /// Fraction of available cash.
    #[default]
    Percent,
    /// Explicit lot count.
    Absolute,
}

impl FromStr for SignalType {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_percent_or_absolute("signal_type", s).map(|pct| {
            if pct {
                SignalType::Percent
            } else {
                SignalType::Absolute
            }
        })
    }
}

impl TryFrom<String> for SignalType {
    type Error = KernelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which fill price is reported as the cost reference of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "lowercase")]
pub enum OpenPriceMethod {
    /// Price of the fill that opened the position.
    First,
    /// Price of the most recent fill.
    Last,
    /// Lot-weighted average of the fills that increased the position.
    #[default]
    Average,
}

impl FromStr for OpenPriceMethod {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(OpenPriceMethod::First),
            "last" => Ok(OpenPriceMethod::Last),
            "average" | "avg" | "mean" => Ok(OpenPriceMethod::Average),
            _ => Err(KernelError::UnknownVariant {
                kind: "open_price_method",
                value: s.to_string(),
                expected: "first, last, average, avg, mean",
            }),
        }
    }
}

impl TryFrom<String> for OpenPriceMethod {
    type Error = KernelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for CommissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CommissionType::Percent => "percent",
            CommissionType::Absolute => "absolute",
        })
    }
}

// ─── Slippage ────────────────────────────────────────────────────────

/// Adverse price offset per traded lot, in price units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slippage<'a> {
    Fixed(f64),
    PerBar(&'a [f64]),
}

impl Slippage<'_> {
    /// Slippage at bar `i`. Missing per-bar values count as no slippage.
    pub fn at(&self, i: usize) -> f64 {
        match self {
            Slippage::Fixed(v) => *v,
            Slippage::PerBar(series) => {
                let v = series[i];
                if v.is_nan() {
                    0.0
                } else {
                    v
                }
            }
        }
    }
}

// ─── Model selection ─────────────────────────────────────────────────

/// Equity simulator selected by a `type` tag in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EquityModel {
    Future(FutureRetConfig),
    Tick(TickRetConfig),
    TickFull(TickFullConfig),
}

impl EquityModel {
    pub fn name(&self) -> &'static str {
        match self {
            EquityModel::Future(_) => "future",
            EquityModel::Tick(_) => "tick",
            EquityModel::TickFull(_) => "tick_full",
        }
    }

    /// Whether the model consumes bid/ask quotes rather than open/close.
    pub fn uses_quotes(&self) -> bool {
        !matches!(self, EquityModel::Future(_))
    }
}

// ─── Signal / position conversion ────────────────────────────────────

/// Position held during each bar for a signal executed one bar later.
/// The first bar is flat.
pub fn signal_to_position(signal: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(signal.len());
    if !signal.is_empty() {
        out.push(0.0);
        out.extend_from_slice(&signal[..signal.len() - 1]);
    }
    out
}

/// Signal that produces `position` one bar later. The last bar is flat.
pub fn position_to_signal(position: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(position.len());
    if !position.is_empty() {
        out.extend_from_slice(&position[1..]);
        out.push(0.0);
    }
    out
}
