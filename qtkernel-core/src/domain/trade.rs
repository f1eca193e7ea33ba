//! Trade: one entry/exit segment extracted from a signal series.

use super::position::Side;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A round trip from the bar the signal turns non-zero to the bar it returns
/// to zero or flips sign.
///
/// A position still open on the last bar is reported half-open: the exit
/// fields are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    /// Signal magnitude at entry.
    pub size: f64,

    // ── Entry ──
    pub entry_bar: usize,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: Option<usize>,
    pub exit_time: Option<NaiveDateTime>,
    pub exit_price: Option<f64>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_bar.is_none()
    }

    /// Price move captured per unit of exposure, signed by direction.
    pub fn pnl_per_unit(&self) -> Option<f64> {
        self.exit_price
            .map(|exit| (exit - self.entry_price) * self.side.sign())
    }

    /// Return on the trade as a fraction of the entry price.
    pub fn return_pct(&self) -> Option<f64> {
        if self.entry_price == 0.0 {
            return None;
        }
        self.pnl_per_unit().map(|pnl| pnl / self.entry_price)
    }

    pub fn bars_held(&self) -> Option<usize> {
        self.exit_bar.map(|exit| exit.saturating_sub(self.entry_bar))
    }

    pub fn is_winner(&self) -> bool {
        self.pnl_per_unit().is_some_and(|pnl| pnl > 0.0)
    }
}
