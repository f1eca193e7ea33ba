//! Band parameter normalization.
//!
//! Callers supply between one and four numbers
//! `(window, open_width, close_width, extra)`; missing widths default to 0 and
//! a missing `extra` slot stays unused. The meaning of `extra` depends on the
//! generator: a stop width for boll/delay_boll, a trade count for auto_boll,
//! a volatility multiple for boll_vol_stop.

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BandParams {
    pub window: usize,
    pub open_width: f64,
    pub close_width: f64,
    pub extra: Option<f64>,
}

impl BandParams {
    pub fn new(window: usize, open_width: f64) -> Self {
        Self {
            window,
            open_width,
            close_width: 0.0,
            extra: None,
        }
    }

    pub fn with_close_width(mut self, close_width: f64) -> Self {
        self.close_width = close_width;
        self
    }

    pub fn with_extra(mut self, extra: f64) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Normalize a parameter list of length 1 to 4.
    pub fn from_slice(params: &[f64]) -> Result<Self, KernelError> {
        if params.is_empty() || params.len() > 4 {
            return Err(KernelError::invalid(
                "params",
                format!("expected 1 to 4 values, got {}", params.len()),
            ));
        }
        let window = params[0];
        if !(window >= 1.0) || window.fract() != 0.0 {
            return Err(KernelError::invalid(
                "window",
                format!("must be a positive integer, got {window}"),
            ));
        }
        let get = |i: usize| params.get(i).copied();
        let out = Self {
            window: window as usize,
            open_width: get(1).unwrap_or(0.0),
            close_width: get(2).unwrap_or(0.0),
            extra: get(3).filter(|v| !v.is_nan()),
        };
        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if self.window == 0 {
            return Err(KernelError::invalid("window", "must be >= 1"));
        }
        if !self.open_width.is_finite() {
            return Err(KernelError::invalid("open_width", "must be finite"));
        }
        if !self.close_width.is_finite() {
            return Err(KernelError::invalid("close_width", "must be finite"));
        }
        Ok(())
    }

    /// `min_periods` falls back to half the window, but never below 1.
    pub fn min_periods(&self, explicit: Option<usize>) -> usize {
        explicit.unwrap_or(self.window / 2).max(1)
    }
}

impl TryFrom<Vec<f64>> for BandParams {
    type Error = KernelError;

    fn try_from(value: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&value)
    }
}

impl From<BandParams> for Vec<f64> {
    fn from(p: BandParams) -> Self {
        let mut out = vec![p.window as f64, p.open_width, p.close_width];
        out.extend(p.extra);
        out
    }
}

/// Positive integer stored in an `extra` slot (e.g. a trade count).
pub(crate) fn extra_as_count(name: &'static str, extra: Option<f64>) -> Result<Option<usize>, KernelError> {
    match extra {
        None => Ok(None),
        Some(v) if v >= 1.0 && v.fract() == 0.0 => Ok(Some(v as usize)),
        Some(v) => Err(KernelError::invalid(
            name,
            format!("must be a positive integer, got {v}"),
        )),
    }
}
