//! Position direction helpers.
//!
//! A signal or position value is a signed real: positive is long, negative is
//! short, zero is flat. Fractional magnitudes scale the exposure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Direction of a signal value. `None` for flat or missing values.
    pub fn from_signal(value: f64) -> Option<Self> {
        if value > 0.0 {
            Some(Side::Long)
        } else if value < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

/// Sign of a position value with flat mapped to 0.
///
/// `f64::signum` returns 1.0 for +0.0, which would turn a flat book into a long one.
pub fn signum(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}
