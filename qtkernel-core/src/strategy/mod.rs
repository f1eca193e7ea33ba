//! Signal generators: turn a factor series into a position signal series.
//!
//! Every single-input generator is a plain config struct implementing
//! [`SignalGenerator`]. `boll_vol_stop` also reads a return volatility series
//! and is driven through [`Strategy::generate_with_vol`]. [`Strategy`] is the
//! closed set of generators for config-driven dispatch.
//! Generators are pure: the same inputs always give the same output, and all
//! per-run state lives on the stack of a single `generate` call.

mod band;
pub mod auto_boll;
pub mod auto_tangqian;
pub mod boll;
pub mod boll_vol_stop;
pub mod delay_boll;
pub mod filter;
pub mod fix_time;
pub mod martingale;
pub mod params;
pub mod prob_threshold;

pub use auto_boll::AutoBollConfig;
pub use auto_tangqian::AutoTangqianConfig;
pub use band::PosMap;
pub use boll::BollConfig;
pub use boll_vol_stop::BollVolStopConfig;
pub use delay_boll::DelayBollConfig;
pub use filter::{FilterFlags, StrategyFilter};
pub use fix_time::FixTimeConfig;
pub use martingale::MartingaleConfig;
pub use params::BandParams;
pub use prob_threshold::ProbThresholdConfig;

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Produces one signal value per input bar.
pub trait SignalGenerator: Send + Sync {
    /// Short machine name (e.g. "boll").
    fn name(&self) -> &'static str;

    /// Run the generator over `factor`. The output has the same length as the
    /// input; bars without enough history are NaN.
    fn generate(
        &self,
        factor: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError>;
}

/// Values emitted for the long, short and flat states.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalValues {
    #[serde(rename = "long_signal")]
    pub long: f64,
    #[serde(rename = "short_signal")]
    pub short: f64,
    #[serde(rename = "close_signal")]
    pub close: f64,
}

impl Default for SignalValues {
    fn default() -> Self {
        Self {
            long: 1.0,
            short: -1.0,
            close: 0.0,
        }
    }
}

impl SignalValues {
    pub fn reversed(self) -> Self {
        Self {
            long: self.short,
            short: self.long,
            close: self.close,
        }
    }

    pub(crate) fn oriented(self, rev: bool) -> Self {
        if rev {
            self.reversed()
        } else {
            self
        }
    }

    pub(crate) fn validate(&self) -> Result<(), KernelError> {
        if [self.long, self.short, self.close].iter().any(|v| !v.is_finite()) {
            return Err(KernelError::invalid("signal values", "must be finite"));
        }
        if self.long == self.close || self.short == self.close {
            return Err(KernelError::invalid(
                "signal values",
                "long and short signals must differ from close_signal",
            ));
        }
        Ok(())
    }
}

/// All signal generators, selected by a `type` tag in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Strategy {
    Boll(BollConfig),
    BollVolStop(BollVolStopConfig),
    AutoBoll(AutoBollConfig),
    DelayBoll(DelayBollConfig),
    AutoTangqian(AutoTangqianConfig),
    Martingale(MartingaleConfig),
    FixTime(FixTimeConfig),
    ProbThreshold(ProbThresholdConfig),
}

impl Strategy {
    /// Whether the generator needs a return volatility series.
    pub fn needs_vol(&self) -> bool {
        matches!(self, Strategy::BollVolStop(_))
    }

    /// Run the generator. `ret_vol` is required by `boll_vol_stop` and
    /// ignored by every other generator.
    pub fn generate_with_vol(
        &self,
        factor: &[f64],
        ret_vol: Option<&[f64]>,
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        match self {
            Strategy::Boll(c) => c.generate(factor, filter),
            Strategy::BollVolStop(c) => {
                let vol = ret_vol.ok_or_else(|| {
                    KernelError::invalid("ret_vol", "boll_vol_stop needs a return volatility series")
                })?;
                c.generate(factor, vol, filter)
            }
            Strategy::AutoBoll(c) => c.generate(factor, filter),
            Strategy::DelayBoll(c) => c.generate(factor, filter),
            Strategy::AutoTangqian(c) => c.generate(factor, filter),
            Strategy::Martingale(c) => c.generate(factor, filter),
            Strategy::FixTime(c) => c.generate(factor, filter),
            Strategy::ProbThreshold(c) => c.generate(factor, filter),
        }
    }
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &'static str {
        match self {
            Strategy::Boll(c) => c.name(),
            Strategy::BollVolStop(c) => c.name(),
            Strategy::AutoBoll(c) => c.name(),
            Strategy::DelayBoll(c) => c.name(),
            Strategy::AutoTangqian(c) => c.name(),
            Strategy::Martingale(c) => c.name(),
            Strategy::FixTime(c) => c.name(),
            Strategy::ProbThreshold(c) => c.name(),
        }
    }

    fn generate(
        &self,
        factor: &[f64],
        filter: Option<&StrategyFilter<'_>>,
    ) -> Result<Vec<f64>, KernelError> {
        self.generate_with_vol(factor, None, filter)
    }
}
