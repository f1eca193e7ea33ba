//! Serializable run configuration, read from TOML run files.
//!
//! ```toml
//! name = "rb_boll"
//!
//! [data]
//! path = "rb.csv"
//! time_column = "time"
//!
//! [strategy]
//! type = "boll"
//! factor = "close"
//! params = [20, 2.0, 0.5]
//!
//! [equity]
//! type = "future"
//! multiplier = 10
//! c_rate = 0.0003
//!
//! [trades]
//! price_column = "close"
//!
//! [output]
//! dir = "out"
//! ```

use std::path::{Path, PathBuf};

use qtkernel_core::engine::EquityModel;
use qtkernel_core::strategy::{SignalGenerator, Strategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Content-addressable identifier of a run (hex blake3 digest).
pub type RunId = String;

/// Errors from reading or validating a run file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read run file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid run file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid run configuration: {0}")]
    Invalid(String),
}

/// Everything needed to reproduce one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub data: DataConfig,
    pub strategy: StrategySection,
    pub equity: EquitySection,
    #[serde(default)]
    pub trades: Option<TradesSection>,
    #[serde(default)]
    pub output: Option<OutputSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file with a header row.
    pub path: PathBuf,
    #[serde(default = "default_time_column")]
    pub time_column: String,
    /// chrono format string; when absent common layouts and epoch millis are tried.
    #[serde(default)]
    pub time_format: Option<String>,
}

fn default_time_column() -> String {
    "time".to_string()
}

/// Generator plus the columns it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub factor: String,
    /// Four columns in order long_open, long_stop, short_open, short_stop.
    #[serde(default)]
    pub filters: Option<Vec<String>>,
    /// Return volatility column, read by `boll_vol_stop` only.
    #[serde(default)]
    pub vol_column: Option<String>,
    #[serde(flatten)]
    pub kind: Strategy,
}

/// Equity model plus the columns it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySection {
    #[serde(flatten)]
    pub model: EquityModel,
    #[serde(default = "default_open")]
    pub open_column: String,
    #[serde(default = "default_close")]
    pub close_column: String,
    #[serde(default = "default_bid")]
    pub bid_column: String,
    #[serde(default = "default_ask")]
    pub ask_column: String,
    /// Per-bar slippage; switches the futures model to the spread variant.
    #[serde(default)]
    pub slippage_column: Option<String>,
    #[serde(default)]
    pub contract_chg_column: Option<String>,
}

fn default_open() -> String {
    "open".to_string()
}

fn default_close() -> String {
    "close".to_string()
}

fn default_bid() -> String {
    "bid".to_string()
}

fn default_ask() -> String {
    "ask".to_string()
}

/// Price columns for trade extraction: one price, or a bid/ask pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradesSection {
    #[serde(default)]
    pub price_column: Option<String>,
    #[serde(default)]
    pub bid_column: Option<String>,
    #[serde(default)]
    pub ask_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a run file. Relative data and output paths resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.data.path.is_relative() {
            self.data.path = base.join(&self.data.path);
        }
        if let Some(out) = self.output.as_mut() {
            if out.dir.is_relative() {
                out.dir = base.join(&out.dir);
            }
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Structural checks that do not need the data. Parameter ranges are
    /// checked by the kernels themselves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.factor.trim().is_empty() {
            return Err(ConfigError::Invalid("strategy.factor must name a column".into()));
        }
        if let Some(filters) = &self.strategy.filters {
            if filters.len() != 4 {
                return Err(ConfigError::Invalid(format!(
                    "strategy.filters needs 4 columns (long_open, long_stop, short_open, short_stop), got {}",
                    filters.len()
                )));
            }
        }
        match (self.strategy.kind.needs_vol(), &self.strategy.vol_column) {
            (true, None) => {
                return Err(ConfigError::Invalid(format!(
                    "strategy `{}` needs strategy.vol_column",
                    self.strategy.kind.name()
                )))
            }
            (false, Some(_)) => {
                return Err(ConfigError::Invalid(format!(
                    "strategy.vol_column is not used by `{}`",
                    self.strategy.kind.name()
                )))
            }
            _ => {}
        }
        if let Some(trades) = &self.trades {
            match (&trades.price_column, &trades.bid_column, &trades.ask_column) {
                (Some(_), None, None) | (None, Some(_), Some(_)) => {}
                _ => {
                    return Err(ConfigError::Invalid(
                        "trades needs either price_column or both bid_column and ask_column"
                            .into(),
                    ))
                }
            }
        }
        if self.equity.slippage_column.is_some() && self.equity.model.uses_quotes() {
            return Err(ConfigError::Invalid(format!(
                "equity.slippage_column is only used by the future model, not `{}`",
                self.equity.model.name()
            )));
        }
        Ok(())
    }

    /// Deterministic hash of the canonical JSON form. Identical configs share an id.
    pub fn run_id(&self) -> RunId {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        blake3::hash(&bytes).to_hex().to_string()
    }

    /// Display label: the configured name or a short run id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.run_id()[..12].to_string(),
        }
    }
}
