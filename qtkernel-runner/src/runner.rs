//! Single-run orchestration: columns → signal → equity → trades.
//!
//! Two entry points:
//! - [`run`]: takes a config and an already loaded table. No I/O.
//! - [`run_file`]: reads a run file and its data, runs, and writes the
//!   output bundle when the run file has an `[output]` table.

use std::path::Path;

use anyhow::{Context, Result};
use qtkernel_core::domain::Trade;
use qtkernel_core::engine::{
    calc_future_ret, calc_future_ret_with_spread, calc_tick_future_ret,
    calc_tick_future_ret_full, to_trades, EquityModel, TradePrices,
};
use qtkernel_core::strategy::{SignalGenerator, StrategyFilter};
use qtkernel_core::KernelError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{load_data, BarTable, LoadError};
use crate::export::save_outputs;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

/// Output of one run, aligned with the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub name: Option<String>,
    pub strategy: String,
    pub model: String,
    pub signal: Vec<f64>,
    /// Account cash per bar.
    pub equity: Vec<f64>,
    pub trades: Vec<Trade>,
    /// Last non-missing equity value, or the starting cash for an empty table.
    pub final_equity: f64,
}

impl RunResult {
    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_open())
    }

    pub fn win_rate(&self) -> Option<f64> {
        let (wins, total) = self
            .closed_trades()
            .fold((0usize, 0usize), |(w, n), t| (w + usize::from(t.is_winner()), n + 1));
        (total > 0).then(|| wins as f64 / total as f64)
    }
}

fn init_cash(model: &EquityModel) -> f64 {
    match model {
        EquityModel::Future(c) => c.init_cash,
        EquityModel::Tick(c) => c.init_cash,
        EquityModel::TickFull(c) => c.init_cash,
    }
}

/// Run one configuration against a loaded table.
pub fn run(config: &RunConfig, table: &BarTable) -> Result<RunResult, RunError> {
    config.validate()?;
    let signal = generate_signal(config, table)?;
    let equity = simulate_equity(config, table, &signal)?;
    let trades = extract_trades(config, table, &signal)?;

    let final_equity = equity
        .iter()
        .rev()
        .copied()
        .find(|v| !v.is_nan())
        .unwrap_or_else(|| init_cash(&config.equity.model));
    let result = RunResult {
        run_id: config.run_id(),
        name: config.name.clone(),
        strategy: config.strategy.kind.name().to_string(),
        model: config.equity.model.name().to_string(),
        signal,
        equity,
        trades,
        final_equity,
    };
    info!(
        run = %config.label(),
        strategy = %result.strategy,
        model = %result.model,
        bars = table.len(),
        trades = result.trades.len(),
        final_equity = result.final_equity,
        "run finished"
    );
    Ok(result)
}

/// Read a run file and its data, run it, and write outputs if configured.
pub fn run_file(path: &Path) -> Result<RunResult> {
    let config = RunConfig::load(path)
        .with_context(|| format!("failed to load run file {}", path.display()))?;
    let table = load_data(&config.data)
        .with_context(|| format!("failed to load data {}", config.data.path.display()))?;
    let result = run(&config, &table).with_context(|| format!("run '{}' failed", config.label()))?;
    if let Some(output) = &config.output {
        save_outputs(&result, &table.time, &output.dir)?;
    }
    Ok(result)
}

fn generate_signal(config: &RunConfig, table: &BarTable) -> Result<Vec<f64>, RunError> {
    let section = &config.strategy;
    let factor = table.column(&section.factor)?;
    let vol = section
        .vol_column
        .as_deref()
        .map(|name| table.column(name))
        .transpose()?;
    let Some(names) = &section.filters else {
        return Ok(section.kind.generate_with_vol(factor, vol, None)?);
    };

    // missing open filters allow, missing stop filters do nothing
    let flags = names
        .iter()
        .enumerate()
        .map(|(i, name)| table.flags(name, i % 2 == 0))
        .collect::<Result<Vec<_>, _>>()?;
    let slices: Vec<&[bool]> = flags.iter().map(Vec::as_slice).collect();
    let filter = StrategyFilter::from_slices(&slices)?;
    Ok(section.kind.generate_with_vol(factor, vol, Some(&filter))?)
}

fn simulate_equity(config: &RunConfig, table: &BarTable, signal: &[f64]) -> Result<Vec<f64>, RunError> {
    let eq = &config.equity;
    let contract_chg = eq
        .contract_chg_column
        .as_deref()
        .map(|name| table.flags(name, false))
        .transpose()?;
    let contract_chg = contract_chg.as_deref();

    let equity = match &eq.model {
        EquityModel::Future(cfg) => {
            let open = table.column(&eq.open_column)?;
            let close = table.column(&eq.close_column)?;
            match &eq.slippage_column {
                Some(name) => {
                    let slippage = table.column(name)?;
                    calc_future_ret_with_spread(signal, open, close, slippage, contract_chg, cfg)?
                }
                None => calc_future_ret(signal, open, close, contract_chg, cfg)?,
            }
        }
        EquityModel::Tick(cfg) => {
            let bid = table.column(&eq.bid_column)?;
            let ask = table.column(&eq.ask_column)?;
            calc_tick_future_ret(signal, bid, ask, contract_chg, cfg)?
        }
        EquityModel::TickFull(cfg) => {
            let bid = table.column(&eq.bid_column)?;
            let ask = table.column(&eq.ask_column)?;
            calc_tick_future_ret_full(signal, bid, ask, contract_chg, cfg)?.cash
        }
    };
    Ok(equity)
}

fn extract_trades(config: &RunConfig, table: &BarTable, signal: &[f64]) -> Result<Vec<Trade>, RunError> {
    let Some(section) = &config.trades else {
        return Ok(Vec::new());
    };
    let prices = match (&section.price_column, &section.bid_column, &section.ask_column) {
        (Some(price), _, _) => TradePrices::Single(table.column(price)?),
        (None, Some(bid), Some(ask)) => TradePrices::BidAsk {
            bid: table.column(bid)?,
            ask: table.column(ask)?,
        },
        _ => return Ok(Vec::new()),
    };
    Ok(to_trades(signal, &table.time, prices)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use qtkernel_core::strategy::{BandParams, BollVolStopConfig, Strategy};

    const FAC: [f64; 20] = [
        10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 13.0, 14.0, 10.0, 7.0, 5.0, 4.0,
        3.0, 4.0, 4.0, 3.0, 2.0,
    ];

    fn table() -> BarTable {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut t = BarTable {
            time: (0..FAC.len()).map(|i| start + Duration::minutes(i as i64)).collect(),
            ..BarTable::default()
        };
        let px: Vec<f64> = FAC.iter().map(|f| 100.0 + f).collect();
        t.insert("fac", FAC.to_vec());
        t.insert("open", px.clone());
        t.insert("close", px.clone());
        t.insert("bid", px.clone());
        t.insert("ask", px.iter().map(|p| p + 0.5).collect());
        t.insert("yes", vec![1.0; FAC.len()]);
        t.insert("no", vec![f64::NAN; FAC.len()]);
        t
    }

    fn config(equity: &str, extra: &str) -> RunConfig {
        RunConfig::from_toml_str(&format!(
            r#"
            [data]
            path = "unused.csv"

            [strategy]
            type = "boll"
            factor = "fac"
            params = [4, 1.0]
            delay_open = false
            {extra}

            [equity]
            {equity}

            [trades]
            price_column = "close"
            "#
        ))
        .unwrap()
    }

    #[test]
    fn future_run_produces_aligned_series() {
        let cfg = config("type = \"future\"\ninit_cash = 100000\nc_rate = 0", "");
        let r = run(&cfg, &table()).unwrap();
        assert_eq!(r.signal.len(), FAC.len());
        assert_eq!(r.equity.len(), FAC.len());
        assert_eq!(r.strategy, "boll");
        assert_eq!(r.model, "future");
        assert_eq!(r.trades.len(), 4);
        assert!(r.trades[3].is_open());
        assert_eq!(r.final_equity, *r.equity.last().unwrap());
        assert_eq!(r.run_id, cfg.run_id());
    }

    #[test]
    fn filters_with_missing_cells_are_permissive() {
        let plain = run(&config("type = \"future\"", ""), &table()).unwrap();
        let filtered = run(
            &config(
                "type = \"future\"",
                "filters = [\"no\", \"no\", \"yes\", \"no\"]",
            ),
            &table(),
        )
        .unwrap();
        assert_eq!(plain.signal[1..], filtered.signal[1..]);
    }

    #[test]
    fn tick_models_read_quotes() {
        let tick = run(&config("type = \"tick\"\ninit_cash = 100000", ""), &table()).unwrap();
        assert_eq!(tick.model, "tick");
        assert_eq!(tick.equity.len(), FAC.len());
        let full = run(&config("type = \"tick_full\"\nc_rate = 0", ""), &table()).unwrap();
        assert_eq!(full.equity[0], 0.0);
    }

    #[test]
    fn boll_vol_stop_reads_vol_column() {
        let mut t = table();
        t.insert("vol", vec![0.5; FAC.len()]);
        let mut cfg = config("type = \"future\"", "");
        cfg.strategy.vol_column = Some("vol".into());
        cfg.strategy.kind = Strategy::BollVolStop(
            BollVolStopConfig::new(BandParams::new(4, 1.0).with_extra(1.0)).with_delay_open(false),
        );
        let r = run(&cfg, &t).unwrap();
        assert_eq!(r.strategy, "boll_vol_stop");
        // long from 13 exits one bar later at 14
        assert_eq!(r.signal[9], 1.0);
        assert_eq!(r.signal[10], 0.0);

        cfg.strategy.vol_column = Some("missing".into());
        assert!(matches!(run(&cfg, &t), Err(RunError::Data(LoadError::MissingColumn(_)))));
    }

    #[test]
    fn missing_column_is_a_data_error() {
        let mut cfg = config("type = \"future\"", "");
        cfg.strategy.factor = "nope".into();
        assert!(matches!(run(&cfg, &table()), Err(RunError::Data(LoadError::MissingColumn(_)))));
    }

    #[test]
    fn kernel_errors_surface() {
        let cfg = config("type = \"future\"\nmultiplier = 0", "");
        assert!(matches!(run(&cfg, &table()), Err(RunError::Kernel(_))));
    }

    #[test]
    fn win_rate_counts_closed_trades() {
        let r = run(&config("type = \"future\"", ""), &table()).unwrap();
        // long 2→3 loses, long 9→11 loses, short 11→16 wins
        let rate = r.win_rate().unwrap();
        assert!((rate - 1.0 / 3.0).abs() < 1e-12);
    }
}
