//! CSV and JSON export of run results.
//!
//! - **equity.csv**: time, signal, equity per bar
//! - **trades.csv**: one row per trade; open trades leave the exit cells empty
//! - **run.json**: the full `RunResult`

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use chrono::NaiveDateTime;
use qtkernel_core::domain::Trade;

use crate::runner::RunResult;

const TIME_FMT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn fmt_time(t: &NaiveDateTime) -> String {
    t.format(TIME_FMT).to_string()
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{v:.6}")
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Equity curve as CSV with time, signal and equity columns.
pub fn export_equity_csv(time: &[NaiveDateTime], result: &RunResult) -> Result<String> {
    ensure!(
        time.len() == result.equity.len(),
        "time has {} rows but equity has {}",
        time.len(),
        result.equity.len()
    );
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["time", "signal", "equity"])?;
    for ((t, s), e) in time.iter().zip(&result.signal).zip(&result.equity) {
        wtr.write_record([fmt_time(t), fmt_value(*s), fmt_value(*e)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Trade list as CSV.
///
/// Columns: side, size, entry_bar, entry_time, entry_price, exit_bar,
/// exit_time, exit_price, pnl_per_unit, return_pct
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "size",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "pnl_per_unit",
        "return_pct",
    ])?;
    for t in trades {
        wtr.write_record([
            format!("{:?}", t.side).to_lowercase(),
            fmt_value(t.size),
            t.entry_bar.to_string(),
            fmt_time(&t.entry_time),
            fmt_value(t.entry_price),
            t.exit_bar.map(|b| b.to_string()).unwrap_or_default(),
            t.exit_time.as_ref().map(fmt_time).unwrap_or_default(),
            t.exit_price.map(fmt_value).unwrap_or_default(),
            t.pnl_per_unit().map(fmt_value).unwrap_or_default(),
            t.return_pct().map(fmt_value).unwrap_or_default(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_equity_csv(path: &Path, time: &[NaiveDateTime], result: &RunResult) -> Result<()> {
    let csv = export_equity_csv(time, result)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let csv = export_trades_csv(trades)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── Output bundle ──────────────────────────────────────────────────

/// Write `run.json`, `equity.csv` and `trades.csv` into
/// `{output_dir}/{name or short run id}/`. Returns the created directory.
pub fn save_outputs(result: &RunResult, time: &[NaiveDateTime], output_dir: &Path) -> Result<PathBuf> {
    let dirname = result
        .name
        .clone()
        .unwrap_or_else(|| result.run_id.chars().take(12).collect());
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create output dir: {}", run_dir.display()))?;

    let json = serde_json::to_string_pretty(result).context("failed to serialize RunResult")?;
    std::fs::write(run_dir.join("run.json"), json)
        .with_context(|| format!("failed to write {}", run_dir.join("run.json").display()))?;
    write_equity_csv(&run_dir.join("equity.csv"), time, result)?;
    write_trades_csv(&run_dir.join("trades.csv"), &result.trades)?;
    Ok(run_dir)
}
