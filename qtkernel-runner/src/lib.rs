//! qtkernel runner: configuration-driven runs on top of `qtkernel-core`.
//!
//! This crate provides:
//! - TOML run files with content-addressed run ids
//! - CSV bar loading into column tables
//! - Single runs wiring a signal generator, an equity model and trade extraction
//! - Parallel batches and boll parameter sweeps
//! - CSV/JSON export of equity curves and trade lists

pub mod batch;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;

pub use batch::{best_point, run_batch, sweep_boll, BollGrid, SweepPoint};
pub use config::{ConfigError, RunConfig, RunId};
pub use data_loader::{load_data, load_table, BarTable, LoadError};
pub use export::{save_outputs, write_equity_csv, write_trades_csv};
pub use runner::{run, run_file, RunError, RunResult};
