//! qtkernel core: columnar backtesting kernels.
//!
//! This crate contains the sequential, path-dependent parts of a backtest:
//! - Rolling band statistics (mean/std band, high/low channel)
//! - Signal generators: boll, boll_vol_stop, auto_boll, delay_boll,
//!   auto_tangqian, martingale, fix_time, prob_threshold
//! - Equity simulators: bar-level futures, tick-level bid/ask
//! - Trade extraction from a signal series
//! - A polars `DataFrame` adapter over all of the above
//!
//! Every kernel is a pure function over borrowed slices. NaN marks a missing
//! value on input and output.

pub mod domain;
pub mod engine;
pub mod error;
pub mod frame;
pub mod indicators;
pub mod strategy;

pub use error::KernelError;
