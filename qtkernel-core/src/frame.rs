//! Polars adapter: run the kernels on named `DataFrame` columns.
//!
//! Numeric columns of any integer or float type are cast to `Float64` with
//! nulls read as NaN. Boolean filter columns read nulls as the permissive
//! default of their role. Every wrapper returns a named `Series` (or a
//! `DataFrame` for multi-column results) with the frame's height.

use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use thiserror::Error;

use crate::domain::Trade;
use crate::engine::{
    calc_future_ret, calc_future_ret_with_spread, calc_tick_future_ret,
    calc_tick_future_ret_full, to_trades, FutureRetConfig, TickFullConfig, TickRetConfig,
    TradePrices,
};
use crate::error::KernelError;
use crate::strategy::{BollConfig, BollVolStopConfig, SignalGenerator, StrategyFilter};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("column `{name}` cannot be read as {expected}: {source}")]
    ColumnType {
        name: String,
        expected: &'static str,
        #[source]
        source: PolarsError,
    },

    #[error("null timestamp in column `{name}` at row {row}")]
    NullTime { name: String, row: usize },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Kernel(#[from] KernelError),
}

// ── Column readers ──────────────────────────────────────────────────

fn column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column, FrameError> {
    df.column(name)
        .map_err(|_| FrameError::MissingColumn(name.to_string()))
}

fn type_err<'a>(name: &'a str, expected: &'static str) -> impl FnOnce(PolarsError) -> FrameError + 'a {
    move |source| FrameError::ColumnType {
        name: name.to_string(),
        expected,
        source,
    }
}

/// Read a numeric column as `f64`, nulls as NaN.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, FrameError> {
    let cast = column(df, name)?
        .cast(&DataType::Float64)
        .map_err(type_err(name, "f64"))?;
    let ca = cast.f64().map_err(type_err(name, "f64"))?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Read a boolean column, nulls as `null_as`.
pub fn bool_column(df: &DataFrame, name: &str, null_as: bool) -> Result<Vec<bool>, FrameError> {
    let cast = column(df, name)?
        .cast(&DataType::Boolean)
        .map_err(type_err(name, "bool"))?;
    let ca = cast.bool().map_err(type_err(name, "bool"))?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(null_as)).collect())
}

/// Read a date or datetime column as naive UTC timestamps.
pub fn time_column(df: &DataFrame, name: &str) -> Result<Vec<NaiveDateTime>, FrameError> {
    let millis = column(df, name)?
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .and_then(|c| c.cast(&DataType::Int64))
        .map_err(type_err(name, "datetime"))?;
    let ca = millis.i64().map_err(type_err(name, "datetime"))?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.and_then(DateTime::from_timestamp_millis)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| FrameError::NullTime {
                    name: name.to_string(),
                    row,
                })
        })
        .collect()
}

/// Owned filter columns in `(long_open, long_stop, short_open, short_stop)` order.
struct FilterData([Vec<bool>; 4]);

impl FilterData {
    fn read(df: &DataFrame, names: &[&str]) -> Result<Self, FrameError> {
        let [long_open, long_stop, short_open, short_stop] = names else {
            return Err(KernelError::FilterArity(names.len()).into());
        };
        Ok(Self([
            bool_column(df, long_open, true)?,
            bool_column(df, long_stop, false)?,
            bool_column(df, short_open, true)?,
            bool_column(df, short_stop, false)?,
        ]))
    }

    fn view(&self) -> StrategyFilter<'_> {
        let [lo, ls, so, ss] = &self.0;
        StrategyFilter::new(lo, ls, so, ss)
    }
}

// ── Strategy wrappers ───────────────────────────────────────────────

/// Run any signal generator on `factor`, gated by the optional filter columns.
pub fn strategy_column(
    df: &DataFrame,
    factor: &str,
    generator: &dyn SignalGenerator,
    filters: Option<&[&str]>,
) -> Result<Series, FrameError> {
    let values = f64_column(df, factor)?;
    let filter_data = filters.map(|names| FilterData::read(df, names)).transpose()?;
    let filter = filter_data.as_ref().map(FilterData::view);
    let signal = generator.generate(&values, filter.as_ref())?;
    Ok(Series::new(factor.into(), signal))
}

pub fn boll_column(
    df: &DataFrame,
    factor: &str,
    config: &BollConfig,
    filters: Option<&[&str]>,
) -> Result<Series, FrameError> {
    strategy_column(df, factor, config, filters)
}

/// `boll_vol_stop` on `factor` with the return volatility in `ret_vol`.
pub fn boll_vol_stop_column(
    df: &DataFrame,
    factor: &str,
    ret_vol: &str,
    config: &BollVolStopConfig,
    filters: Option<&[&str]>,
) -> Result<Series, FrameError> {
    let values = f64_column(df, factor)?;
    let vol = f64_column(df, ret_vol)?;
    let filter_data = filters.map(|names| FilterData::read(df, names)).transpose()?;
    let filter = filter_data.as_ref().map(FilterData::view);
    let signal = config.generate(&values, &vol, filter.as_ref())?;
    Ok(Series::new(factor.into(), signal))
}

// ── Equity wrappers ─────────────────────────────────────────────────

/// Column names for the bar-level futures simulator.
#[derive(Debug, Clone, Copy)]
pub struct FutureColumns<'a> {
    pub signal: &'a str,
    pub open: &'a str,
    pub close: &'a str,
    /// Per-bar slippage; the config's scalar slippage is used when absent.
    pub slippage: Option<&'a str>,
    pub contract_chg: Option<&'a str>,
}

pub fn future_ret_column(
    df: &DataFrame,
    cols: FutureColumns<'_>,
    config: &FutureRetConfig,
) -> Result<Series, FrameError> {
    let signal = f64_column(df, cols.signal)?;
    let open = f64_column(df, cols.open)?;
    let close = f64_column(df, cols.close)?;
    let chg = cols
        .contract_chg
        .map(|name| bool_column(df, name, false))
        .transpose()?;

    let equity = match cols.slippage {
        Some(name) => {
            let slippage = f64_column(df, name)?;
            calc_future_ret_with_spread(&signal, &open, &close, &slippage, chg.as_deref(), config)?
        }
        None => calc_future_ret(&signal, &open, &close, chg.as_deref(), config)?,
    };
    Ok(Series::new("equity".into(), equity))
}

/// Column names for the tick simulators.
#[derive(Debug, Clone, Copy)]
pub struct QuoteColumns<'a> {
    pub signal: &'a str,
    pub bid: &'a str,
    pub ask: &'a str,
    pub contract_chg: Option<&'a str>,
}

struct QuoteData {
    signal: Vec<f64>,
    bid: Vec<f64>,
    ask: Vec<f64>,
    chg: Option<Vec<bool>>,
}

impl QuoteData {
    fn read(df: &DataFrame, cols: QuoteColumns<'_>) -> Result<Self, FrameError> {
        Ok(Self {
            signal: f64_column(df, cols.signal)?,
            bid: f64_column(df, cols.bid)?,
            ask: f64_column(df, cols.ask)?,
            chg: cols
                .contract_chg
                .map(|name| bool_column(df, name, false))
                .transpose()?,
        })
    }
}

pub fn tick_ret_column(
    df: &DataFrame,
    cols: QuoteColumns<'_>,
    config: &TickRetConfig,
) -> Result<Series, FrameError> {
    let q = QuoteData::read(df, cols)?;
    let cash = calc_tick_future_ret(&q.signal, &q.bid, &q.ask, q.chg.as_deref(), config)?;
    Ok(Series::new("equity".into(), cash))
}

/// `cash`, `lots` and `open_price` columns from the full tick simulator.
pub fn tick_full_frame(
    df: &DataFrame,
    cols: QuoteColumns<'_>,
    config: &TickFullConfig,
) -> Result<DataFrame, FrameError> {
    let q = QuoteData::read(df, cols)?;
    let r = calc_tick_future_ret_full(&q.signal, &q.bid, &q.ask, q.chg.as_deref(), config)?;
    Ok(DataFrame::new(vec![
        Column::new("cash".into(), r.cash),
        Column::new("lots".into(), r.lots),
        Column::new("open_price".into(), r.open_price),
    ])?)
}

// ── Trades ──────────────────────────────────────────────────────────

/// Price columns for trade extraction.
#[derive(Debug, Clone, Copy)]
pub enum PriceColumns<'a> {
    Single(&'a str),
    BidAsk { bid: &'a str, ask: &'a str },
}

pub fn trades_frame(
    df: &DataFrame,
    signal: &str,
    time: &str,
    prices: PriceColumns<'_>,
) -> Result<DataFrame, FrameError> {
    let signal = f64_column(df, signal)?;
    let time = time_column(df, time)?;
    let trades = match prices {
        PriceColumns::Single(name) => {
            let price = f64_column(df, name)?;
            to_trades(&signal, &time, TradePrices::Single(&price))?
        }
        PriceColumns::BidAsk { bid, ask } => {
            let bid = f64_column(df, bid)?;
            let ask = f64_column(df, ask)?;
            to_trades(&signal, &time, TradePrices::BidAsk { bid: &bid, ask: &ask })?
        }
    };
    trades_to_frame(&trades)
}

/// Tabulate trades; open trades have null exit fields.
pub fn trades_to_frame(trades: &[Trade]) -> Result<DataFrame, FrameError> {
    let datetime = DataType::Datetime(TimeUnit::Milliseconds, None);
    let side: Vec<&str> = trades
        .iter()
        .map(|t| match t.side {
            crate::domain::Side::Long => "long",
            crate::domain::Side::Short => "short",
        })
        .collect();
    let size: Vec<f64> = trades.iter().map(|t| t.size).collect();
    let entry_time: Vec<i64> = trades
        .iter()
        .map(|t| t.entry_time.and_utc().timestamp_millis())
        .collect();
    let entry_price: Vec<f64> = trades.iter().map(|t| t.entry_price).collect();
    let exit_time: Vec<Option<i64>> = trades
        .iter()
        .map(|t| t.exit_time.map(|x| x.and_utc().timestamp_millis()))
        .collect();
    let exit_price: Vec<Option<f64>> = trades.iter().map(|t| t.exit_price).collect();

    Ok(DataFrame::new(vec![
        Column::new("side".into(), side),
        Column::new("size".into(), size),
        Column::new("entry_time".into(), entry_time).cast(&datetime)?,
        Column::new("entry_price".into(), entry_price),
        Column::new("exit_time".into(), exit_time).cast(&datetime)?,
        Column::new("exit_price".into(), exit_price),
    ])?)
}
