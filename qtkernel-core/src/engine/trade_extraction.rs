//! Trade extraction: converts a signal series into round-trip trades.
//!
//! Pure post-processing: signal + time + prices → trade records. A trade
//! opens on the bar the signal becomes non-zero and closes on the bar it
//! returns to zero or changes sign; a sign change closes and reopens on the
//! same bar. Size changes in the same direction stay within one trade.
//! A position still open at the last bar is returned with no exit.

use chrono::NaiveDateTime;

use crate::domain::{Side, Trade};
use crate::error::{check_len, KernelError};

/// Execution prices for entries and exits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradePrices<'a> {
    /// One price for every fill.
    Single(&'a [f64]),
    /// Longs enter at the ask and exit at the bid; shorts the reverse.
    BidAsk { bid: &'a [f64], ask: &'a [f64] },
}

impl TradePrices<'_> {
    fn check_len(&self, expected: usize) -> Result<(), KernelError> {
        match self {
            TradePrices::Single(price) => check_len("price", expected, price.len()),
            TradePrices::BidAsk { bid, ask } => {
                check_len("bid", expected, bid.len())?;
                check_len("ask", expected, ask.len())
            }
        }
    }

    fn entry(&self, side: Side, i: usize) -> f64 {
        match (self, side) {
            (TradePrices::Single(price), _) => price[i],
            (TradePrices::BidAsk { ask, .. }, Side::Long) => ask[i],
            (TradePrices::BidAsk { bid, .. }, Side::Short) => bid[i],
        }
    }

    fn exit(&self, side: Side, i: usize) -> f64 {
        self.entry(side.opposite(), i)
    }
}

/// Extract trades from `signal`. Missing signal values hold the previous one.
pub fn to_trades(
    signal: &[f64],
    time: &[NaiveDateTime],
    prices: TradePrices<'_>,
) -> Result<Vec<Trade>, KernelError> {
    let n = signal.len();
    check_len("time", n, time.len())?;
    prices.check_len(n)?;

    let mut trades = Vec::new();
    let mut open: Option<Trade> = None;
    let mut held = 0.0;

    for i in 0..n {
        if !signal[i].is_nan() {
            held = signal[i];
        }
        let side = Side::from_signal(held);

        if let Some(current) = open.as_ref() {
            if side != Some(current.side) {
                if let Some(mut trade) = open.take() {
                    trade.exit_bar = Some(i);
                    trade.exit_time = Some(time[i]);
                    trade.exit_price = Some(prices.exit(trade.side, i));
                    trades.push(trade);
                }
            }
        }

        if open.is_none() {
            if let Some(side) = side {
                open = Some(Trade {
                    side,
                    size: held.abs(),
                    entry_bar: i,
                    entry_time: time[i],
                    entry_price: prices.entry(side, i),
                    exit_bar: None,
                    exit_time: None,
                    exit_price: None,
                });
            }
        }
    }

    trades.extend(open);
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn times(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        (0..n).map(|i| start + Duration::minutes(i as i64)).collect()
    }

    #[test]
    fn single_round_trip() {
        let signal = [0.0, 1.0, 1.0, 0.0];
        let price = [10.0, 11.0, 12.0, 13.0];
        let t = times(4);
        let trades = to_trades(&signal, &t, TradePrices::Single(&price)).unwrap();
        assert_eq!(trades.len(), 1);
        let tr = &trades[0];
        assert_eq!(tr.side, Side::Long);
        assert_eq!(tr.entry_bar, 1);
        assert_eq!(tr.entry_time, t[1]);
        assert_eq!(tr.entry_price, 11.0);
        assert_eq!(tr.exit_bar, Some(3));
        assert_eq!(tr.exit_price, Some(13.0));
        assert_eq!(tr.pnl_per_unit(), Some(2.0));
    }

    #[test]
    fn sign_flip_closes_and_reopens_same_bar() {
        let signal = [1.0, -1.0, 0.0];
        let price = [10.0, 12.0, 11.0];
        let t = times(3);
        let trades = to_trades(&signal, &t, TradePrices::Single(&price)).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].exit_time, Some(t[1]));
        assert_eq!(trades[1].entry_time, t[1]);
        assert_eq!(trades[1].side, Side::Short);
        assert_eq!(trades[1].pnl_per_unit(), Some(1.0));
    }

    #[test]
    fn trailing_position_is_half_open() {
        let signal = [0.0, -0.5, -0.5];
        let price = [10.0, 11.0, 12.0];
        let trades = to_trades(&signal, &times(3), TradePrices::Single(&price)).unwrap();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].is_open());
        assert_eq!(trades[0].size, 0.5);
        assert_eq!(trades[0].exit_price, None);
    }

    #[test]
    fn resizing_stays_in_one_trade_and_nan_holds() {
        let signal = [1.0, 2.0, f64::NAN, 0.5, 0.0];
        let price = [1.0, 2.0, 3.0, 4.0, 5.0];
        let trades = to_trades(&signal, &times(5), TradePrices::Single(&price)).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].entry_bar, 0);
        assert_eq!(trades[0].exit_bar, Some(4));
        assert_eq!(trades[0].size, 1.0);
    }

    #[test]
    fn bid_ask_prices_cross_the_spread() {
        let signal = [1.0, 0.0, -1.0, 0.0];
        let bid = [10.0, 11.0, 12.0, 13.0];
        let ask = [10.5, 11.5, 12.5, 13.5];
        let trades =
            to_trades(&signal, &times(4), TradePrices::BidAsk { bid: &bid, ask: &ask }).unwrap();
        assert_eq!((trades[0].entry_price, trades[0].exit_price), (10.5, Some(11.0)));
        assert_eq!((trades[1].entry_price, trades[1].exit_price), (12.0, Some(13.5)));
    }

    #[test]
    fn empty_and_mismatched_inputs() {
        assert!(to_trades(&[], &[], TradePrices::Single(&[])).unwrap().is_empty());
        let err = to_trades(&[0.0, 1.0], &times(2), TradePrices::Single(&[1.0])).unwrap_err();
        assert!(matches!(err, KernelError::LengthMismatch { name: "price", .. }));
    }
}
