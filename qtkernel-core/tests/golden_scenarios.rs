//! Reference scenarios across the public API.
//!
//! Each scenario pins a full output sequence computed by hand:
//! 1. Bollinger breakout with and without filters and delayed opens
//! 2. Futures equity with leverage, half sizing and a contract rollover
//! 3. Tick equity and the full tick account record
//! 4. Signal → equity → trades on one series

use chrono::{Duration, NaiveDate, NaiveDateTime};
use qtkernel_core::domain::Side;
use qtkernel_core::engine::{
    calc_future_ret, calc_tick_future_ret, calc_tick_future_ret_full, to_trades,
    FutureRetConfig, OpenPriceMethod, TickFullConfig, TickRetConfig, TradePrices,
};
use qtkernel_core::strategy::{
    BandParams, BollConfig, ProbThresholdConfig, SignalGenerator, Strategy, StrategyFilter,
};

const NAN: f64 = f64::NAN;

const FAC: [f64; 20] = [
    10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 10.0, 11.0, 12.0, 13.0, 14.0, 10.0, 7.0, 5.0, 4.0, 3.0,
    4.0, 4.0, 3.0, 2.0,
];

fn assert_same(actual: &[f64], expected: &[f64], epsilon: f64) {
    assert_eq!(actual.len(), expected.len(), "length differs");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        if e.is_nan() {
            assert!(a.is_nan(), "bar {i}: expected NaN, got {a}");
        } else {
            assert!((a - e).abs() <= epsilon, "bar {i}: expected {e}, got {a}");
        }
    }
}

fn minutes(n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    (0..n).map(|i| start + Duration::minutes(i as i64)).collect()
}

// ── 1. Bollinger ─────────────────────────────────────────────────────

#[test]
fn boll_reference_sequence() {
    let cfg = BollConfig::new(BandParams::new(4, 1.0)).with_delay_open(false);
    let out = cfg.generate(&FAC, None).unwrap();
    let expected = [
        NAN, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0, -1.0, 0.0,
        0.0, 0.0, -1.0,
    ];
    assert_same(&out, &expected, 0.0);
}

struct ShortGate {
    long_open: [bool; 20],
    long_stop: [bool; 20],
    short_open: [bool; 20],
    short_stop: [bool; 20],
}

impl ShortGate {
    /// Shorts are blocked on bars 11 and 12.
    fn new() -> Self {
        let mut short_open = [true; 20];
        short_open[11] = false;
        short_open[12] = false;
        Self {
            long_open: [true; 20],
            long_stop: [false; 20],
            short_open,
            short_stop: [false; 20],
        }
    }

    fn filter(&self) -> StrategyFilter<'_> {
        StrategyFilter::new(
            &self.long_open,
            &self.long_stop,
            &self.short_open,
            &self.short_stop,
        )
    }
}

fn gated_factor() -> [f64; 20] {
    let mut fac = FAC;
    fac[2] = 11.9;
    fac
}

#[test]
fn boll_blocked_open_is_dropped_without_delay() {
    let gate = ShortGate::new();
    let cfg = BollConfig::new(BandParams::new(4, 1.0)).with_delay_open(false);
    let out = cfg.generate(&gated_factor(), Some(&gate.filter())).unwrap();
    let expected = [
        NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0,
        0.0, -1.0,
    ];
    assert_same(&out, &expected, 0.0);
}

#[test]
fn boll_blocked_open_fires_once_filter_clears() {
    let gate = ShortGate::new();
    let cfg = BollConfig::new(BandParams::new(4, 1.0)).with_delay_open(true);
    let out = cfg.generate(&gated_factor(), Some(&gate.filter())).unwrap();
    let expected = [
        NAN, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, -1.0, -1.0, -1.0, 0.0,
        0.0, 0.0, -1.0,
    ];
    assert_same(&out, &expected, 0.0);
}

#[test]
fn boll_from_json_matches_builder() {
    let json = r#"{"type": "boll", "params": [4, 1.0], "delay_open": false}"#;
    let strategy: Strategy = serde_json::from_str(json).unwrap();
    let built = BollConfig::new(BandParams::new(4, 1.0)).with_delay_open(false);
    assert_same(
        &strategy.generate(&FAC, None).unwrap(),
        &built.generate(&FAC, None).unwrap(),
        0.0,
    );
}

#[test]
fn prob_threshold_ladder() {
    let cfg = ProbThresholdConfig::from_thresholds([0.6, 0.5, 0.4, 0.5], 1.0, 2.0);
    let out = cfg
        .generate(&[0.3, 0.6, 0.7, 0.6, 0.4, 0.2, 0.5, 0.4], None)
        .unwrap();
    assert_eq!(out, vec![-1.0, 1.0, 2.0, 2.0, -1.0, -2.0, 0.0, -1.0]);
}

// ── 2. Futures equity ────────────────────────────────────────────────

#[test]
fn future_equity_with_rollover() {
    let position = [0.0, 1.0, 1.0, 0.5, -0.5, -0.5, 0.0];
    let open = [98.0, 100.0, 103.0, 105.0, 96.0, 220.0, 226.0];
    let close = [100.0, 102.0, 105.0, 96.0, 90.0, 226.0, 220.0];
    let roll = [false, false, false, false, false, true, false];
    let cfg = FutureRetConfig {
        init_cash: 1_000_000.0,
        multiplier: 10.0,
        leverage: 2.0,
        c_rate: 3e-4,
        is_signal: false,
        ..FutureRetConfig::default()
    };
    let out = calc_future_ret(&position, &open, &close, Some(&roll), &cfg).unwrap();
    let expected = [
        1_000_000.0,
        1_039_400.0,
        1_099_400.0,
        1_004_869.805,
        1_067_027.021,
        1_037_286.821,
        1_036_957.991,
    ];
    assert_same(&out, &expected, 1e-3);
}

// ── 3. Tick equity ───────────────────────────────────────────────────

#[test]
fn tick_equity_round_trips() {
    let signal = [0.0, 1.0, 1.0, 0.0, -1.0, -1.0, 0.0];
    let bid = [100.0, 100.0, 101.0, 102.0, 101.0, 99.0, 100.0];
    let ask: Vec<f64> = bid.iter().map(|b| b + 1.0).collect();
    let cfg = TickRetConfig {
        init_cash: 10_000.0,
        c_rate: 1e-4,
        ..TickRetConfig::default()
    };
    let out = calc_tick_future_ret(&signal, &bid, &ask, None, &cfg).unwrap();
    let expected = [
        10_000.0, 9_900.0001, 9_999.0001, 10_096.9903, 9_996.9904, 10_194.9904, 10_094.9905,
    ];
    assert_same(&out, &expected, 1e-6);
}

#[test]
fn tick_full_record() {
    let signal = [1.0, 3.0, 3.0, 1.0, 0.0, -2.0, -2.0, -4.0, 2.0, 0.0];
    let bid = [100.0, 101.0, 102.0, 103.0, 104.0, 103.0, 102.0, 101.0, 100.0, 99.0];
    let ask: Vec<f64> = bid.iter().map(|b| b + 1.0).collect();
    let cfg = TickFullConfig {
        c_rate: 0.0,
        open_price_method: OpenPriceMethod::Average,
        ..TickFullConfig::default()
    };
    let r = calc_tick_future_ret_full(&signal, &bid, &ask, None, &cfg).unwrap();
    assert_same(
        &r.cash,
        &[-1.0, -2.0, 1.0, 4.0, 5.0, 3.0, 5.0, 5.0, 7.0, 5.0],
        1e-9,
    );
    assert_eq!(r.lots, signal.to_vec());
    let avg = 305.0 / 3.0;
    assert_same(
        &r.open_price,
        &[101.0, avg, avg, avg, NAN, 103.0, 103.0, 102.0, 101.0, NAN],
        1e-9,
    );
}

// ── 4. Pipeline ──────────────────────────────────────────────────────

#[test]
fn signal_to_equity_to_trades() {
    let signal = BollConfig::new(BandParams::new(4, 1.0))
        .with_delay_open(false)
        .generate(&FAC, None)
        .unwrap();
    let price: Vec<f64> = FAC.iter().map(|f| 100.0 + f).collect();

    let cfg = FutureRetConfig {
        init_cash: 100_000.0,
        c_rate: 0.0,
        ..FutureRetConfig::default()
    };
    let equity = calc_future_ret(&signal, &price, &price, None, &cfg).unwrap();
    assert_eq!(equity.len(), FAC.len());
    // signals execute one bar later, so nothing moves before the first entry fills
    assert!(equity[..3].iter().all(|&e| e == 100_000.0));

    let trades = to_trades(&signal, &minutes(FAC.len()), TradePrices::Single(&price)).unwrap();
    let summary: Vec<(Side, usize, Option<usize>)> = trades
        .iter()
        .map(|t| (t.side, t.entry_bar, t.exit_bar))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Side::Long, 2, Some(3)),
            (Side::Long, 9, Some(11)),
            (Side::Short, 11, Some(16)),
            (Side::Short, 19, None),
        ]
    );
    assert!(!trades[0].is_winner());
    assert!(trades[2].is_winner());
}
