use ping_sentry::config::IndicatorsConfig;
use ping_sentry::indicator::{IndicatorEngine, InsufficientData};
use ping_sentry::model::candle::Candle;

/// Closes rise by 1 per bar from `start`; every bar spans close +/- 1.
fn rising(n: usize, start: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = start + i as f64;
            Candle {
                open_time: i as u64 * 300_000,
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 10.0,
            }
        })
        .collect()
}

fn engine() -> IndicatorEngine {
    IndicatorEngine::new(&IndicatorsConfig::default())
}

#[test]
fn default_periods_need_fifty_candles() {
    assert_eq!(IndicatorEngine::required_candles(&IndicatorsConfig::default()), 50);
    assert_eq!(engine().min_candles(), 50);
}

#[test]
fn short_window_is_insufficient() {
    let err = engine().evaluate(&rising(49, 100.0)).unwrap_err();
    assert_eq!(err, InsufficientData::TooShort { have: 49, need: 50 });
    assert!(engine().evaluate(&[]).is_err());
}

#[test]
fn non_finite_candle_is_insufficient() {
    let mut candles = rising(60, 100.0);
    candles[10].high = f64::NAN;
    assert_eq!(
        engine().evaluate(&candles).unwrap_err(),
        InsufficientData::NonFinite { index: 10 }
    );

    candles[10].high = 111.0;
    candles[59].close = f64::INFINITY;
    assert!(engine().evaluate(&candles).is_err());
}

#[test]
fn minimum_window_yields_finite_set() {
    let set = engine().evaluate(&rising(50, 100.0)).unwrap();
    assert!(set.is_finite());
    for (name, value) in set.entries() {
        assert!(value.is_finite(), "{} = {}", name, value);
    }
}

#[test]
fn series_warm_up_lengths() {
    let series = engine().compute(&rising(60, 100.0)).unwrap();
    assert_eq!(series.len(), 60);
    assert!(series.ema_short[7].is_none() && series.ema_short[8].is_some());
    assert!(series.ema_long[48].is_none() && series.ema_long[49].is_some());
    assert!(series.rsi[13].is_none() && series.rsi[14].is_some());
    assert!(series.macd[24].is_none() && series.macd[25].is_some());
    assert!(series.macd_signal[32].is_none() && series.macd_signal[33].is_some());
    assert!(series.bb_middle[18].is_none() && series.bb_middle[19].is_some());
    assert!(series.atr[13].is_none() && series.atr[14].is_some());
    assert_eq!(series.at(20), Err("EMA_long"));
    assert!(series.latest().is_ok());
}

#[test]
fn linear_trend_values() {
    let set = engine().evaluate(&rising(50, 100.0)).unwrap();
    // A linear series keeps each EMA exactly (period - 1) / 2 behind the last close.
    assert!((set.ema_short - 145.0).abs() < 1e-9);
    assert!((set.ema_medium - 139.0).abs() < 1e-9);
    assert!((set.ema_long - 124.5).abs() < 1e-9);
    assert!((set.macd - 7.0).abs() < 1e-9);
    assert!((set.macd_signal - 7.0).abs() < 1e-9);
    assert!((set.rsi - 100.0).abs() < 1e-12);
    assert!((set.atr - 2.0).abs() < 1e-12);
    assert!((set.bb_middle - 139.5).abs() < 1e-9);
    assert!(set.bb_upper > set.bb_middle && set.bb_lower < set.bb_middle);
    assert!(((set.bb_upper - set.bb_middle) - (set.bb_middle - set.bb_lower)).abs() < 1e-9);
    assert_eq!(set.get("ATR"), Some(set.atr));
    assert_eq!(set.get("nope"), None);
}

#[test]
fn falling_closes_push_rsi_to_zero() {
    let mut candles = rising(50, 100.0);
    candles.reverse();
    for (i, c) in candles.iter_mut().enumerate() {
        c.open_time = i as u64 * 300_000;
    }
    let set = engine().evaluate(&candles).unwrap();
    assert!(set.rsi.abs() < 1e-12);
    assert!(set.ema_short < set.ema_medium);
}

#[test]
fn configured_minimum_only_raises_the_floor() {
    let raised = IndicatorEngine::new(&IndicatorsConfig {
        min_candles: Some(80),
        ..IndicatorsConfig::default()
    });
    assert_eq!(raised.min_candles(), 80);
    assert!(raised.evaluate(&rising(60, 100.0)).is_err());

    let lowered = IndicatorEngine::new(&IndicatorsConfig {
        min_candles: Some(10),
        ..IndicatorsConfig::default()
    });
    assert_eq!(lowered.min_candles(), 50);
}
