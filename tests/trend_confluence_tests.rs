use ping_sentry::config::SignalConfig;
use ping_sentry::indicator::IndicatorSet;
use ping_sentry::model::signal::Direction;
use ping_sentry::strategy::{SignalPolicy, TrendConfluencePolicy};

fn indicators(
    ema_short: f64,
    ema_medium: f64,
    rsi: f64,
    macd: f64,
    macd_signal: f64,
) -> IndicatorSet {
    IndicatorSet {
        ema_short,
        ema_medium,
        ema_long: 98.0,
        rsi,
        macd,
        macd_signal,
        bb_upper: 110.0,
        bb_middle: 100.0,
        bb_lower: 90.0,
        atr: 2.0,
    }
}

fn policy() -> TrendConfluencePolicy {
    TrendConfluencePolicy::new(&SignalConfig::default())
}

#[test]
fn bullish_confluence_gives_long_with_atr_levels() {
    let signal = policy()
        .evaluate("BTCUSDT", 100.0, &indicators(105.0, 100.0, 45.0, 1.2, 1.0), 1_000)
        .unwrap();
    assert_eq!(signal.direction, Direction::Long);
    assert_eq!(signal.symbol, "BTCUSDT");
    assert!((signal.entry - 100.0).abs() < 1e-12);
    assert!((signal.stop_loss - 96.0).abs() < 1e-12);
    assert!((signal.take_profit - 106.0).abs() < 1e-12);
    assert!((signal.confidence - 0.8).abs() < 1e-12);
    assert_eq!(signal.timestamp_ms, 1_000);
    assert!((signal.indicators.rsi - 45.0).abs() < 1e-12);
}

#[test]
fn bearish_confluence_gives_short_with_mirrored_levels() {
    let signal = policy()
        .evaluate("ETHUSDT", 100.0, &indicators(95.0, 100.0, 55.0, -1.2, -1.0), 0)
        .unwrap();
    assert_eq!(signal.direction, Direction::Short);
    assert!((signal.stop_loss - 104.0).abs() < 1e-12);
    assert!((signal.take_profit - 94.0).abs() < 1e-12);
}

#[test]
fn overbought_rsi_blocks_long() {
    let out = policy().evaluate("BTCUSDT", 100.0, &indicators(105.0, 100.0, 75.0, 1.2, 1.0), 0);
    assert!(out.is_none());
}

#[test]
fn disagreeing_macd_gives_nothing() {
    assert!(policy()
        .evaluate("BTCUSDT", 100.0, &indicators(105.0, 100.0, 45.0, 0.8, 1.0), 0)
        .is_none());
    assert!(policy()
        .evaluate("BTCUSDT", 100.0, &indicators(95.0, 100.0, 45.0, 1.2, 1.0), 0)
        .is_none());
}

#[test]
fn long_and_short_are_mutually_exclusive() {
    let p = policy();
    let values = [90.0, 99.9, 100.0, 100.1, 110.0];
    let rsis = [10.0, 30.0, 50.0, 70.0, 90.0];
    let macds = [-1.0, 0.0, 1.0];
    for &short in &values {
        for &rsi in &rsis {
            for &macd in &macds {
                let ind = indicators(short, 100.0, rsi, macd, 0.0);
                let long_rule = ind.ema_short > ind.ema_medium
                    && ind.rsi < 70.0
                    && ind.macd > ind.macd_signal;
                let short_rule = ind.ema_short < ind.ema_medium
                    && ind.rsi > 30.0
                    && ind.macd < ind.macd_signal;
                assert!(!(long_rule && short_rule));
                match p.direction(&ind) {
                    Some(Direction::Long) => assert!(long_rule),
                    Some(Direction::Short) => assert!(short_rule),
                    None => assert!(!long_rule && !short_rule),
                }
            }
        }
    }
}

#[test]
fn non_finite_inputs_give_no_signal() {
    let p = policy();
    assert!(p
        .evaluate("BTCUSDT", f64::NAN, &indicators(105.0, 100.0, 45.0, 1.2, 1.0), 0)
        .is_none());
    let mut ind = indicators(105.0, 100.0, 45.0, 1.2, 1.0);
    ind.atr = f64::INFINITY;
    assert!(p.evaluate("BTCUSDT", 100.0, &ind, 0).is_none());
}

#[test]
fn multipliers_and_confidence_follow_config() {
    let p = TrendConfluencePolicy::new(&SignalConfig {
        stop_atr_mult: 1.0,
        take_profit_atr_mult: 4.0,
        base_confidence: 0.65,
        ..SignalConfig::default()
    });
    let signal = p
        .evaluate("BTCUSDT", 100.0, &indicators(105.0, 100.0, 45.0, 1.2, 1.0), 0)
        .unwrap();
    assert!((signal.stop_loss - 98.0).abs() < 1e-12);
    assert!((signal.take_profit - 108.0).abs() < 1e-12);
    assert!((signal.confidence - 0.65).abs() < 1e-12);
    assert_eq!(p.name(), "trend_confluence");
}
