#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ping_sentry::config::Config;
use ping_sentry::error::AppError;
use ping_sentry::indicator::IndicatorSet;
use ping_sentry::model::candle::Candle;
use ping_sentry::model::feed_row::RawFeedRow;
use ping_sentry::model::signal::{Direction, TradingSignal};
use ping_sentry::notify::NotifierSink;
use ping_sentry::source::DataSource;
use ping_sentry::strategy::SignalPolicy;

/// Closes rise by 1 per bar from `start`; bars span close +/- 1 so ATR settles at 2.
pub fn rising_candles(n: usize, start: f64) -> Vec<Candle> {
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

pub fn ping_row(coin: &str, pings: u32, datetime: &str) -> RawFeedRow {
    RawFeedRow::new([
        coin.to_string(),
        pings.to_string(),
        "1.25".to_string(),
        "3.5%".to_string(),
        "12.0".to_string(),
        "8%".to_string(),
        "0.75".to_string(),
        datetime.to_string(),
    ])
}

pub fn sample_indicators() -> IndicatorSet {
    IndicatorSet {
        ema_short: 105.0,
        ema_medium: 100.0,
        ema_long: 98.0,
        rsi: 45.0,
        macd: 1.2,
        macd_signal: 1.0,
        bb_upper: 110.0,
        bb_middle: 100.0,
        bb_lower: 90.0,
        atr: 2.0,
    }
}

pub fn long_signal(symbol: &str, price: f64, confidence: f64, now_ms: u64) -> TradingSignal {
    TradingSignal {
        symbol: symbol.to_string(),
        price,
        entry: price,
        stop_loss: price - 4.0,
        take_profit: price + 6.0,
        direction: Direction::Long,
        confidence,
        timestamp_ms: now_ms,
        indicators: sample_indicators(),
    }
}

/// Config with short, deterministic timings for supervisor tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.notify.telegram_token = "test-token".to_string();
    config.notify.telegram_chat_id = "42".to_string();
    config.health.enabled = false;
    config
}

/// LONG on every complete indicator set, levels at 2x/3x ATR.
pub struct AlwaysLong;

impl SignalPolicy for AlwaysLong {
    fn name(&self) -> &'static str {
        "always_long"
    }

    fn evaluate(
        &self,
        symbol: &str,
        price: f64,
        indicators: &IndicatorSet,
        now_ms: u64,
    ) -> Option<TradingSignal> {
        Some(TradingSignal {
            symbol: symbol.to_string(),
            price,
            entry: price,
            stop_loss: price - 2.0 * indicators.atr,
            take_profit: price + 3.0 * indicators.atr,
            direction: Direction::Long,
            confidence: 0.9,
            timestamp_ms: now_ms,
            indicators: *indicators,
        })
    }
}

#[derive(Default)]
pub struct MockSink {
    pub sent: Mutex<Vec<String>>,
    pub verify_fails: bool,
    /// Number of upcoming sends that fail.
    pub failures_left: AtomicU32,
}

impl MockSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_verify() -> Arc<Self> {
        Arc::new(Self {
            verify_fails: true,
            ..Self::default()
        })
    }

    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.contains("Trading Signal"))
            .collect()
    }
}

#[async_trait]
impl NotifierSink for MockSink {
    async fn verify(&self) -> Result<String, AppError> {
        if self.verify_fails {
            return Err(AppError::FatalAdapter("bot token rejected".to_string()));
        }
        Ok("@mock_bot".to_string())
    }

    async fn send(&self, text: &str) -> Result<(), AppError> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(AppError::Notification {
                attempts: 3,
                msg: "chat unreachable".to_string(),
            });
        }
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct SourceScript {
    pub acquire_calls: u32,
    pub release_calls: u32,
    pub poll_calls: u32,
    pub fatal_acquire: bool,
    pub polls: VecDeque<Result<Vec<RawFeedRow>, AppError>>,
    /// Once `polls` is drained: fail transiently, or return an empty batch.
    pub fail_when_drained: bool,
    pub candles: HashMap<String, Vec<Candle>>,
    pub transient_candles: bool,
    pub candle_requests: Vec<String>,
}

/// Scripted data source; the script stays shared with the test for inspection.
pub struct MockSource {
    pub script: Arc<Mutex<SourceScript>>,
}

impl MockSource {
    pub fn new(script: SourceScript) -> (Self, Arc<Mutex<SourceScript>>) {
        let script = Arc::new(Mutex::new(script));
        (
            Self {
                script: script.clone(),
            },
            script,
        )
    }
}

#[async_trait]
impl DataSource for MockSource {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn acquire(&mut self) -> Result<(), AppError> {
        let mut script = self.script.lock().unwrap();
        script.acquire_calls += 1;
        if script.fatal_acquire {
            return Err(AppError::FatalAdapter("webdriver refused session".to_string()));
        }
        Ok(())
    }

    async fn release(&mut self) {
        self.script.lock().unwrap().release_calls += 1;
    }

    async fn poll_feed(&mut self) -> Result<Vec<RawFeedRow>, AppError> {
        let mut script = self.script.lock().unwrap();
        script.poll_calls += 1;
        match script.polls.pop_front() {
            Some(batch) => batch,
            None if script.fail_when_drained => {
                Err(AppError::TransientFeed("page did not load".to_string()))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        _interval: &str,
        _limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        let mut script = self.script.lock().unwrap();
        script.candle_requests.push(symbol.to_string());
        if script.transient_candles {
            return Err(AppError::TransientNetwork("klines timed out".to_string()));
        }
        script
            .candles
            .get(symbol)
            .cloned()
            .ok_or_else(|| AppError::BinanceApi {
                code: -1121,
                msg: "Invalid symbol.".to_string(),
            })
    }
}
