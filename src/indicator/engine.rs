use serde::Serialize;
use thiserror::Error;

use super::atr::Atr;
use super::bollinger::Bollinger;
use super::ema::Ema;
use super::macd::Macd;
use super::rsi::Rsi;
use crate::config::IndicatorsConfig;
use crate::model::candle::Candle;

/// Why a window produced no indicator set. Expected during warm-up and for thin markets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InsufficientData {
    #[error("window has {have} candles, need at least {need}")]
    TooShort { have: usize, need: usize },
    #[error("non-finite value in candle {index}")]
    NonFinite { index: usize },
    #[error("{name} is undefined at the end of the window")]
    Undefined { name: &'static str },
}

/// Latest value of every indicator for one candle window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorSet {
    #[serde(rename = "EMA_short")]
    pub ema_short: f64,
    #[serde(rename = "EMA_medium")]
    pub ema_medium: f64,
    #[serde(rename = "EMA_long")]
    pub ema_long: f64,
    #[serde(rename = "RSI")]
    pub rsi: f64,
    #[serde(rename = "MACD")]
    pub macd: f64,
    #[serde(rename = "MACD_signal")]
    pub macd_signal: f64,
    #[serde(rename = "BB_upper")]
    pub bb_upper: f64,
    #[serde(rename = "BB_middle")]
    pub bb_middle: f64,
    #[serde(rename = "BB_lower")]
    pub bb_lower: f64,
    #[serde(rename = "ATR")]
    pub atr: f64,
}

impl IndicatorSet {
    pub fn entries(&self) -> [(&'static str, f64); 10] {
        [
            ("EMA_short", self.ema_short),
            ("EMA_medium", self.ema_medium),
            ("EMA_long", self.ema_long),
            ("RSI", self.rsi),
            ("MACD", self.macd),
            ("MACD_signal", self.macd_signal),
            ("BB_upper", self.bb_upper),
            ("BB_middle", self.bb_middle),
            ("BB_lower", self.bb_lower),
            ("ATR", self.atr),
        ]
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn is_finite(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_finite())
    }
}

/// Full per-candle series, index-aligned with the input window.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    pub ema_short: Vec<Option<f64>>,
    pub ema_medium: Vec<Option<f64>>,
    pub ema_long: Vec<Option<f64>>,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub bb_upper: Vec<Option<f64>>,
    pub bb_middle: Vec<Option<f64>>,
    pub bb_lower: Vec<Option<f64>>,
    pub atr: Vec<Option<f64>>,
}

impl IndicatorSeries {
    fn with_capacity(n: usize) -> Self {
        Self {
            ema_short: Vec::with_capacity(n),
            ema_medium: Vec::with_capacity(n),
            ema_long: Vec::with_capacity(n),
            rsi: Vec::with_capacity(n),
            macd: Vec::with_capacity(n),
            macd_signal: Vec::with_capacity(n),
            bb_upper: Vec::with_capacity(n),
            bb_middle: Vec::with_capacity(n),
            bb_lower: Vec::with_capacity(n),
            atr: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.ema_short.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ema_short.is_empty()
    }

    /// The complete set at `index`, or the name of the first indicator still warming up.
    pub fn at(&self, index: usize) -> Result<IndicatorSet, &'static str> {
        fn pick(
            series: &[Option<f64>],
            index: usize,
            name: &'static str,
        ) -> Result<f64, &'static str> {
            series.get(index).copied().flatten().ok_or(name)
        }
        Ok(IndicatorSet {
            ema_short: pick(&self.ema_short, index, "EMA_short")?,
            ema_medium: pick(&self.ema_medium, index, "EMA_medium")?,
            ema_long: pick(&self.ema_long, index, "EMA_long")?,
            rsi: pick(&self.rsi, index, "RSI")?,
            macd: pick(&self.macd, index, "MACD")?,
            macd_signal: pick(&self.macd_signal, index, "MACD_signal")?,
            bb_upper: pick(&self.bb_upper, index, "BB_upper")?,
            bb_middle: pick(&self.bb_middle, index, "BB_middle")?,
            bb_lower: pick(&self.bb_lower, index, "BB_lower")?,
            atr: pick(&self.atr, index, "ATR")?,
        })
    }

    pub fn latest(&self) -> Result<IndicatorSet, &'static str> {
        match self.len() {
            0 => Err("window"),
            n => self.at(n - 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorsConfig,
    min_candles: usize,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorsConfig) -> Self {
        let required = Self::required_candles(config);
        Self {
            config: config.clone(),
            min_candles: config.min_candles.unwrap_or(required).max(required),
        }
    }

    /// Shortest window for which every configured indicator has a final value.
    pub fn required_candles(config: &IndicatorsConfig) -> usize {
        let lookbacks = [
            Ema::new(config.ema_short).lookback(),
            Ema::new(config.ema_medium).lookback(),
            Ema::new(config.ema_long).lookback(),
            Rsi::new(config.rsi_period).lookback(),
            Macd::new(config.macd_fast, config.macd_slow, config.macd_signal).lookback(),
            Bollinger::new(config.bb_period, config.bb_std_dev).lookback(),
            Atr::new(config.atr_period).lookback(),
        ];
        lookbacks.into_iter().max().unwrap_or(0) + 1
    }

    pub fn min_candles(&self) -> usize {
        self.min_candles
    }

    /// Recompute every series over the window in a single pass.
    pub fn compute(&self, candles: &[Candle]) -> Result<IndicatorSeries, InsufficientData> {
        if candles.len() < self.min_candles {
            return Err(InsufficientData::TooShort {
                have: candles.len(),
                need: self.min_candles,
            });
        }
        if let Some(index) = candles.iter().position(|c| !c.is_finite()) {
            return Err(InsufficientData::NonFinite { index });
        }

        let cfg = &self.config;
        let mut ema_short = Ema::new(cfg.ema_short);
        let mut ema_medium = Ema::new(cfg.ema_medium);
        let mut ema_long = Ema::new(cfg.ema_long);
        let mut rsi = Rsi::new(cfg.rsi_period);
        let mut macd = Macd::new(cfg.macd_fast, cfg.macd_slow, cfg.macd_signal);
        let mut bollinger = Bollinger::new(cfg.bb_period, cfg.bb_std_dev);
        let mut atr = Atr::new(cfg.atr_period);

        let mut series = IndicatorSeries::with_capacity(candles.len());
        for candle in candles {
            let close = candle.close;
            series.ema_short.push(ema_short.push(close));
            series.ema_medium.push(ema_medium.push(close));
            series.ema_long.push(ema_long.push(close));
            series.rsi.push(rsi.push(close));

            let point = macd.push(close);
            series.macd.push(point.map(|p| p.macd));
            series.macd_signal.push(point.and_then(|p| p.signal));

            let bands = bollinger.push(close);
            series.bb_upper.push(bands.map(|b| b.upper));
            series.bb_middle.push(bands.map(|b| b.middle));
            series.bb_lower.push(bands.map(|b| b.lower));

            series.atr.push(atr.push(candle));
        }
        Ok(series)
    }

    /// Latest indicator values, guaranteed complete and finite.
    pub fn evaluate(&self, candles: &[Candle]) -> Result<IndicatorSet, InsufficientData> {
        let series = self.compute(candles)?;
        let set = series
            .latest()
            .map_err(|name| InsufficientData::Undefined { name })?;
        if !set.is_finite() {
            // Finite inputs can still overflow, e.g. prices near f64::MAX.
            return Err(InsufficientData::NonFinite {
                index: candles.len() - 1,
            });
        }
        Ok(set)
    }
}
