use crate::config::SignalConfig;
use crate::indicator::IndicatorSet;
use crate::model::signal::{Direction, TradingSignal};

use super::SignalPolicy;

/// EMA trend, RSI headroom and MACD momentum must all agree.
///
/// LONG is checked first; the two rules need opposite EMA orderings, so at
/// most one can hold for a given indicator set.
#[derive(Debug, Clone)]
pub struct TrendConfluencePolicy {
    rsi_overbought: f64,
    rsi_oversold: f64,
    confidence: f64,
    stop_atr_mult: f64,
    take_profit_atr_mult: f64,
}

impl TrendConfluencePolicy {
    pub fn new(config: &SignalConfig) -> Self {
        Self {
            rsi_overbought: config.rsi_overbought,
            rsi_oversold: config.rsi_oversold,
            confidence: config.base_confidence.clamp(0.0, 1.0),
            stop_atr_mult: config.stop_atr_mult,
            take_profit_atr_mult: config.take_profit_atr_mult,
        }
    }

    pub fn direction(&self, ind: &IndicatorSet) -> Option<Direction> {
        if ind.ema_short > ind.ema_medium
            && ind.rsi < self.rsi_overbought
            && ind.macd > ind.macd_signal
        {
            Some(Direction::Long)
        } else if ind.ema_short < ind.ema_medium
            && ind.rsi > self.rsi_oversold
            && ind.macd < ind.macd_signal
        {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

impl SignalPolicy for TrendConfluencePolicy {
    fn name(&self) -> &'static str {
        "trend_confluence"
    }

    fn evaluate(
        &self,
        symbol: &str,
        price: f64,
        indicators: &IndicatorSet,
        now_ms: u64,
    ) -> Option<TradingSignal> {
        if !price.is_finite() || !indicators.is_finite() {
            return None;
        }
        let direction = self.direction(indicators)?;
        let stop = self.stop_atr_mult * indicators.atr;
        let target = self.take_profit_atr_mult * indicators.atr;
        let (stop_loss, take_profit) = match direction {
            Direction::Long => (price - stop, price + target),
            Direction::Short => (price + stop, price - target),
        };
        Some(TradingSignal {
            symbol: symbol.to_string(),
            price,
            entry: price,
            stop_loss,
            take_profit,
            direction,
            confidence: self.confidence,
            timestamp_ms: now_ms,
            indicators: *indicators,
        })
    }
}
