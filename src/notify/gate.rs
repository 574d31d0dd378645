use std::collections::HashMap;

use crate::config::NotifyConfig;
use crate::error::AppError;
use crate::model::signal::TradingSignal;

use super::format::format_signal;
use super::NotifierSink;

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Sent,
    /// Suppressed by the per-symbol cooldown. Not a failure.
    RateLimited { retry_in_ms: u64 },
    BelowConfidence { confidence: f64 },
}

/// Per-symbol cooldown in front of the notifier sink.
#[derive(Debug)]
pub struct NotificationGate {
    cooldown_ms: u64,
    retention_ms: u64,
    min_confidence: f64,
    price_decimals: usize,
    last_sent: HashMap<String, u64>,
}

impl NotificationGate {
    pub fn new(config: &NotifyConfig, min_confidence: f64) -> Self {
        Self {
            cooldown_ms: config.cooldown_secs.saturating_mul(1000),
            retention_ms: config.retention_secs.saturating_mul(1000),
            min_confidence,
            price_decimals: config.price_decimals,
            last_sent: HashMap::new(),
        }
    }

    pub fn qualifies(&self, signal: &TradingSignal) -> bool {
        signal.confidence >= self.min_confidence
    }

    /// Milliseconds left in the symbol's cooldown, if any.
    pub fn cooldown_remaining(&self, symbol: &str, now_ms: u64) -> Option<u64> {
        let last = *self.last_sent.get(symbol)?;
        let elapsed = now_ms.saturating_sub(last);
        (elapsed < self.cooldown_ms).then(|| self.cooldown_ms - elapsed)
    }

    /// Format and send the signal unless gated.
    ///
    /// The cooldown clock only starts on a successful send, so a failed
    /// delivery may be retried on the next cycle.
    pub async fn dispatch(
        &mut self,
        signal: &TradingSignal,
        sink: &dyn NotifierSink,
        now_ms: u64,
    ) -> Result<Dispatch, AppError> {
        if !self.qualifies(signal) {
            return Ok(Dispatch::BelowConfidence {
                confidence: signal.confidence,
            });
        }
        if let Some(retry_in_ms) = self.cooldown_remaining(&signal.symbol, now_ms) {
            tracing::debug!(
                symbol = %signal.symbol,
                retry_in_ms,
                "Alert suppressed by cooldown"
            );
            return Ok(Dispatch::RateLimited { retry_in_ms });
        }

        let message = format_signal(signal, self.price_decimals);
        match sink.send(&message).await {
            Ok(()) => {
                self.last_sent.insert(signal.symbol.clone(), now_ms);
                tracing::info!(
                    symbol = %signal.symbol,
                    direction = %signal.direction,
                    price = signal.price,
                    confidence = signal.confidence,
                    "Alert sent"
                );
                Ok(Dispatch::Sent)
            }
            Err(e) => {
                tracing::error!(symbol = %signal.symbol, error = %e, "Alert delivery failed");
                Err(e)
            }
        }
    }

    /// Forget symbols whose last alert is older than the retention window.
    /// A record still inside its cooldown is never dropped.
    pub fn purge(&mut self, now_ms: u64) -> usize {
        let before = self.last_sent.len();
        let retention_ms = self.retention_ms.max(self.cooldown_ms);
        self.last_sent
            .retain(|_, sent_ms| now_ms.saturating_sub(*sent_ms) < retention_ms);
        before - self.last_sent.len()
    }

    pub fn last_sent(&self, symbol: &str) -> Option<u64> {
        self.last_sent.get(symbol).copied()
    }

    pub fn tracked(&self) -> usize {
        self.last_sent.len()
    }
}
