use std::collections::HashMap;

use crate::model::market_state::MarketState;
use crate::model::signal::TradingSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    StopLoss,
    TakeProfit,
    Expired,
}

/// Per-symbol open-signal markers.
///
/// A marker goes inactive when price crosses its stop or target and is evicted
/// at the next sweep; markers without a fresh signal for `ttl_ms` are evicted too.
#[derive(Debug, Default)]
pub struct MarketBook {
    states: HashMap<String, MarketState>,
    ttl_ms: u64,
}

impl MarketBook {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            states: HashMap::new(),
            ttl_ms,
        }
    }

    /// Create or refresh the marker for the signal's symbol. Returns its state id.
    pub fn on_signal(&mut self, signal: &TradingSignal, now_ms: u64) -> String {
        let state = self
            .states
            .entry(signal.symbol.clone())
            .and_modify(|s| s.apply_signal(signal, now_ms))
            .or_insert_with(|| MarketState::from_signal(signal, now_ms));
        state.state_id.clone()
    }

    /// Record the latest close; the first stop/target crossing deactivates the marker.
    pub fn on_price(&mut self, symbol: &str, price: f64) -> Option<ExitTrigger> {
        let state = self.states.get_mut(symbol)?;
        if !state.is_active {
            return None;
        }
        state.observe_price(price);
        let trigger = if state.stop_hit(price) {
            ExitTrigger::StopLoss
        } else if state.target_hit(price) {
            ExitTrigger::TakeProfit
        } else {
            return None;
        };
        state.is_active = false;
        Some(trigger)
    }

    /// Drop inactive markers and markers whose last signal is older than the TTL.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<(MarketState, ExitTrigger)> {
        let ttl_ms = self.ttl_ms;
        let expired: Vec<String> = self
            .states
            .iter()
            .filter(|(_, s)| !s.is_active || now_ms.saturating_sub(s.last_signal_ms) >= ttl_ms)
            .map(|(symbol, _)| symbol.clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for symbol in expired {
            if let Some(state) = self.states.remove(&symbol) {
                let trigger = if state.is_active {
                    ExitTrigger::Expired
                } else if state.stop_hit(state.current_price) {
                    ExitTrigger::StopLoss
                } else {
                    ExitTrigger::TakeProfit
                };
                removed.push((state, trigger));
            }
        }
        removed
    }

    pub fn get(&self, symbol: &str) -> Option<&MarketState> {
        self.states.get(symbol)
    }

    pub fn active_symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self
            .states
            .values()
            .filter(|s| s.is_active)
            .map(|s| s.symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
