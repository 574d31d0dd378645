use crate::model::signal::{Direction, TradingSignal};

/// Entries kept per marker; older ones are dropped first.
pub const MAX_ENTRY_POINTS: usize = 32;

/// Open-signal marker for one symbol.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub state_id: String,
    pub symbol: String,
    pub start_time_ms: u64,
    pub last_signal_ms: u64,
    pub current_price: f64,
    pub highest_price: f64,
    pub lowest_price: f64,
    pub entry_points: Vec<f64>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub direction: Direction,
    pub is_active: bool,
}

impl MarketState {
    pub fn from_signal(signal: &TradingSignal, now_ms: u64) -> Self {
        Self {
            state_id: format!("mkt-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            symbol: signal.symbol.clone(),
            start_time_ms: now_ms,
            last_signal_ms: now_ms,
            current_price: signal.price,
            highest_price: signal.price,
            lowest_price: signal.price,
            entry_points: vec![signal.entry],
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            direction: signal.direction,
            is_active: true,
        }
    }

    /// Fold a newer signal into the marker: levels and direction follow the latest signal.
    pub fn apply_signal(&mut self, signal: &TradingSignal, now_ms: u64) {
        self.last_signal_ms = now_ms;
        if self.entry_points.len() >= MAX_ENTRY_POINTS {
            let excess = self.entry_points.len() + 1 - MAX_ENTRY_POINTS;
            self.entry_points.drain(..excess);
        }
        self.entry_points.push(signal.entry);
        self.stop_loss = signal.stop_loss;
        self.take_profit = signal.take_profit;
        self.direction = signal.direction;
        self.is_active = true;
        self.observe_price(signal.price);
    }

    pub fn observe_price(&mut self, price: f64) {
        self.current_price = price;
        self.highest_price = self.highest_price.max(price);
        self.lowest_price = self.lowest_price.min(price);
    }

    pub fn stop_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    pub fn target_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price >= self.take_profit,
            Direction::Short => price <= self.take_profit,
        }
    }
}
