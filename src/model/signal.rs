use std::fmt;

use serde::Serialize;

use crate::indicator::IndicatorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directional alert candidate. Built once per qualifying evaluation and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSignal {
    pub symbol: String,
    pub price: f64,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub direction: Direction,
    pub confidence: f64,
    pub timestamp_ms: u64,
    pub indicators: IndicatorSet,
}

impl TradingSignal {
    /// Distance from entry to the stop, always positive for a well-formed signal.
    pub fn risk(&self) -> f64 {
        match self.direction {
            Direction::Long => self.entry - self.stop_loss,
            Direction::Short => self.stop_loss - self.entry,
        }
    }

    pub fn reward(&self) -> f64 {
        match self.direction {
            Direction::Long => self.take_profit - self.entry,
            Direction::Short => self.entry - self.take_profit,
        }
    }
}
