use super::ema::Ema;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdPoint {
    pub macd: f64,
    /// `None` until the signal EMA has seen `signal_period` MACD values.
    pub signal: Option<f64>,
}

impl MacdPoint {
    pub fn histogram(&self) -> Option<f64> {
        self.signal.map(|s| self.macd - s)
    }
}

/// MACD line (fast EMA minus slow EMA) with an EMA signal line over the MACD series.
#[derive(Debug, Clone)]
pub struct Macd {
    fast_ema: Ema,
    slow_ema: Ema,
    signal_ema: Ema,
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        assert!(
            fast_period < slow_period,
            "MACD fast period must be shorter than slow period"
        );
        Self {
            fast_ema: Ema::new(fast_period),
            slow_ema: Ema::new(slow_period),
            signal_ema: Ema::new(signal_period),
        }
    }

    pub fn push(&mut self, price: f64) -> Option<MacdPoint> {
        // Both EMAs must see every price, so push before matching.
        let fast = self.fast_ema.push(price);
        let slow = self.slow_ema.push(price);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return None;
        };
        let macd = fast - slow;
        let signal = self.signal_ema.push(macd);
        Some(MacdPoint { macd, signal })
    }

    /// First index at which the signal line is defined.
    pub fn lookback(&self) -> usize {
        self.slow_ema.lookback() + self.signal_ema.lookback()
    }
}
