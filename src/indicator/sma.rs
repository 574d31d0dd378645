use std::collections::VecDeque;

/// Rolling mean over the last `period` closes.
///
/// Seeds the EMAs and carries the Bollinger middle band, so it also reports
/// the population deviation of whatever is currently in the window.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "SMA period must be > 0");
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
        }
    }

    /// Slide the window by one close. `None` until `period` closes have been seen.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        if self.window.len() == self.period {
            if let Some(oldest) = self.window.pop_front() {
                self.sum -= oldest;
            }
        }
        self.window.push_back(close);
        self.sum += close;
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        self.is_ready().then(|| self.sum / self.period as f64)
    }

    /// Population (divide by N) deviation, taken from the window itself.
    pub fn std_dev(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let n = self.period as f64;
        let mean = self.window.iter().sum::<f64>() / n;
        let variance = self.window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;
        Some(variance.sqrt())
    }

    pub fn is_ready(&self) -> bool {
        self.window.len() == self.period
    }

    pub fn period(&self) -> usize {
        self.period
    }
}
