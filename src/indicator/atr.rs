use crate::model::candle::Candle;

/// Average True Range with Wilder smoothing.
///
/// The first bar has no previous close and only primes the indicator; the
/// first value is the mean of the next `period` true ranges.
#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    prev_close: Option<f64>,
    warmup_count: usize,
    tr_sum: f64,
    atr: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "ATR period must be > 0");
        Self {
            period,
            prev_close: None,
            warmup_count: 0,
            tr_sum: 0.0,
            atr: None,
        }
    }

    pub fn push(&mut self, candle: &Candle) -> Option<f64> {
        let prev_close = self.prev_close.replace(candle.close)?;
        let tr = candle.true_range(Some(prev_close));
        let period = self.period as f64;

        self.atr = match self.atr {
            Some(prev) => Some((prev * (period - 1.0) + tr) / period),
            None => {
                self.tr_sum += tr;
                self.warmup_count += 1;
                if self.warmup_count < self.period {
                    return None;
                }
                Some(self.tr_sum / period)
            }
        };
        self.atr
    }

    pub fn value(&self) -> Option<f64> {
        self.atr
    }

    pub fn lookback(&self) -> usize {
        self.period
    }
}
