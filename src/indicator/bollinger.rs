use super::sma::Sma;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    window: Sma,
    band_mult: f64,
}

impl Bollinger {
    pub fn new(period: usize, band_mult: f64) -> Self {
        assert!(band_mult > 0.0, "Bollinger band multiplier must be > 0");
        Self {
            window: Sma::new(period),
            band_mult,
        }
    }

    pub fn push(&mut self, price: f64) -> Option<Bands> {
        let middle = self.window.push(price)?;
        let std_dev = self.window.std_dev()?;
        Some(Bands {
            upper: middle + self.band_mult * std_dev,
            middle,
            lower: middle - self.band_mult * std_dev,
        })
    }

    pub fn lookback(&self) -> usize {
        self.window.period() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_window_collapses_bands() {
        let mut bb = Bollinger::new(5, 2.0);
        let mut last = None;
        for _ in 0..5 {
            last = bb.push(42.0);
        }
        let bands = last.unwrap();
        assert!((bands.upper - 42.0).abs() < 1e-12);
        assert!((bands.lower - 42.0).abs() < 1e-12);
        assert!((bands.upper - bands.lower).abs() < 1e-12);
    }

    #[test]
    fn bands_are_mean_plus_minus_k_sigma() {
        let mut bb = Bollinger::new(4, 2.0);
        assert_eq!(bb.push(2.0), None);
        bb.push(4.0);
        bb.push(4.0);
        let bands = bb.push(6.0).unwrap();
        let sigma = 2.0_f64.sqrt();
        assert!((bands.middle - 4.0).abs() < 1e-12);
        assert!((bands.upper - (4.0 + 2.0 * sigma)).abs() < 1e-12);
        assert!((bands.lower - (4.0 - 2.0 * sigma)).abs() < 1e-12);
    }
}
