pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

mod engine;

pub use engine::{IndicatorEngine, IndicatorSeries, IndicatorSet, InsufficientData};
