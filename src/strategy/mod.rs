pub mod trend_confluence;

use crate::indicator::IndicatorSet;
use crate::model::signal::TradingSignal;

pub use trend_confluence::TrendConfluencePolicy;

/// Turns the latest indicator values of one symbol into an optional alert.
///
/// Implementations must be pure: the supervisor owns every state change that
/// follows from a signal.
pub trait SignalPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        symbol: &str,
        price: f64,
        indicators: &IndicatorSet,
        now_ms: u64,
    ) -> Option<TradingSignal>;
}
