pub mod http_feed;
pub mod webdriver;

use async_trait::async_trait;

use crate::config::{Config, FeedSourceKind};
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::feed_row::RawFeedRow;

pub use http_feed::HttpFeedSource;
pub use webdriver::WebDriverSource;

/// Feed rows and candle windows for the supervisor.
///
/// `acquire` may be called again after `release` (reconnects). `release`
/// must be safe to call when nothing is held.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn acquire(&mut self) -> Result<(), AppError>;

    async fn release(&mut self);

    async fn poll_feed(&mut self) -> Result<Vec<RawFeedRow>, AppError>;

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError>;
}

/// Build the adapter selected by `feed.source`.
pub fn from_config(config: &Config) -> Result<Box<dyn DataSource>, AppError> {
    match config.feed.source {
        FeedSourceKind::Webdriver => Ok(Box::new(WebDriverSource::from_config(config)?)),
        FeedSourceKind::Http => Ok(Box::new(HttpFeedSource::from_config(config)?)),
    }
}
