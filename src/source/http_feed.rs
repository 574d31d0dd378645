use async_trait::async_trait;
use serde_json::Value;

use crate::binance::rest::BinanceRestClient;
use crate::config::Config;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::feed_row::{RawFeedRow, FEED_COLUMNS};

use super::DataSource;

/// Object keys accepted in place of positional cells, in column order.
const FEED_KEYS: [&str; FEED_COLUMNS] = [
    "coin",
    "pings",
    "net_vol_btc",
    "net_vol_pct",
    "recent_total_vol_btc",
    "recent_vol_pct",
    "recent_net_vol",
    "datetime",
];

/// Polls a JSON endpoint serving the ping table, either as an array of
/// arrays or as an array of objects keyed by column.
pub struct HttpFeedSource {
    http: reqwest::Client,
    feed_url: String,
    market: BinanceRestClient,
    acquired: bool,
}

impl HttpFeedSource {
    pub fn new(feed_url: &str, market: BinanceRestClient, http: reqwest::Client) -> Self {
        Self {
            http,
            feed_url: feed_url.to_string(),
            market,
            acquired: false,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let feed = &config.feed;
        if feed.http_feed_url.trim().is_empty() {
            return Err(AppError::Config(
                "feed.http_feed_url is required for the http source".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(feed.request_timeout())
            .connect_timeout(feed.connect_timeout())
            .build()
            .map_err(|e| AppError::FatalAdapter(format!("feed client: {}", e)))?;
        let market = BinanceRestClient::new(
            &config.market.rest_base_url,
            feed.request_timeout(),
            feed.connect_timeout(),
        )?;
        Ok(Self::new(&feed.http_feed_url, market, http))
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Convert a feed payload into raw rows. Entries that are neither arrays nor
/// objects become empty rows so the detector records them as parse failures.
pub fn rows_from_json(root: &Value) -> Result<Vec<RawFeedRow>, AppError> {
    let entries = match root {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("rows") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(AppError::DataFormat(
                    "feed object has no 'rows' array".to_string(),
                ))
            }
        },
        _ => return Err(AppError::DataFormat("feed payload is not an array".to_string())),
    };

    Ok(entries
        .iter()
        .map(|entry| match entry {
            Value::Array(cells) => RawFeedRow::new(cells.iter().map(cell_text)),
            Value::Object(map) => RawFeedRow::new(
                FEED_KEYS
                    .iter()
                    .map(|key| map.get(*key).map(cell_text).unwrap_or_default()),
            ),
            _ => RawFeedRow::new(Vec::<String>::new()),
        })
        .collect())
}

#[async_trait]
impl DataSource for HttpFeedSource {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn acquire(&mut self) -> Result<(), AppError> {
        self.market.ping().await?;
        self.acquired = true;
        tracing::info!(url = %self.feed_url, "HTTP feed source ready");
        Ok(())
    }

    async fn release(&mut self) {
        if self.acquired {
            self.acquired = false;
            tracing::debug!("HTTP feed source released");
        }
    }

    async fn poll_feed(&mut self) -> Result<Vec<RawFeedRow>, AppError> {
        if !self.acquired {
            return Err(AppError::TransientFeed("feed source not acquired".to_string()));
        }
        let resp = self.http.get(&self.feed_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(match AppError::from_status(status, "feed") {
                AppError::DataFormat(msg) => AppError::TransientFeed(msg),
                other => other,
            });
        }
        let root: Value = resp.json().await?;
        rows_from_json(&root)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        self.market.get_klines(symbol, interval, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_rows_follow_column_order() {
        let rows = rows_from_json(&json!([
            {
                "coin": "BTC",
                "pings": 5,
                "net_vol_btc": "1.5",
                "net_vol_pct": "2%",
                "recent_total_vol_btc": 3.25,
                "recent_vol_pct": "4%",
                "recent_net_vol": "-0.5",
                "datetime": "2024-01-01 10:00:00"
            }
        ]))
        .unwrap();
        assert_eq!(
            rows[0].cells,
            vec!["BTC", "5", "1.5", "2%", "3.25", "4%", "-0.5", "2024-01-01 10:00:00"]
        );
    }

    #[test]
    fn array_rows_and_wrapped_payloads() {
        let rows = rows_from_json(&json!({"rows": [["ETH", "7"], 3]})).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells, vec!["ETH", "7"]);
        assert!(rows[1].cells.is_empty());
        assert!(rows_from_json(&json!("nope")).is_err());
    }

    #[test]
    fn missing_feed_url_is_a_config_error() {
        let config = Config::default();
        match HttpFeedSource::from_config(&config) {
            Err(AppError::Config(msg)) => assert!(msg.contains("http_feed_url")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("source built without a feed url"),
        }
    }
}
