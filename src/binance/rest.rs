use std::time::Duration;

use serde_json::Value;

use crate::error::AppError;
use crate::model::candle::{normalize_window, Candle};

use super::types::{parse_kline, BinanceApiErrorResponse};

/// Public market-data endpoints only; nothing here is signed.
pub struct BinanceRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceRestClient {
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::FatalAdapter(format!("binance client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        let url = format!("{}/api/v3/ping", self.base_url);
        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::from_status(resp.status(), "binance ping"));
        }
        Ok(())
    }

    /// Fetch up to `limit` klines, oldest first. Malformed entries are dropped and logged.
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, AppError> {
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit_s = limit.clamp(1, 1000).to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit_s.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.is_client_error() {
                if let Ok(err) = serde_json::from_str::<BinanceApiErrorResponse>(&body) {
                    // Rate-limit bans come back as 418/429 with a code; keep them transient.
                    if status.as_u16() != 418 && status.as_u16() != 429 {
                        return Err(AppError::BinanceApi {
                            code: err.code,
                            msg: err.msg,
                        });
                    }
                }
            }
            return Err(AppError::from_status(status, "binance klines"));
        }

        let root: Value = resp.json().await?;
        let entries = root
            .as_array()
            .ok_or_else(|| AppError::DataFormat("klines response is not an array".to_string()))?;

        let mut candles = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for entry in entries {
            match parse_kline(entry) {
                Ok(candle) => candles.push(candle),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(symbol, error = %e, "Skipping malformed kline");
                }
            }
        }
        if skipped > 0 {
            tracing::debug!(symbol, skipped, kept = candles.len(), "Klines partially parsed");
        }
        Ok(normalize_window(candles))
    }
}
