use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::binance::rest::BinanceRestClient;
use crate::config::Config;
use crate::error::AppError;
use crate::model::candle::Candle;
use crate::model::feed_row::RawFeedRow;

use super::DataSource;

/// Header row skipped; `null` when the table has not rendered yet.
const TABLE_SCRIPT: &str = r#"
const table = document.querySelector('table.table') || document.querySelector('table');
if (!table) { return null; }
return Array.from(table.querySelectorAll('tr')).slice(1)
  .map(tr => Array.from(tr.querySelectorAll('td')).map(td => td.innerText.trim()))
  .filter(cells => cells.length > 0);
"#;

const BROWSER_ARGS: [&str; 4] = [
    "--headless",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
];

/// Scrapes the ping table through a W3C WebDriver server (chromedriver).
/// One browser session is held between `acquire` and `release`.
pub struct WebDriverSource {
    http: reqwest::Client,
    webdriver_url: String,
    page_url: String,
    page_load_timeout: Duration,
    refresh_each_poll: bool,
    session_id: Option<String>,
    market: BinanceRestClient,
}

impl WebDriverSource {
    pub fn new(
        webdriver_url: &str,
        page_url: &str,
        page_load_timeout: Duration,
        refresh_each_poll: bool,
        market: BinanceRestClient,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            webdriver_url: webdriver_url.trim_end_matches('/').to_string(),
            page_url: page_url.to_string(),
            page_load_timeout,
            refresh_each_poll,
            session_id: None,
            market,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let feed = &config.feed;
        let http = reqwest::Client::builder()
            .timeout(feed.request_timeout())
            .connect_timeout(feed.connect_timeout())
            .build()
            .map_err(|e| AppError::FatalAdapter(format!("webdriver client: {}", e)))?;
        let market = BinanceRestClient::new(
            &config.market.rest_base_url,
            feed.request_timeout(),
            feed.connect_timeout(),
        )?;
        Ok(Self::new(
            &feed.webdriver_url,
            &feed.page_url,
            Duration::from_secs(feed.page_load_timeout_secs),
            feed.refresh_each_poll,
            market,
            http,
        ))
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn session_path(&self, suffix: &str) -> Result<String, AppError> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| AppError::TransientFeed("no browser session".to_string()))?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    /// Issue one WebDriver command and return its `value`.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, AppError> {
        let url = format!("{}{}", self.webdriver_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let root: Value = match resp.json().await {
            Ok(root) => root,
            Err(_) if !status.is_success() => {
                return Err(AppError::from_status(status, "webdriver"));
            }
            Err(e) => return Err(e.into()),
        };
        let value = root.get("value").cloned().unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(value);
        }
        Err(classify_webdriver_error(&value, status))
    }

    async fn load_page(&self, path_suffix: &str, body: Value) -> Result<(), AppError> {
        let path = self.session_path(path_suffix)?;
        let timeout = self.page_load_timeout + Duration::from_secs(5);
        self.command(Method::POST, &path, Some(body), Some(timeout))
            .await
            .map(|_| ())
    }
}

/// Map a W3C error payload (`{"error": ..., "message": ...}`) onto the error taxonomy.
pub fn classify_webdriver_error(value: &Value, status: reqwest::StatusCode) -> AppError {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .lines()
        .next()
        .unwrap_or("");
    let detail = format!("webdriver {} ({}): {}", code, status, message);
    match code {
        "invalid session id" | "no such window" | "session not created" | "timeout"
        | "script timeout" | "unknown error" | "disconnected" => AppError::TransientFeed(detail),
        "" => AppError::from_status(status, "webdriver"),
        _ => AppError::DataFormat(detail),
    }
}

fn rows_from_script(value: Value) -> Result<Vec<RawFeedRow>, AppError> {
    match value {
        Value::Null => Err(AppError::TransientFeed(
            "ping table not present on page".to_string(),
        )),
        Value::Array(rows) => Ok(rows
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => RawFeedRow::new(cells.into_iter().map(|c| match c {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                })),
                _ => RawFeedRow::new(Vec::<String>::new()),
            })
            .collect()),
        other => Err(AppError::DataFormat(format!(
            "table script returned {}",
            other
        ))),
    }
}

#[async_trait]
impl DataSource for WebDriverSource {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    async fn acquire(&mut self) -> Result<(), AppError> {
        self.release().await;
        self.market.ping().await?;

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": BROWSER_ARGS },
                }
            }
        });
        let value = self
            .command(Method::POST, "/session", Some(capabilities), None)
            .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::FatalAdapter("webdriver returned no sessionId".to_string()))?
            .to_string();
        self.session_id = Some(session_id.clone());

        let path = self.session_path("/timeouts")?;
        let page_load_ms = self.page_load_timeout.as_millis() as u64;
        self.command(Method::POST, &path, Some(json!({ "pageLoad": page_load_ms })), None)
            .await?;
        self.load_page("/url", json!({ "url": self.page_url })).await?;

        tracing::info!(session = %session_id, url = %self.page_url, "Browser session started");
        Ok(())
    }

    async fn release(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };
        let path = format!("/session/{}", id);
        match self.command(Method::DELETE, &path, None, None).await {
            Ok(_) => tracing::info!(session = %id, "Browser session closed"),
            Err(e) => tracing::warn!(session = %id, error = %e, "Browser session close failed"),
        }
    }

    async fn poll_feed(&mut self) -> Result<Vec<RawFeedRow>, AppError> {
        if self.refresh_each_poll {
            self.load_page("/refresh", json!({})).await?;
        }
        let path = self.session_path("/execute/sync")?;
        let value = self
            .command(
                Method::POST,
                &path,
                Some(json!({ "script": TABLE_SCRIPT, "args": [] })),
                None,
            )
            .await?;
        rows_from_script(value)
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

    #[test]
    fn stale_session_is_transient() {
        let err = classify_webdriver_error(
            &json!({"error": "invalid session id", "message": "session deleted\nstack"}),
            reqwest::StatusCode::NOT_FOUND,
        );
        assert!(err.is_transient());
        assert!(err.to_string().contains("session deleted"));
        assert!(!err.to_string().contains("stack"));
    }

    #[test]
    fn script_errors_stay_item_level() {
        let err = classify_webdriver_error(
            &json!({"error": "javascript error", "message": "boom"}),
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        );
        assert!(matches!(err, AppError::DataFormat(_)));
    }

    #[test]
    fn missing_table_is_transient() {
        assert!(rows_from_script(Value::Null).unwrap_err().is_transient());
        let rows = rows_from_script(json!([["BTC", "5"], "x"])).unwrap();
        assert_eq!(rows[0].cells, vec!["BTC", "5"]);
        assert!(rows[1].cells.is_empty());
    }
}
