use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::{FeedConfig, NotifyConfig};
use crate::error::AppError;

use super::NotifierSink;

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
    first_name: String,
}

/// Telegram Bot API sink. The token is part of every URL, so request errors
/// are stripped of their URL before they reach logs.
pub struct TelegramSink {
    http: reqwest::Client,
    bot_url: String,
    chat_id: String,
    attempts: u32,
    retry_base: Duration,
}

impl TelegramSink {
    pub fn new(
        base_url: &str,
        token: &str,
        chat_id: &str,
        attempts: u32,
        retry_base: Duration,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::FatalAdapter(format!("telegram client: {}", e)))?;
        Ok(Self {
            http,
            bot_url: format!("{}/bot{}", base_url.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
            attempts: attempts.max(1),
            retry_base,
        })
    }

    pub fn from_config(notify: &NotifyConfig, feed: &FeedConfig) -> Result<Self, AppError> {
        Self::new(
            &notify.telegram_base_url,
            &notify.telegram_token,
            &notify.telegram_chat_id,
            notify.send_attempts,
            Duration::from_millis(notify.retry_base_ms),
            feed.request_timeout(),
            feed.connect_timeout(),
        )
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base.saturating_mul(2u32.saturating_pow(attempt))
    }

    async fn send_once(&self, text: &str) -> Result<(), AppError> {
        let resp = self
            .http
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await
            .map_err(|e| AppError::from(e.without_url()))?;

        let status = resp.status();
        let body: TelegramResponse<serde_json::Value> = match resp.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(AppError::from_status(status, "sendMessage"))
            }
            Err(e) => return Err(AppError::from(e.without_url())),
        };
        if status.is_success() && body.ok {
            return Ok(());
        }
        let detail = body.description.unwrap_or_else(|| status.to_string());
        match AppError::from_status(status, "sendMessage") {
            AppError::TransientNetwork(_) => Err(AppError::TransientNetwork(detail)),
            _ => Err(AppError::DataFormat(detail)),
        }
    }
}

#[async_trait]
impl NotifierSink for TelegramSink {
    async fn verify(&self) -> Result<String, AppError> {
        let resp = self
            .http
            .get(format!("{}/getMe", self.bot_url))
            .send()
            .await
            .map_err(|e| AppError::from(e.without_url()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(AppError::FatalAdapter(format!(
                "telegram rejected the bot token ({})",
                status
            )));
        }
        let body: TelegramResponse<BotUser> = resp
            .json()
            .await
            .map_err(|e| AppError::FatalAdapter(format!("getMe: {}", e.without_url())))?;
        if !body.ok {
            return Err(AppError::FatalAdapter(format!(
                "bot verification failed: {}",
                body.description.unwrap_or_default()
            )));
        }
        let user = body
            .result
            .ok_or_else(|| AppError::FatalAdapter("getMe returned no bot".to_string()))?;
        let identity = match user.username {
            Some(name) => format!("@{}", name),
            None => user.first_name,
        };
        tracing::info!(bot = %identity, "Telegram bot verified");
        Ok(identity)
    }

    async fn send(&self, text: &str) -> Result<(), AppError> {
        let mut last_error = String::new();
        for attempt in 0..self.attempts {
            match self.send_once(text).await {
                Ok(()) => {
                    tracing::info!(length = text.len(), attempt = attempt + 1, "Message sent");
                    return Ok(());
                }
                Err(e) if !e.is_transient() => {
                    tracing::error!(error = %e, attempt = attempt + 1, "Message rejected");
                    return Err(AppError::Notification {
                        attempts: attempt + 1,
                        msg: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt = attempt + 1, "Message send failed");
                    last_error = e.to_string();
                    if attempt + 1 < self.attempts {
                        let delay = self.retry_delay(attempt);
                        tracing::info!(
                            delay_ms = delay.as_millis() as u64,
                            "Retrying message send"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        tracing::error!(attempts = self.attempts, "Max message retries reached");
        Err(AppError::Notification {
            attempts: self.attempts,
            msg: last_error,
        })
    }
}
