use thiserror::Error;

use crate::indicator::InsufficientData;

/// How far an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// One row, candle window or symbol; the rest of the cycle continues.
    Item,
    /// The feed or its connection; the supervisor backs off and reconnects.
    Connection,
    /// Unrecoverable; the engine terminates.
    Fatal,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("feed unavailable: {0}")]
    TransientFeed(String),

    #[error("network error: {0}")]
    TransientNetwork(String),

    #[error("malformed data: {0}")]
    DataFormat(String),

    #[error("insufficient data: {0}")]
    InsufficientData(#[from] InsufficientData),

    #[error("binance API error (code {code}): {msg}")]
    BinanceApi { code: i64, msg: String },

    #[error("fatal adapter error: {0}")]
    FatalAdapter(String),

    #[error("notification failed after {attempts} attempt(s): {msg}")]
    Notification { attempts: u32, msg: String },
}

impl AppError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            Self::TransientFeed(_) | Self::TransientNetwork(_) => ErrorScope::Connection,
            Self::Config(_) | Self::FatalAdapter(_) => ErrorScope::Fatal,
            Self::DataFormat(_)
            | Self::InsufficientData(_)
            | Self::BinanceApi { .. }
            | Self::Notification { .. } => ErrorScope::Item,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.scope() == ErrorScope::Connection
    }

    /// Classify an HTTP status returned by a collaborator.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        let msg = format!("{} returned {}", context, status);
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            Self::FatalAdapter(msg)
        } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status.as_u16() == 418
            || status.is_server_error()
        {
            Self::TransientNetwork(msg)
        } else {
            Self::DataFormat(msg)
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status, "request");
        }
        if e.is_decode() {
            Self::DataFormat(e.to_string())
        } else {
            // Timeouts, refused connections, resets and body read failures.
            Self::TransientNetwork(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            AppError::from_status(reqwest::StatusCode::UNAUTHORIZED, "getMe").scope(),
            ErrorScope::Fatal
        );
        assert_eq!(
            AppError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "klines").scope(),
            ErrorScope::Connection
        );
        assert_eq!(
            AppError::from_status(reqwest::StatusCode::BAD_GATEWAY, "feed").scope(),
            ErrorScope::Connection
        );
        assert_eq!(
            AppError::from_status(reqwest::StatusCode::BAD_REQUEST, "klines").scope(),
            ErrorScope::Item
        );
    }

    #[test]
    fn insufficient_data_is_item_scoped() {
        let err: AppError = InsufficientData::TooShort { have: 3, need: 50 }.into();
        assert_eq!(err.scope(), ErrorScope::Item);
        assert!(!err.is_transient());
    }
}
