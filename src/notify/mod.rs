pub mod format;
pub mod gate;
pub mod telegram;

use async_trait::async_trait;

use crate::error::AppError;

pub use gate::{Dispatch, NotificationGate};
pub use telegram::TelegramSink;

/// Operator channel for alerts.
#[async_trait]
pub trait NotifierSink: Send + Sync {
    /// Check credentials once at startup; returns the identity messages are sent as.
    async fn verify(&self) -> Result<String, AppError>;

    /// Deliver one message. Implementations retry internally and report
    /// `AppError::Notification` once their retries are exhausted.
    async fn send(&self, text: &str) -> Result<(), AppError>;
}
