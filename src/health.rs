use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::watch;

use crate::event::{Phase, StatusSnapshot};

pub fn router(status: watch::Receiver<StatusSnapshot>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(status)
}

pub async fn index() -> &'static str {
    "Bot is running!"
}

/// 503 once the engine has terminated so process supervisors can restart it.
pub async fn health(
    State(status): State<watch::Receiver<StatusSnapshot>>,
) -> (StatusCode, Json<StatusSnapshot>) {
    let snapshot = status.borrow().clone();
    let code = if snapshot.phase == Phase::Terminated {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(snapshot))
}

/// Serve until `shutdown` flips to true (or its sender is dropped).
pub async fn serve(
    bind: &str,
    status: watch::Receiver<StatusSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Health endpoint listening");
    axum::serve(listener, router(status))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}
