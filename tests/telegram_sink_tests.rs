use std::time::Duration;

use mockito::Matcher;
use serde_json::json;

use ping_sentry::error::AppError;
use ping_sentry::notify::{NotifierSink, TelegramSink};

fn sink(base_url: &str) -> TelegramSink {
    TelegramSink::new(
        base_url,
        "test-token",
        "42",
        3,
        Duration::from_millis(10),
        Duration::from_secs(5),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[tokio::test]
async fn verify_returns_bot_username() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/bottest-token/getMe")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"ok":true,"result":{"id":1,"is_bot":true,"first_name":"Sentry","username":"sentry_bot"}}"#,
        )
        .create_async()
        .await;

    assert_eq!(sink(&server.url()).verify().await.unwrap(), "@sentry_bot");
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_token_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/bottest-token/getMe")
        .with_status(401)
        .with_body(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
        .create_async()
        .await;

    let err = sink(&server.url()).verify().await.unwrap_err();
    assert!(matches!(err, AppError::FatalAdapter(_)));
    assert!(!err.to_string().contains("test-token"));
}

#[tokio::test]
async fn send_posts_html_message() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bottest-token/sendMessage")
        .match_body(Matcher::PartialJson(json!({
            "chat_id": "42",
            "text": "<b>hi</b>",
            "parse_mode": "HTML",
        })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{"message_id":7}}"#)
        .expect(1)
        .create_async()
        .await;

    sink(&server.url()).send("<b>hi</b>").await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_attempts_run_out() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bottest-token/sendMessage")
        .with_status(502)
        .with_body(r#"{"ok":false,"description":"Bad Gateway"}"#)
        .expect(3)
        .create_async()
        .await;

    let err = sink(&server.url()).send("hello").await.unwrap_err();
    match err {
        AppError::Notification { attempts, msg } => {
            assert_eq!(attempts, 3);
            assert!(msg.contains("Bad Gateway"));
        }
        other => panic!("unexpected error: {other}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn bad_request_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/bottest-token/sendMessage")
        .with_status(400)
        .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = sink(&server.url()).send("hello").await.unwrap_err();
    assert!(matches!(err, AppError::Notification { attempts: 1, .. }));
    assert!(err.to_string().contains("chat not found"));
    mock.assert_async().await;
}
