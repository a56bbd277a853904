//! Failure classification and terminal error behavior
//!
//! Verifies that transport and API failures land in the right taxonomy
//! bucket, that retryability follows the bucket, and that terminal
//! failures surface consistently through the return value, the state
//! snapshot, and the error callback.

use robust_sse::testing::MockTransport;
use robust_sse::{
    ClientOptions, ConnectionState, Error, ErrorKind, RecoveryConfig, RequestOptions, StreamClient,
    classify_error,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn no_retry_options() -> ClientOptions {
    ClientOptions::builder()
        .recovery(RecoveryConfig::new().with_max_attempts(0))
        .build()
}

async fn run_failing_session(mock: MockTransport) -> (StreamClient, Error) {
    let mut client = StreamClient::with_transport(no_retry_options(), Arc::new(mock));
    let error = client
        .start("https://api.test/stream", RequestOptions::new())
        .await
        .unwrap_err();
    (client, error)
}

#[tokio::test]
async fn test_http_500_classified_as_server() {
    let mock = MockTransport::new().with_status(500, "Internal Server Error");
    let (client, error) = run_failing_session(mock).await;

    let classified = client.error().unwrap();
    assert_eq!(classified.kind, ErrorKind::Server);
    assert!(classified.retryable);
    assert!(classified.message.contains("500"));
    assert!(classified.message.contains("Internal Server Error"));
    assert_eq!(client.connection_state(), ConnectionState::Error);

    // The returned error carries the same classification
    match error {
        Error::Unrecoverable(c) => assert_eq!(c.kind, ErrorKind::Server),
        other => panic!("expected Unrecoverable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_http_401_and_403_classified_as_auth() {
    for status in [401, 403] {
        let mock = MockTransport::new().with_status(status, "denied");
        let (client, _) = run_failing_session(mock).await;
        let classified = client.error().unwrap();
        assert_eq!(classified.kind, ErrorKind::Auth, "status {status}");
        assert!(!classified.retryable);
    }
}

#[tokio::test]
async fn test_auth_failures_never_retry_even_with_budget() {
    let errors = Arc::new(AtomicUsize::new(0));
    let errored = errors.clone();
    let options = ClientOptions::builder()
        .recovery(
            RecoveryConfig::new()
                .with_max_attempts(5)
                .with_initial_delay(std::time::Duration::ZERO)
                .with_jitter_factor(0.0),
        )
        .on_error(move |_| {
            errored.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let mock = MockTransport::new().with_status(401, "bad key");
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    let result = client
        .start("https://api.test/stream", RequestOptions::new())
        .await;

    assert!(result.is_err());
    assert_eq!(mock.request_count(), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(client.recovery_state().attempts, 0);
}

#[tokio::test]
async fn test_http_429_classified_as_rate_limit() {
    let mock = MockTransport::new().with_status(429, "Too Many Requests");
    let (client, _) = run_failing_session(mock).await;
    let classified = client.error().unwrap();
    assert_eq!(classified.kind, ErrorKind::RateLimit);
    assert!(classified.retryable);
}

#[tokio::test]
async fn test_timeout_transport_error() {
    let mock = MockTransport::new().with_error(Error::timeout());
    let (client, _) = run_failing_session(mock).await;
    let classified = client.error().unwrap();
    assert_eq!(classified.kind, ErrorKind::Timeout);
    assert!(classified.retryable);
    assert_eq!(classified.message, "Request timeout");
}

#[tokio::test]
async fn test_connection_wording_classified_as_network() {
    let mock = MockTransport::new().with_error(Error::stream("connection refused"));
    let (client, _) = run_failing_session(mock).await;
    assert_eq!(client.error().unwrap().kind, ErrorKind::Network);
}

#[tokio::test]
async fn test_context_length_wording_classified_as_token_limit() {
    let mock = MockTransport::new().with_status(
        400,
        "this model's maximum context length is 8192 tokens, your request used 9001",
    );
    let (client, _) = run_failing_session(mock).await;
    let classified = client.error().unwrap();
    assert_eq!(classified.kind, ErrorKind::TokenLimit);
    assert!(!classified.retryable);
}

#[tokio::test]
async fn test_unknown_failures_do_not_retry_by_default() {
    let mock = MockTransport::new()
        .with_error(Error::other("mystery failure"))
        .with_success(&["data: [DONE]\n\n"]);
    let options = ClientOptions::builder()
        .recovery(
            RecoveryConfig::new()
                .with_max_attempts(3)
                .with_initial_delay(std::time::Duration::ZERO)
                .with_jitter_factor(0.0),
        )
        .build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    let result = client
        .start("https://api.test/stream", RequestOptions::new())
        .await;

    assert!(result.is_err());
    assert_eq!(client.error().unwrap().kind, ErrorKind::Unknown);
    // The scripted success was never consumed
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn test_retry_unknown_policy_opt_in() {
    let mock = MockTransport::new()
        .with_error(Error::other("mystery failure"))
        .with_success(&["data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n", "data: [DONE]\n\n"]);
    let options = ClientOptions::builder()
        .recovery(
            RecoveryConfig::new()
                .with_max_attempts(3)
                .with_initial_delay(std::time::Duration::ZERO)
                .with_jitter_factor(0.0)
                .with_retry_unknown(true),
        )
        .build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(client.data(), "ok");
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn test_error_callback_fires_exactly_once_for_terminal_failure() {
    let errors = Arc::new(AtomicUsize::new(0));
    let completions = Arc::new(AtomicUsize::new(0));
    let errored = errors.clone();
    let completed = completions.clone();
    let options = ClientOptions::builder()
        .recovery(
            RecoveryConfig::new()
                .with_max_attempts(2)
                .with_initial_delay(std::time::Duration::ZERO)
                .with_jitter_factor(0.0),
        )
        .on_error(move |e| {
            assert_eq!(e.kind, ErrorKind::Network);
            errored.fetch_add(1, Ordering::SeqCst);
        })
        .on_complete(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    // Every attempt fails; the budget allows 2 retries, so 3 requests total
    let mock = MockTransport::new()
        .with_error(Error::stream("connection reset"))
        .with_error(Error::stream("connection reset"))
        .with_error(Error::stream("connection reset"));
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    let result = client
        .start("https://api.test/stream", RequestOptions::new())
        .await;

    assert!(result.is_err());
    assert_eq!(mock.request_count(), 3);
    assert_eq!(client.recovery_state().attempts, 2);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
}

#[test]
fn test_classify_error_is_deterministic() {
    let samples = [
        (Error::api_status(503, "busy"), ErrorKind::Server, true),
        (Error::api_status(429, "slow"), ErrorKind::RateLimit, true),
        (Error::api_status(403, "no"), ErrorKind::Auth, false),
        (Error::timeout(), ErrorKind::Timeout, true),
        (Error::aborted(), ErrorKind::Aborted, false),
        (Error::stream("dns lookup failed"), ErrorKind::Network, true),
        (
            Error::api_status(400, "context window exceeded"),
            ErrorKind::TokenLimit,
            false,
        ),
        (Error::other("???"), ErrorKind::Unknown, false),
    ];

    for (error, kind, retryable) in samples {
        for _ in 0..3 {
            let classified = classify_error(&error, false);
            assert_eq!(classified.kind, kind, "{error}");
            assert_eq!(classified.retryable, retryable, "{error}");
        }
    }
}

#[test]
fn test_error_kind_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ErrorKind::RateLimit).unwrap(),
        "\"rate_limit\""
    );
    assert_eq!(
        serde_json::to_string(&ErrorKind::TokenLimit).unwrap(),
        "\"token_limit\""
    );
    let kind: ErrorKind = serde_json::from_str("\"network\"").unwrap();
    assert_eq!(kind, ErrorKind::Network);
}
