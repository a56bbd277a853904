//! End-to-end recovery flows
//!
//! Stages multi-attempt sessions through the scripted transport: failures
//! followed by successes, mid-stream drops with resumption, and the
//! resume-context headers the next attempt must carry.

use bytes::Bytes;
use robust_sse::testing::MockTransport;
use robust_sse::{
    ClientOptions, Error, LAST_EVENT_ID_HEADER, RESUME_OFFSET_HEADER, RETRY_ATTEMPT_HEADER,
    RecoveryConfig, RequestOptions, StreamClient,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn frame(content: &str) -> String {
    format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{content}\"}}}}]}}\n\n")
}

fn fast_retries(max_attempts: u32) -> RecoveryConfig {
    RecoveryConfig::new()
        .with_max_attempts(max_attempts)
        .with_initial_delay(Duration::ZERO)
        .with_jitter_factor(0.0)
}

#[tokio::test]
async fn test_network_error_then_success() -> anyhow::Result<()> {
    let completions = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let completed = completions.clone();
    let errored = errors.clone();

    let mock = MockTransport::new()
        .with_error(Error::stream("connection reset by peer"))
        .with_success(&[&frame("Success"), "data: [DONE]\n\n"]);
    let options = ClientOptions::builder()
        .recovery(fast_retries(3))
        .on_complete(move || {
            completed.fetch_add(1, Ordering::SeqCst);
        })
        .on_error(move |_| {
            errored.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await?;

    assert_eq!(client.data(), "Success");
    assert_eq!(mock.request_count(), 2);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(client.error().is_none());

    let recovery = client.recovery_state();
    assert_eq!(recovery.attempts, 1);
    assert!(!recovery.is_recovering);
    Ok(())
}

#[tokio::test]
async fn test_mid_stream_drop_resumes_with_offset_header() -> anyhow::Result<()> {
    // First attempt delivers "Hel" then the connection dies; the second
    // attempt must advertise the 3 bytes already held and finish the text
    let mock = MockTransport::new()
        .with_reader_items(vec![
            Ok(Bytes::from(frame("Hel"))),
            Err(Error::stream("connection reset by peer")),
        ])
        .with_success(&[&frame("lo"), "data: [DONE]\n\n"]);
    let options = ClientOptions::builder().recovery(fast_retries(3)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await?;

    assert_eq!(client.data(), "Hello");

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    // The first request carries no resume context
    assert_eq!(requests[0].header(RESUME_OFFSET_HEADER), None);
    assert_eq!(requests[0].header(RETRY_ATTEMPT_HEADER), None);
    // The retry advertises what was already received
    assert_eq!(requests[1].header(RESUME_OFFSET_HEADER), Some("3"));
    assert_eq!(requests[1].header(RETRY_ATTEMPT_HEADER), Some("1"));
    Ok(())
}

#[tokio::test]
async fn test_last_event_id_forwarded_on_resume() -> anyhow::Result<()> {
    let first_body = format!("id: evt-7\n{}", frame("Hel"));
    let mock = MockTransport::new()
        .with_reader_items(vec![
            Ok(Bytes::from(first_body)),
            Err(Error::stream("connection reset by peer")),
        ])
        .with_success(&[&frame("lo"), "data: [DONE]\n\n"]);
    let options = ClientOptions::builder().recovery(fast_retries(3)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await?;

    assert_eq!(client.data(), "Hello");
    let requests = mock.requests();
    assert_eq!(requests[1].header(LAST_EVENT_ID_HEADER), Some("evt-7"));
    Ok(())
}

#[tokio::test]
async fn test_retry_preserves_caller_headers() -> anyhow::Result<()> {
    let mock = MockTransport::new()
        .with_reader_items(vec![
            Ok(Bytes::from(frame("a"))),
            Err(Error::stream("network down")),
        ])
        .with_success(&["data: [DONE]\n\n"]);
    let options = ClientOptions::builder().recovery(fast_retries(3)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    let request = RequestOptions::new()
        .with_bearer("sk-keepme")
        .with_header("X-Custom", "still-here");
    client.start("https://api.test/stream", request).await?;

    for recorded in mock.requests() {
        assert_eq!(recorded.header("Authorization"), Some("Bearer sk-keepme"));
        assert_eq!(recorded.header("X-Custom"), Some("still-here"));
    }
    Ok(())
}

#[tokio::test]
async fn test_no_resume_headers_without_partial_content() -> anyhow::Result<()> {
    // A retry after a failure with nothing delivered yet sends no resume
    // context at all
    let mock = MockTransport::new()
        .with_error(Error::stream("connection refused"))
        .with_success(&[&frame("fresh"), "data: [DONE]\n\n"]);
    let options = ClientOptions::builder().recovery(fast_retries(3)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await?;

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].header(RESUME_OFFSET_HEADER), None);
    assert_eq!(requests[1].header(RETRY_ATTEMPT_HEADER), None);
    Ok(())
}

#[tokio::test]
async fn test_budget_exhaustion_after_repeated_drops() {
    let mock = MockTransport::new()
        .with_error(Error::stream("connection reset"))
        .with_error(Error::stream("connection reset"))
        .with_error(Error::stream("connection reset"))
        .with_error(Error::stream("connection reset"));
    let options = ClientOptions::builder().recovery(fast_retries(3)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    let result = client
        .start("https://api.test/stream", RequestOptions::new())
        .await;

    assert!(result.is_err());
    // Initial attempt plus three retries
    assert_eq!(mock.request_count(), 4);
    assert_eq!(client.recovery_state().attempts, 3);
    assert!(client.error().is_some());
}

#[tokio::test]
async fn test_partial_content_survives_multiple_drops() -> anyhow::Result<()> {
    let mock = MockTransport::new()
        .with_reader_items(vec![
            Ok(Bytes::from(frame("one "))),
            Err(Error::stream("connection reset")),
        ])
        .with_reader_items(vec![
            Ok(Bytes::from(frame("two "))),
            Err(Error::stream("connection reset")),
        ])
        .with_success(&[&frame("three"), "data: [DONE]\n\n"]);
    let options = ClientOptions::builder().recovery(fast_retries(5)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await?;

    assert_eq!(client.data(), "one two three");
    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    // Offsets grow as content accumulates across attempts
    assert_eq!(requests[1].header(RESUME_OFFSET_HEADER), Some("4"));
    assert_eq!(requests[2].header(RESUME_OFFSET_HEADER), Some("8"));
    assert_eq!(requests[2].header(RETRY_ATTEMPT_HEADER), Some("2"));
    Ok(())
}

#[tokio::test]
async fn test_server_error_response_then_success() -> anyhow::Result<()> {
    let mock = MockTransport::new()
        .with_status(503, "Service Unavailable")
        .with_success(&[&frame("recovered"), "data: [DONE]\n\n"]);
    let options = ClientOptions::builder().recovery(fast_retries(2)).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));

    client
        .start("https://api.test/stream", RequestOptions::new())
        .await?;

    assert_eq!(client.data(), "recovered");
    assert_eq!(mock.request_count(), 2);
    Ok(())
}
