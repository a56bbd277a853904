//! Recovery Tuning Demo
//!
//! Drives the recovery machinery against a scripted transport so the retry
//! behavior is visible without a real server:
//! 1. A mid-stream connection drop recovered with resume headers
//! 2. A retry budget exhausted, surfacing one classified terminal error
//!
//! Note: This example runs entirely offline. Run with RUST_LOG=debug to see
//! the retry waits and connection transitions as they happen.

use bytes::Bytes;
use robust_sse::testing::MockTransport;
use robust_sse::{
    ClientOptions, Error, RESUME_OFFSET_HEADER, RETRY_ATTEMPT_HEADER, RecoveryConfig,
    RequestOptions, StreamClient,
};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

fn frame(content: &str) -> String {
    let chunk = serde_json::json!({"choices": [{"delta": {"content": content}}]});
    format!("data: {chunk}\n\n")
}

// ============================================================
// Example 1: Resume after a mid-stream connection drop
// ============================================================
async fn resume_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 1: Resume after a mid-stream drop");
    println!("{}", "=".repeat(60));

    // First response delivers half the message and then dies; the second
    // carries the rest.
    let mock = MockTransport::new()
        .with_reader_items(vec![
            Ok(Bytes::from(frame("The stream starts strong, "))),
            Err(Error::stream("connection reset by peer")),
        ])
        .with_success(&[&frame("then recovers without losing a byte."), "data: [DONE]\n\n"]);

    let recovery = RecoveryConfig::new()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_millis(200))
        .with_jitter_factor(0.2);

    let options = ClientOptions::builder()
        .recovery(recovery)
        .on_data(|delta| {
            print!("{delta}");
            let _ = io::stdout().flush();
        })
        .on_complete(|| println!("\n\n✅ Completed after recovery"))
        .build();

    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));
    client
        .start("http://mock.local/v1/chat/completions", RequestOptions::new())
        .await?;

    println!("\nRequests issued: {}", mock.request_count());
    for (i, request) in mock.requests().iter().enumerate() {
        println!(
            "  request {}: resume offset = {:?}, retry attempt = {:?}",
            i + 1,
            request.header(RESUME_OFFSET_HEADER),
            request.header(RETRY_ATTEMPT_HEADER),
        );
    }
    println!("Retries used: {}", client.recovery_state().attempts);

    Ok(())
}

// ============================================================
// Example 2: Retry budget exhaustion
// ============================================================
async fn exhaustion_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 2: Retry budget exhaustion");
    println!("{}", "=".repeat(60));

    // Every attempt fails with a retryable server error.
    let mock = MockTransport::new()
        .with_status(503, "service melting")
        .with_status(503, "service melting")
        .with_status(503, "service melting");

    let recovery = RecoveryConfig::new()
        .with_max_attempts(2)
        .with_initial_delay(Duration::from_millis(100))
        .with_jitter_factor(0.0);

    let options = ClientOptions::builder()
        .recovery(recovery)
        .on_error(|e| println!("⚠️  Terminal error: {e} (retryable: {})", e.retryable))
        .build();

    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));
    let result = client
        .start("http://mock.local/v1/chat/completions", RequestOptions::new())
        .await;

    println!("\nSession result: {}", if result.is_err() { "failed" } else { "ok" });
    println!("Requests issued: {}", mock.request_count());
    if let Some(error) = client.error() {
        println!("Recorded failure kind: {}", error.kind);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("🔄 Recovery Tuning Demo\n");

    if let Err(e) = resume_example().await {
        eprintln!("Resume example failed: {e}");
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = exhaustion_example().await {
        eprintln!("Exhaustion example failed: {e}");
    }

    println!("\n✅ Demo complete");
}
