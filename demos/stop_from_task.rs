//! Stop From Task Demo
//!
//! Showcases cooperative cancellation from outside the session:
//! 1. A watchdog task stops a stalled stream
//! 2. A stop lands during a long backoff wait and skips the retry
//! 3. The same client runs a fresh session after being stopped
//!
//! Note: This example runs entirely offline on a scripted transport.
//! Run with RUST_LOG=debug to watch the cancellation paths.

use robust_sse::testing::MockTransport;
use robust_sse::{ClientOptions, Error, RecoveryConfig, RequestOptions, StreamClient};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

fn frame(content: &str) -> String {
    let chunk = serde_json::json!({"choices": [{"delta": {"content": content}}]});
    format!("data: {chunk}\n\n")
}

// ============================================================
// Example 1: Watchdog stops a stalled stream
// ============================================================
async fn watchdog_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 1: Watchdog stops a stalled stream");
    println!("{}", "=".repeat(60));

    // The scripted response yields two deltas and then hangs forever,
    // the way a dead upstream connection would.
    let mock = MockTransport::new()
        .with_hanging_response(&[&frame("Streaming along nicely"), &frame(" until the server stalls")]);

    let options = ClientOptions::builder()
        .on_data(|delta| {
            print!("{delta}");
            let _ = io::stdout().flush();
        })
        .on_complete(|| println!("(completion callback ran)"))
        .build();

    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));
    let handle = client.stop_handle();

    let watchdog = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        println!("\n🛑 Watchdog: no progress for 500ms, stopping the stream");
        handle.abort();
    });

    client
        .start("http://mock.local/v1/chat/completions", RequestOptions::new())
        .await?;
    watchdog.await?;

    println!("Data kept from the stopped session: {:?}", client.data());
    println!("Reader cancelled {} time(s)", mock.reader_cancels());
    println!("Completion callbacks fired: none (stop is quiet)");

    Ok(())
}

// ============================================================
// Example 2: Stop during a backoff wait
// ============================================================
async fn backoff_stop_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 2: Stop during a backoff wait");
    println!("{}", "=".repeat(60));

    // One failing attempt, then a 60 second wait before the retry. The
    // stop should cut that wait short and never issue the second request.
    let mock = MockTransport::new()
        .with_error(Error::stream("connection refused"))
        .with_success(&[&frame("this retry never happens"), "data: [DONE]\n\n"]);

    let recovery = RecoveryConfig::new()
        .with_max_attempts(3)
        .with_initial_delay(Duration::from_secs(60));

    let options = ClientOptions::builder().recovery(recovery).build();
    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));
    let handle = client.stop_handle();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        println!("🛑 Stopping while the client waits out the backoff");
        handle.abort();
    });

    client
        .start("http://mock.local/v1/chat/completions", RequestOptions::new())
        .await?;
    stopper.await?;

    println!("Requests issued: {} (the retry was skipped)", mock.request_count());
    println!("Loading flag after stop: {}", client.is_loading());

    Ok(())
}

// ============================================================
// Example 3: Reuse the client after a stop
// ============================================================
async fn reuse_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "=".repeat(60));
    println!("Example 3: Reuse the client after a stop");
    println!("{}", "=".repeat(60));

    // First session gets stopped mid-stream; the second runs to the end
    // on the same client instance.
    let mock = MockTransport::new()
        .with_hanging_response(&[&frame("first session, interrupted")])
        .with_success(&[&frame("second session, completed"), "data: [DONE]\n\n"]);

    let options = ClientOptions::builder()
        .on_complete(|| println!("✅ Session completed"))
        .build();

    let mut client = StreamClient::with_transport(options, Arc::new(mock.clone()));
    let handle = client.stop_handle();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();
    });
    client
        .start("http://mock.local/v1/chat/completions", RequestOptions::new())
        .await?;
    stopper.await?;
    println!("After stop: {:?}", client.data());

    // Starting again rearms the stop handle automatically.
    client
        .start("http://mock.local/v1/chat/completions", RequestOptions::new())
        .await?;
    println!("After restart: {:?}", client.data());

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    println!("🛑 Stop From Task Demo\n");

    if let Err(e) = watchdog_example().await {
        eprintln!("Watchdog example failed: {e}");
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = backoff_stop_example().await {
        eprintln!("Backoff stop example failed: {e}");
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    if let Err(e) = reuse_example().await {
        eprintln!("Reuse example failed: {e}");
    }

    println!("\n✅ Demo complete");
}
