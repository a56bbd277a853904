//! Basic Streaming Demo
//!
//! Streams a chat completion from a local OpenAI-compatible server and
//! prints content deltas as they arrive.
//!
//! Note: This example expects a server at http://localhost:1234 (the
//! LM Studio default) with a model loaded. Point it elsewhere with
//! ROBUST_SSE_ENDPOINT, and supply a key with ROBUST_SSE_API_KEY if the
//! server wants one. Run with RUST_LOG=debug to watch the connection
//! state transitions.

use robust_sse::{
    ClientOptions, RequestOptions, StreamClient, get_api_key, get_endpoint, streaming_enabled,
};
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let endpoint = get_endpoint(None)
        .unwrap_or_else(|| "http://localhost:1234/v1/chat/completions".to_string());

    let body = serde_json::json!({
        "model": "qwen2.5-32b-instruct",
        "stream": streaming_enabled(true),
        "messages": [
            {"role": "user", "content": "Write a haiku about network resilience"}
        ]
    });

    let options = ClientOptions::builder()
        .on_data(|delta| {
            print!("{delta}");
            let _ = io::stdout().flush();
        })
        .on_complete(|| println!("\n\n✅ Stream complete"))
        .on_error(|e| eprintln!("\n❌ Stream failed: {e}"))
        .build();

    let mut client = StreamClient::new(options)?;

    let mut request = RequestOptions::new()
        .with_method(reqwest::Method::POST)
        .with_header("Content-Type", "application/json")
        .with_body(body.to_string());
    if let Some(key) = get_api_key(None) {
        request = request.with_bearer(key);
    }

    println!("Streaming from {endpoint}\n");
    if client.start(&endpoint, request).await.is_err() {
        // The on_error callback already reported the failure
        std::process::exit(1);
    }

    println!("Characters received: {}", client.data().len());
    println!("Connection state: {}", client.connection_state());

    Ok(())
}
