//! # Robust SSE - Resilient Streaming Client for Rust
//!
//! A streaming-first client for consuming Server-Sent Events from LLM and
//! other streaming APIs, with automatic failure classification and recovery.
//!
//! ## Overview
//!
//! This crate consumes `text/event-stream` responses the way production
//! chat frontends do: token deltas are surfaced the moment they arrive,
//! transient failures are retried with exponential backoff, and content
//! already delivered survives a mid-stream connection drop.
//!
//! ## Key Features
//!
//! - **Streaming-First**: Content deltas delivered as each SSE frame arrives
//! - **Automatic Recovery**: Failures classified into a fixed taxonomy, with
//!   bounded retries for the transient kinds
//! - **Resume Context**: Partial output preserved across retries and
//!   advertised to the server through resume headers
//! - **Chunk-Boundary Safe**: Byte-level framing produces identical output
//!   no matter how the network segments the stream
//! - **Cooperative Cancellation**: Stop a stream from any task without
//!   corrupting session state
//! - **Observable State**: Loading, accumulated data, terminal error, and
//!   connection state available as snapshots at any time
//! - **Test-Friendly**: Scriptable mock transport included for exercising
//!   retry and cancellation scenarios without a network
//!
//! ## Streaming with Callbacks
//!
//! ```rust,no_run
//! use robust_sse::{ClientOptions, RequestOptions, StreamClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Callbacks observe the stream; state snapshots remain available too
//!     let options = ClientOptions::builder()
//!         .on_data(|delta| print!("{delta}"))
//!         .on_complete(|| println!())
//!         .on_error(|e| eprintln!("stream failed: {e}"))
//!         .build();
//!
//!     let mut client = StreamClient::new(options)?;
//!
//!     let request = RequestOptions::new()
//!         .with_method(reqwest::Method::POST)
//!         .with_header("Content-Type", "application/json")
//!         .with_bearer("sk-local")
//!         .with_body(r#"{"model":"qwen2.5-32b-instruct","stream":true,"messages":[{"role":"user","content":"Hello"}]}"#);
//!
//!     // Drives the whole session: request, stream, retries, completion
//!     client
//!         .start("http://localhost:1234/v1/chat/completions", request)
//!         .await?;
//!
//!     println!("full response: {}", client.data());
//!     Ok(())
//! }
//! ```
//!
//! ## Tuning Recovery and Stopping Mid-Stream
//!
//! ```rust,no_run
//! use robust_sse::{ClientOptions, RecoveryConfig, RequestOptions, StreamClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions::builder()
//!         .recovery(
//!             RecoveryConfig::new()
//!                 .with_max_attempts(5)
//!                 .with_initial_delay(Duration::from_millis(250))
//!                 .with_retry_unknown(true),
//!         )
//!         .on_data(|delta| print!("{delta}"))
//!         .build();
//!
//!     let mut client = StreamClient::new(options)?;
//!
//!     // Handles are cheap clones sharing one signal; any task may stop
//!     let stop = client.stop_handle();
//!     tokio::spawn(async move {
//!         tokio::time::sleep(Duration::from_secs(30)).await;
//!         stop.abort();
//!     });
//!
//!     client
//!         .start("http://localhost:1234/v1/chat/completions", RequestOptions::new())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into several modules, each with a specific responsibility:
//!
//! - **client**: Streaming session engine driving requests, decoding, and recovery
//! - **recovery**: Failure classification, retry policy, and cancellation handles
//! - **sse**: Byte-level SSE framing and content delta extraction
//! - **transport**: HTTP transport abstraction and the reqwest implementation
//! - **types**: Session state, request options, callbacks, and wire chunk structures
//! - **error**: Error types and the classified failure taxonomy
//! - **config**: Endpoint configuration helpers with environment variable support
//! - **testing**: Scriptable mock transport for exercising streams without a network

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================
// These modules are private (internal implementation details) unless explicitly
// re-exported through `pub use` statements below.

/// Core streaming client driving the full session lifecycle: request,
/// frame decoding, delta accumulation, retries, and terminal callbacks.
mod client;

/// Endpoint configuration helpers resolving API keys, endpoint URLs, and
/// streaming toggles from the environment with explicit fallbacks.
mod config;

/// Error types and conversions used across all public APIs, including the
/// classified failure taxonomy recovery decisions are made from.
mod error;

/// Failure classification, bounded retry with exponential backoff, resume
/// context tracking, and cooperative cancellation handles.
mod recovery;

/// Byte-level Server-Sent Events framing with a carry-over buffer, plus
/// extraction of content deltas from `data:` payloads.
mod sse;

/// Transport abstraction separating the client from the HTTP layer.
/// Production uses reqwest; tests swap in a scriptable mock.
mod transport;

/// Core type definitions for session state, request options, callbacks,
/// and the wire format of streaming chunks.
mod types;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================
// These items form the public API of the crate. Everything else is internal.

/// Test doubles for the transport layer.
/// Made public as a module so integration tests and downstream users can
/// script transport behavior when exercising their own streaming code.
pub mod testing;

// --- Core Client API ---

pub use client::StreamClient;

// --- Recovery and Cancellation ---

pub use recovery::{
    AbortHandle, LAST_EVENT_ID_HEADER, RESUME_OFFSET_HEADER, RETRY_ATTEMPT_HEADER, RecoveryConfig,
    RecoveryManager, RecoveryState, classify_error,
};

// --- SSE Framing ---

pub use sse::{DONE_MARKER, FrameDecoder, SseField};

// --- Transport Layer ---

pub use transport::{BodyReader, HttpTransport, StreamTransport, TransportResponse};

// --- Endpoint Configuration ---

pub use config::{get_api_key, get_endpoint, streaming_enabled};

// --- Error Handling ---

pub use error::{ClassifiedError, Error, ErrorKind, Result};

// --- Core Types ---

pub use types::{
    ClientOptions, ClientOptionsBuilder, CompleteCallback, ConnectionState, DataCallback,
    ErrorCallback, RequestOptions, StreamChoice, StreamChunk, StreamDelta, StreamState,
};

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// Convenience module containing the most commonly used types.
/// Import with `use robust_sse::prelude::*;` to get everything you need for
/// typical usage.
///
/// This includes:
/// - Client: StreamClient
/// - Configuration: ClientOptions, ClientOptionsBuilder, RequestOptions, RecoveryConfig
/// - State: StreamState, ConnectionState, RecoveryState
/// - Cancellation: AbortHandle
/// - Errors: Error, ErrorKind, ClassifiedError, Result
pub mod prelude {
    pub use crate::{
        AbortHandle, ClassifiedError, ClientOptions, ClientOptionsBuilder, ConnectionState, Error,
        ErrorKind, RecoveryConfig, RecoveryState, RequestOptions, Result, StreamClient,
        StreamState,
    };
}
