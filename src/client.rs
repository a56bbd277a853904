//! Client for resilient consumption of Server-Sent Event streams
//!
//! This module provides the core streaming client. It owns the request
//! lifecycle end to end: issue the HTTP request, decode the byte stream
//! into SSE frames, extract content deltas, and recover from transient
//! failures with bounded retries, all while maintaining an observable
//! session state the caller can render from at any moment.
//!
//! # Architecture Overview
//!
//! [`StreamClient::start`] drives one logical **session** to completion.
//! A session spans one or more **attempts**; the recovery manager decides
//! whether a failed attempt earns another one, and content accumulated
//! before a mid-stream failure survives into the resumed attempt.
//!
//! ## Session Flow
//!
//! ```text
//! start(url, options)
//!     │
//!     ├─> reset session state, re-arm the stop handle
//!     │
//!     ├─> ATTEMPT: issue request (recovery headers merged when resuming)
//!     │       │
//!     │       ├─> transport error / non-2xx ──> classify
//!     │       │
//!     │       └─> 2xx: read body chunks
//!     │               │
//!     │               ├─> FrameDecoder splits bytes into SSE fields
//!     │               │
//!     │               ├─> data: {...}    ──> delta ──> state.data + on_data
//!     │               ├─> data: [DONE]  ──> session complete
//!     │               │
//!     │               └─> read error ──> classify
//!     │
//!     ├─> classified retryable within budget:
//!     │       backoff wait, then attempt again (partial output intact)
//!     │
//!     └─> terminal:
//!             success ──> on_complete, Ok(())
//!             failure ──> state.error + on_error, Err(Unrecoverable)
//!             stopped ──> quiet finalize, Ok(())
//! ```
//!
//! ## State Management
//!
//! The client maintains two layers of state:
//!
//! - [`StreamState`]: what a caller renders from (`is_loading`, `data`,
//!   `error`, `connection_state`)
//! - [`RecoveryState`]: attempt counters and preserved partial content,
//!   owned by the recovery manager
//!
//! Both reset at every session boundary: `start()` begins from a clean
//! slate, and `reset()` restores it on demand.
//!
//! ## Stopping
//!
//! `start()` borrows the client mutably for the whole session, so
//! cancellation comes from a cloned [`AbortHandle`] that any task can
//! trip:
//!
//! ```rust,no_run
//! # use robust_sse::{ClientOptions, RequestOptions, StreamClient};
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = StreamClient::new(ClientOptions::default())?;
//! let handle = client.stop_handle();
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!     handle.abort();
//! });
//!
//! client.start("https://api.example.com/stream", RequestOptions::new()).await?;
//! // A stopped session finalizes quietly: no error, no on_error
//! # Ok(())
//! # }
//! ```
//!
//! Stopping cancels the body reader exactly once, releasing the
//! connection without draining it.

use crate::error::{ClassifiedError, Error, ErrorKind, Result};
use crate::recovery::{AbortHandle, RecoveryManager, RecoveryState};
use crate::sse::{self, DONE_MARKER, FrameDecoder, SseField};
use crate::transport::{BodyReader, HttpTransport, StreamTransport};
use crate::types::{ClientOptions, ConnectionState, RequestOptions, StreamCallbacks, StreamState};
use std::sync::Arc;

/// Upper bound on how much of an error response body is retained for the
/// failure message
const MAX_ERROR_BODY_BYTES: usize = 16 * 1024;

/// How one attempt ended
enum AttemptOutcome {
    /// Stream finished normally ([DONE] or body exhausted)
    Completed,
    /// Caller stopped the session mid-attempt
    Stopped,
    /// Attempt failed; recovery decides what happens next
    Failed(Error),
}

/// Streaming client with automatic failure recovery.
///
/// Create with [`new`](Self::new) for a real HTTP transport, or
/// [`with_transport`](Self::with_transport) to substitute a test double.
pub struct StreamClient {
    transport: Arc<dyn StreamTransport>,
    recovery: RecoveryManager,
    state: StreamState,
    callbacks: StreamCallbacks,
}

impl StreamClient {
    /// Create a client backed by an HTTP transport
    pub fn new(options: ClientOptions) -> Result<Self> {
        let transport = HttpTransport::new(options.connect_timeout)?;
        Ok(Self::assemble(options, Arc::new(transport)))
    }

    /// Create a client over a caller-supplied transport
    pub fn with_transport(options: ClientOptions, transport: Arc<dyn StreamTransport>) -> Self {
        Self::assemble(options, transport)
    }

    fn assemble(options: ClientOptions, transport: Arc<dyn StreamTransport>) -> Self {
        Self {
            transport,
            recovery: RecoveryManager::new(options.recovery),
            state: StreamState::default(),
            callbacks: options.callbacks,
        }
    }

    /// Run one streaming session to completion.
    ///
    /// Issues the request, consumes the stream, and retries recoverable
    /// failures within the configured budget. Returns when the session
    /// settles:
    ///
    /// - `Ok(())` after a successful stream, and also after a stop; a
    ///   stopped session is not an error
    /// - `Err(`[`Error::Unrecoverable`]`)` once retries are exhausted or
    ///   the failure is not retryable; the same classified error is also
    ///   stored in [`state`](Self::state) and delivered to `on_error`
    /// - `Err(`[`Error::InvalidInput`]`)` for a blank `url`, before any
    ///   state is touched
    ///
    /// Each `start` call is a fresh session: previously accumulated data
    /// and recovery counters are cleared first.
    pub async fn start(&mut self, url: &str, options: RequestOptions) -> Result<()> {
        if url.trim().is_empty() {
            return Err(Error::invalid_input("url must not be empty"));
        }

        self.state = StreamState::default();
        self.recovery.reset();
        self.state.is_loading = true;
        self.set_connection(ConnectionState::Connecting);
        log::debug!("starting stream session: {} {}", options.method, url);

        loop {
            match self.run_attempt(url, &options).await {
                AttemptOutcome::Completed => {
                    self.state.is_loading = false;
                    self.set_connection(ConnectionState::Disconnected);
                    self.recovery.complete_recovery();
                    self.callbacks.complete();
                    return Ok(());
                }
                AttemptOutcome::Stopped => {
                    self.finalize_stopped();
                    return Ok(());
                }
                AttemptOutcome::Failed(error) => {
                    let classified = self.recovery.classify(&error);
                    self.recovery.record_error(&classified);
                    log::warn!("stream attempt failed: {}", classified);

                    if classified.kind == ErrorKind::Aborted {
                        self.finalize_stopped();
                        return Ok(());
                    }
                    if self.recovery.should_retry(&classified).await {
                        self.recovery.prepare_retry();
                        self.set_connection(ConnectionState::Connecting);
                        continue;
                    }
                    if self.recovery.abort_handle().is_aborted() {
                        // Stop raced the backoff wait
                        self.finalize_stopped();
                        return Ok(());
                    }

                    self.state.is_loading = false;
                    self.set_connection(ConnectionState::Error);
                    self.state.error = Some(classified.clone());
                    self.callbacks.error(&classified);
                    return Err(Error::Unrecoverable(classified));
                }
            }
        }
    }

    /// One request plus its read loop
    async fn run_attempt(&mut self, url: &str, options: &RequestOptions) -> AttemptOutcome {
        let handle = self.recovery.abort_handle();
        if handle.is_aborted() {
            return AttemptOutcome::Stopped;
        }

        // Resume context wins over caller headers of the same name
        let mut request = options.clone();
        for (name, value) in self.recovery.recovery_headers() {
            request.headers.insert(name, value);
        }

        let response = tokio::select! {
            result = self.transport.request(url, &request) => match result {
                Ok(response) => response,
                Err(error) => return AttemptOutcome::Failed(error),
            },
            _ = handle.cancelled() => return AttemptOutcome::Stopped,
        };

        if !response.ok() {
            let status = response.status;
            let message = drain_body(response.body).await;
            return AttemptOutcome::Failed(Error::api_status(status, message));
        }
        let Some(mut reader) = response.body else {
            return AttemptOutcome::Failed(Error::stream("response body missing"));
        };

        self.set_connection(ConnectionState::Connected);
        let mut decoder = FrameDecoder::new();

        loop {
            let chunk = tokio::select! {
                next = reader.read() => next,
                _ = handle.cancelled() => {
                    reader.cancel().await;
                    return AttemptOutcome::Stopped;
                }
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(error)) => return AttemptOutcome::Failed(error),
                None => return AttemptOutcome::Completed,
            };

            for field in decoder.feed(&bytes) {
                match field {
                    SseField::Data(payload) => {
                        if payload == DONE_MARKER {
                            // Fields after the end marker are dropped
                            reader.cancel().await;
                            return AttemptOutcome::Completed;
                        }
                        match sse::delta_text(&payload) {
                            Ok(Some(delta)) => {
                                self.state.data.push_str(&delta);
                                self.recovery.update_partial_content(&self.state.data);
                                self.callbacks.data(&delta);
                            }
                            Ok(None) => {}
                            Err(e) => {
                                log::warn!("skipping malformed SSE data payload: {}", e);
                            }
                        }
                    }
                    SseField::Id(id) => {
                        self.recovery.record_event_id(&id);
                    }
                    SseField::Event(name) => {
                        log::debug!("ignoring SSE event type {:?}", name);
                    }
                }
            }
        }
    }

    fn finalize_stopped(&mut self) {
        self.state.is_loading = false;
        self.set_connection(ConnectionState::Disconnected);
        log::debug!("stream session stopped");
    }

    fn set_connection(&mut self, next: ConnectionState) {
        if self.state.connection_state != next {
            log::debug!(
                "connection state {} -> {}",
                self.state.connection_state,
                next
            );
            self.state.connection_state = next;
        }
    }

    /// Stop the active session; idempotent, harmless when idle.
    ///
    /// Equivalent to `stop_handle().abort()`. Because `start()` holds the
    /// client exclusively, stopping from another task goes through
    /// [`stop_handle`](Self::stop_handle).
    pub fn stop(&self) {
        self.recovery.abort();
    }

    /// A cancellation handle for the current and future sessions.
    ///
    /// The handle stays valid across sessions: each `start()` re-arms it
    /// rather than replacing it.
    pub fn stop_handle(&self) -> AbortHandle {
        self.recovery.abort_handle()
    }

    /// Restore the client to its pristine state: no data, no error, not
    /// loading, disconnected, recovery counters cleared
    pub fn reset(&mut self) {
        self.state = StreamState::default();
        self.recovery.reset();
    }

    /// Snapshot of the observable session state
    pub fn state(&self) -> StreamState {
        self.state.clone()
    }

    /// Content accumulated so far in the current session
    pub fn data(&self) -> &str {
        &self.state.data
    }

    /// Terminal classified failure of the session, if it failed
    pub fn error(&self) -> Option<&ClassifiedError> {
        self.state.error.as_ref()
    }

    /// True while a session is in flight
    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    /// Current connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state
    }

    /// True iff the connection state is `Connected`
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Snapshot of the recovery bookkeeping (attempts, partial content)
    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery.state()
    }
}

/// Collect a bounded amount of an error response body for diagnostics
async fn drain_body(body: Option<Box<dyn BodyReader>>) -> String {
    let Some(mut reader) = body else {
        return String::new();
    };
    let mut collected = Vec::new();
    while let Some(chunk) = reader.read().await {
        match chunk {
            Ok(bytes) => {
                collected.extend_from_slice(&bytes);
                if collected.len() >= MAX_ERROR_BODY_BYTES {
                    break;
                }
            }
            Err(e) => {
                log::warn!("error response body read failed: {}", e);
                break;
            }
        }
    }
    String::from_utf8_lossy(&collected).into_owned()
}
