//! Core type definitions for session state, request options, and wire chunks

use crate::error::ClassifiedError;
use crate::recovery::RecoveryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Canonical connection state machine for one streaming session.
///
/// `Disconnected → Connecting → Connected → Disconnected` on the happy
/// path; `Error` is the terminal state of a failed session until the next
/// `start()` or `reset()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Observable session state, exposed to callers as a cloned snapshot.
///
/// Owned exclusively by the client and mutated only by its own transition
/// logic. `data` is append-only for the duration of a session: retries
/// within a session preserve it, and only `reset()` or a fresh `start()`
/// clear it.
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// True from `start()` until terminal success, failure, or stop
    pub is_loading: bool,

    /// Ordered accumulation of every content delta observed so far
    pub data: String,

    /// Terminal classified failure of the session, if any
    pub error: Option<ClassifiedError>,

    /// Canonical connection state
    pub connection_state: ConnectionState,
}

impl StreamState {
    /// Derived view: true iff the connection state is `Connected`
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}

/// Options for one outgoing request: method, headers, and body.
///
/// Recovery headers are merged over these at request time, so a resumed
/// attempt carries both the caller's headers and the resume context.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method (defaults to GET, matching the fetch-style contract)
    pub method: reqwest::Method,

    /// Headers sent with the request
    pub headers: HashMap<String, String>,

    /// Raw request body, typically a JSON document
    pub body: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: reqwest::Method::GET,
            headers: HashMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    /// Create request options with the default method and no headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the HTTP method
    pub fn with_method(mut self, method: reqwest::Method) -> Self {
        self.method = method;
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a bearer-token Authorization header
    pub fn with_bearer(self, token: impl AsRef<str>) -> Self {
        let value = format!("Bearer {}", token.as_ref());
        self.with_header("Authorization", value)
    }

    /// Set the raw request body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Callback invoked with each content delta as it arrives
pub type DataCallback = Box<dyn FnMut(&str) + Send>;
/// Callback invoked once when a session completes successfully
pub type CompleteCallback = Box<dyn FnMut() + Send>;
/// Callback invoked once with the terminal classified failure
pub type ErrorCallback = Box<dyn FnMut(&ClassifiedError) + Send>;

/// Caller-supplied observers, dispatched synchronously in frame order.
#[derive(Default)]
pub(crate) struct StreamCallbacks {
    pub(crate) on_data: Option<DataCallback>,
    pub(crate) on_complete: Option<CompleteCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl StreamCallbacks {
    pub(crate) fn data(&mut self, delta: &str) {
        if let Some(cb) = &mut self.on_data {
            cb(delta);
        }
    }

    pub(crate) fn complete(&mut self) {
        if let Some(cb) = &mut self.on_complete {
            cb();
        }
    }

    pub(crate) fn error(&mut self, error: &ClassifiedError) {
        if let Some(cb) = &mut self.on_error {
            cb(error);
        }
    }
}

/// Options for configuring a streaming client
pub struct ClientOptions {
    /// Retry and backoff policy
    pub recovery: RecoveryConfig,

    /// Connect timeout applied by the HTTP transport, if any
    pub connect_timeout: Option<Duration>,

    pub(crate) callbacks: StreamCallbacks,
}

impl ClientOptions {
    /// Create a builder for client options
    pub fn builder() -> ClientOptionsBuilder {
        ClientOptionsBuilder::default()
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            recovery: RecoveryConfig::default(),
            connect_timeout: None,
            callbacks: StreamCallbacks::default(),
        }
    }
}

/// Builder for [`ClientOptions`]
#[derive(Default)]
pub struct ClientOptionsBuilder {
    recovery: Option<RecoveryConfig>,
    connect_timeout: Option<Duration>,
    callbacks: StreamCallbacks,
}

impl ClientOptionsBuilder {
    /// Set the retry and backoff policy
    pub fn recovery(mut self, config: RecoveryConfig) -> Self {
        self.recovery = Some(config);
        self
    }

    /// Set the transport connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Register the delta callback
    pub fn on_data<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.callbacks.on_data = Some(Box::new(callback));
        self
    }

    /// Register the completion callback
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.callbacks.on_complete = Some(Box::new(callback));
        self
    }

    /// Register the terminal-error callback
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ClassifiedError) + Send + 'static,
    {
        self.callbacks.on_error = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> ClientOptions {
        ClientOptions {
            recovery: self.recovery.unwrap_or_default(),
            connect_timeout: self.connect_timeout,
            callbacks: self.callbacks,
        }
    }
}

/// One streaming chunk as sent on the wire.
///
/// Only the fields the delta contract needs are declared; everything else
/// a server includes (ids, timestamps, model names) is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

impl StreamChunk {
    /// The delta text carried by the first choice, if any
    pub fn delta_text(&self) -> Option<&str> {
        self.choices.first().and_then(|choice| choice.delta.text())
    }
}

/// One choice inside a streaming chunk
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta inside a choice.
///
/// `content` carries answer text; `reasoning_content` carries thinking
/// text on servers that stream it. Either counts as a content delta, with
/// `content` preferred when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

impl StreamDelta {
    /// The non-empty delta text, preferring `content` over
    /// `reasoning_content`
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.reasoning_content.as_deref().filter(|s| !s.is_empty()))
    }
}
