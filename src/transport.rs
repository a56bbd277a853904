//! Transport abstraction over the HTTP layer.
//!
//! [`StreamTransport`] is the seam between the client and the network:
//! production code uses [`HttpTransport`] (reqwest), tests substitute
//! [`MockTransport`](crate::testing::MockTransport). A transport issues
//! one request and hands back a [`TransportResponse`] whose body is read
//! incrementally as raw byte chunks, exactly as they arrive off the wire.

use crate::error::{Error, Result};
use crate::types::RequestOptions;
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};

/// Issues HTTP requests on behalf of the streaming client.
///
/// Implementations must be cheap to share; the client holds one behind an
/// `Arc` for the lifetime of the session.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Send the request and return the response head plus a body reader.
    ///
    /// Transport-level failures (DNS, refused connections, timeouts)
    /// surface as `Err`. Non-2xx statuses are NOT errors at this layer;
    /// the caller inspects [`TransportResponse::ok`].
    async fn request(&self, url: &str, options: &RequestOptions) -> Result<TransportResponse>;
}

/// Incremental access to a response body.
///
/// Readers yield chunks in arrival order with no framing guarantees; a
/// chunk may split a UTF-8 sequence or an SSE frame anywhere.
#[async_trait]
pub trait BodyReader: Send {
    /// Next chunk of body bytes. `None` means the body is exhausted;
    /// after an `Err` the reader should not be polled again.
    async fn read(&mut self) -> Option<Result<Bytes>>;

    /// Release the underlying connection without draining it.
    ///
    /// Idempotent. After cancellation [`read`](Self::read) returns `None`.
    async fn cancel(&mut self);
}

/// Response head plus an optional streaming body
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,

    /// Body reader, when the response has one
    pub body: Option<Box<dyn BodyReader>>,
}

impl TransportResponse {
    /// Whether the status is in the 2xx success range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("body", &self.body.as_ref().map(|_| "<reader>"))
            .finish()
    }
}

/// Production transport backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport, optionally bounding connection establishment
    pub fn new(connect_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("robust-sse/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn request(&self, url: &str, options: &RequestOptions) -> Result<TransportResponse> {
        let mut request = self.client.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let reader: Box<dyn BodyReader> = Box::new(HttpBodyReader::new(response));

        Ok(TransportResponse {
            status,
            body: Some(reader),
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(error)
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Body reader over reqwest's byte stream. Cancellation drops the stream,
/// which closes the connection.
struct HttpBodyReader {
    inner: Option<ByteStream>,
}

impl HttpBodyReader {
    fn new(response: reqwest::Response) -> Self {
        Self {
            inner: Some(Box::pin(response.bytes_stream())),
        }
    }
}

#[async_trait]
impl BodyReader for HttpBodyReader {
    async fn read(&mut self) -> Option<Result<Bytes>> {
        let stream = self.inner.as_mut()?;
        match stream.next().await {
            Some(Ok(bytes)) => Some(Ok(bytes)),
            Some(Err(e)) => Some(Err(map_reqwest_error(e))),
            None => None,
        }
    }

    async fn cancel(&mut self) {
        self.inner = None;
    }
}
