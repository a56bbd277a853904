//! Test doubles for the transport layer.
//!
//! [`MockTransport`] stands in for [`HttpTransport`](crate::HttpTransport)
//! so streaming behavior can be exercised without a network: script a
//! sequence of responses with the `with_*` builders, hand the mock to
//! [`StreamClient::with_transport`](crate::StreamClient::with_transport),
//! and inspect the recorded requests afterwards. Scripted responses are
//! consumed in order, one per request, which makes multi-attempt retry
//! scenarios straightforward to stage.

use crate::error::{Error, Result};
use crate::transport::{BodyReader, StreamTransport, TransportResponse};
use crate::types::RequestOptions;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One request as the mock observed it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub method: reqwest::Method,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Convenience lookup for a single header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

enum MockScript {
    Response {
        status: u16,
        items: Vec<Result<Bytes>>,
        hang_when_empty: bool,
    },
    Error(Error),
}

/// Scriptable transport that replays configured responses in order
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    cancel_count: Arc<AtomicUsize>,
}

#[derive(Default)]
struct MockTransportInner {
    scripts: VecDeque<MockScript>,
    requests: Vec<RecordedRequest>,
}

impl MockTransport {
    /// Create a mock with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a 200 response whose body arrives as the given chunks
    pub fn with_success(self, chunks: &[&str]) -> Self {
        let items = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        self.push_script(MockScript::Response {
            status: 200,
            items,
            hang_when_empty: false,
        })
    }

    /// Add a response with an arbitrary status and a single-chunk body
    pub fn with_status(self, status: u16, body: &str) -> Self {
        self.push_script(MockScript::Response {
            status,
            items: vec![Ok(Bytes::copy_from_slice(body.as_bytes()))],
            hang_when_empty: false,
        })
    }

    /// Add a transport-level failure (the request itself errors)
    pub fn with_error(self, error: Error) -> Self {
        self.push_script(MockScript::Error(error))
    }

    /// Add a 200 response with full control over each read result,
    /// including mid-body errors
    pub fn with_reader_items(self, items: Vec<Result<Bytes>>) -> Self {
        self.push_script(MockScript::Response {
            status: 200,
            items,
            hang_when_empty: false,
        })
    }

    /// Add a 200 response that yields the given chunks and then parks
    /// forever, simulating a connection that stays open. Useful for
    /// exercising stop behavior mid-stream.
    pub fn with_hanging_response(self, chunks: &[&str]) -> Self {
        let items = chunks
            .iter()
            .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
            .collect();
        self.push_script(MockScript::Response {
            status: 200,
            items,
            hang_when_empty: true,
        })
    }

    fn push_script(self, script: MockScript) -> Self {
        self.inner.lock().unwrap().scripts.push_back(script);
        self
    }

    /// All requests made so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Number of requests made so far
    pub fn request_count(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    /// Verify that a request was made with the given method and URL
    pub fn verify_request(&self, method: reqwest::Method, url: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .requests
            .iter()
            .any(|r| r.method == method && r.url == url)
    }

    /// Total `cancel` calls across every reader this mock handed out
    pub fn reader_cancels(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }

    /// Clear all scripts, recorded requests, and counters
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.scripts.clear();
        inner.requests.clear();
        self.cancel_count.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamTransport for MockTransport {
    async fn request(&self, url: &str, options: &RequestOptions) -> Result<TransportResponse> {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.requests.push(RecordedRequest {
                url: url.to_string(),
                method: options.method.clone(),
                headers: options.headers.clone(),
                body: options.body.clone(),
            });
        }

        let script = self.inner.lock().unwrap().scripts.pop_front();
        match script {
            Some(MockScript::Response {
                status,
                items,
                hang_when_empty,
            }) => {
                let reader =
                    ScriptedReader::shared(items, hang_when_empty, Arc::clone(&self.cancel_count));
                Ok(TransportResponse {
                    status,
                    body: Some(Box::new(reader)),
                })
            }
            Some(MockScript::Error(error)) => Err(error),
            None => Err(Error::other("no mock response configured")),
        }
    }
}

/// Body reader that replays a scripted sequence of read results
pub struct ScriptedReader {
    items: VecDeque<Result<Bytes>>,
    hang_when_empty: bool,
    cancelled: bool,
    cancel_count: Arc<AtomicUsize>,
}

impl ScriptedReader {
    /// Reader over explicit read results
    pub fn new(items: Vec<Result<Bytes>>) -> Self {
        Self::shared(items, false, Arc::new(AtomicUsize::new(0)))
    }

    /// Reader over string chunks
    pub fn from_chunks(chunks: &[&str]) -> Self {
        Self::new(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect(),
        )
    }

    fn shared(items: Vec<Result<Bytes>>, hang_when_empty: bool, counter: Arc<AtomicUsize>) -> Self {
        Self {
            items: items.into(),
            hang_when_empty,
            cancelled: false,
            cancel_count: counter,
        }
    }
}

#[async_trait]
impl BodyReader for ScriptedReader {
    async fn read(&mut self) -> Option<Result<Bytes>> {
        if self.cancelled {
            return None;
        }
        match self.items.pop_front() {
            Some(item) => Some(item),
            None if self.hang_when_empty => {
                futures::future::pending::<()>().await;
                None
            }
            None => None,
        }
    }

    async fn cancel(&mut self) {
        // Every call is counted so tests can assert on exact cancel counts
        self.cancelled = true;
        self.items.clear();
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_mock_yields_scripted_chunks() {
        let mock = MockTransport::new().with_success(&["data: hello\n\n", "data: [DONE]\n\n"]);

        let response = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(response.ok());

        let mut reader = response.body.unwrap();
        let first = reader.read().await.unwrap().unwrap();
        assert_eq!(&first[..], b"data: hello\n\n");
        let second = reader.read().await.unwrap().unwrap();
        assert_eq!(&second[..], b"data: [DONE]\n\n");
        assert!(reader.read().await.is_none());
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let mock = MockTransport::new().with_success(&[]);
        let options = RequestOptions::new()
            .with_method(reqwest::Method::POST)
            .with_header("X-Test", "yes")
            .with_body(r#"{"prompt":"hi"}"#);

        mock.request("https://example.test/stream", &options)
            .await
            .unwrap();

        assert_eq!(mock.request_count(), 1);
        assert!(mock.verify_request(reqwest::Method::POST, "https://example.test/stream"));
        let recorded = &mock.requests()[0];
        assert_eq!(recorded.header("X-Test"), Some("yes"));
        assert_eq!(recorded.body.as_deref(), Some(r#"{"prompt":"hi"}"#));
    }

    #[tokio::test]
    async fn test_mock_transport_error() {
        let mock = MockTransport::new().with_error(Error::timeout());
        let result = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn test_mock_exhausted_scripts() {
        let mock = MockTransport::new();
        let result = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("mock"));
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_body() {
        let mock = MockTransport::new().with_status(500, "Internal Server Error");
        let response = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await
            .unwrap();
        assert!(!response.ok());

        let mut reader = response.body.unwrap();
        let body = reader.read().await.unwrap().unwrap();
        assert_eq!(&body[..], b"Internal Server Error");
    }

    #[tokio::test]
    async fn test_reader_cancel_is_counted_per_call() {
        let mock = MockTransport::new().with_success(&["data: hi\n\n"]);
        let response = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await
            .unwrap();

        let mut reader = response.body.unwrap();
        reader.cancel().await;
        reader.cancel().await;
        assert_eq!(mock.reader_cancels(), 2);
        assert!(reader.read().await.is_none());
    }

    #[tokio::test]
    async fn test_hanging_reader_parks_until_cancelled() {
        let mock = MockTransport::new().with_hanging_response(&["data: hi\n\n"]);
        let response = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await
            .unwrap();

        let mut reader = response.body.unwrap();
        assert!(reader.read().await.is_some());
        // With the script drained the next read never resolves
        let parked = tokio::time::timeout(Duration::from_millis(20), reader.read()).await;
        assert!(parked.is_err());

        reader.cancel().await;
        assert!(reader.read().await.is_none());
    }

    #[tokio::test]
    async fn test_scripted_reader_mid_body_error() {
        let mut reader = ScriptedReader::new(vec![
            Ok(Bytes::from_static(b"data: partial\n\n")),
            Err(Error::stream("connection reset by peer")),
        ]);

        assert!(reader.read().await.unwrap().is_ok());
        let error = reader.read().await.unwrap().unwrap_err();
        assert!(error.to_string().contains("connection reset"));
        assert!(reader.read().await.is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let mock = MockTransport::new().with_success(&["data: hi\n\n"]);
        let response = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await
            .unwrap();
        response.body.unwrap().cancel().await;

        mock.reset();
        assert_eq!(mock.request_count(), 0);
        assert_eq!(mock.reader_cancels(), 0);
        let result = mock
            .request("https://example.test/stream", &RequestOptions::new())
            .await;
        assert!(result.is_err());
    }
}
