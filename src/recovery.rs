//! Failure classification, retry policy, and session recovery state.
//!
//! [`RecoveryManager`] owns everything a streaming session needs to survive
//! transient failures: it classifies raw errors into the closed
//! [`ErrorKind`] taxonomy, decides retry eligibility against a bounded
//! budget with exponential backoff, preserves the partial output already
//! delivered so a resumed request can continue where the stream broke, and
//! hands out the cooperative cancellation handle for the session.
//!
//! # Examples
//!
//! ```rust,no_run
//! use robust_sse::{Error, RecoveryConfig, RecoveryManager};
//!
//! # async fn example() {
//! let mut recovery = RecoveryManager::new(
//!     RecoveryConfig::default().with_max_attempts(5),
//! );
//!
//! let classified = recovery.classify(&Error::api_status(503, "busy"));
//! if recovery.should_retry(&classified).await {
//!     recovery.prepare_retry();
//!     // re-issue the request with recovery.recovery_headers()
//! }
//! # }
//! ```

use crate::error::{ClassifiedError, Error, ErrorKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

/// Header carrying the UTF-8 byte length of the preserved partial output
pub const RESUME_OFFSET_HEADER: &str = "X-Resume-Offset";
/// Header carrying the current retry attempt number
pub const RETRY_ATTEMPT_HEADER: &str = "X-Retry-Attempt";
/// Standard SSE resumption header carrying the last seen event id
pub const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Configuration for recovery behavior
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts per session
    pub max_attempts: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,

    /// Add random jitter to prevent thundering herd (0.0 to 1.0)
    pub jitter_factor: f64,

    /// Whether `unknown`-classified failures are eligible for retry
    pub retry_unknown: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            retry_unknown: false,
        }
    }
}

impl RecoveryConfig {
    /// Create a new recovery configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of attempts
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set jitter factor (0.0 to 1.0)
    pub fn with_jitter_factor(mut self, jitter: f64) -> Self {
        self.jitter_factor = jitter.clamp(0.0, 1.0);
        self
    }

    /// Treat `unknown`-classified failures as retryable
    pub fn with_retry_unknown(mut self, retry_unknown: bool) -> Self {
        self.retry_unknown = retry_unknown;
        self
    }

    /// Calculate delay for a given attempt with exponential backoff and jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_delay_ms = self.initial_delay.as_millis() as f64;
        let exponential_delay = base_delay_ms * self.backoff_multiplier.powi(attempt as i32);

        // Cap at max delay
        let capped_delay = exponential_delay.min(self.max_delay.as_millis() as f64);

        // Add jitter
        let jitter_range = capped_delay * self.jitter_factor;
        let jitter = rand::random::<f64>() * jitter_range;
        let final_delay = capped_delay + jitter - (jitter_range / 2.0);

        Duration::from_millis(final_delay.max(0.0) as u64)
    }
}

/// Map a raw failure to exactly one taxonomy bucket.
///
/// Deterministic: the same error (and the same `retry_unknown` policy)
/// always produces the same `{kind, retryable}` pair. Precedence follows
/// the signal strength of the evidence: an explicit abort beats a status
/// code, a status code beats message wording.
pub fn classify_error(error: &Error, retry_unknown: bool) -> ClassifiedError {
    let kind = match error {
        Error::Aborted => ErrorKind::Aborted,
        Error::Api { status, message } => match status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimit,
            500..=599 => ErrorKind::Server,
            _ => kind_from_message(message),
        },
        Error::Timeout => ErrorKind::Timeout,
        Error::Http(e) => {
            if e.is_timeout() {
                ErrorKind::Timeout
            } else {
                ErrorKind::Network
            }
        }
        Error::Stream(message) => kind_from_message(message),
        Error::Other(message) => kind_from_message(message),
        Error::Unrecoverable(classified) => classified.kind,
        Error::Json(_) | Error::Config(_) | Error::InvalidInput(_) => ErrorKind::Unknown,
    };

    let retryable = match kind {
        ErrorKind::Unknown => retry_unknown,
        other => other.default_retryable(),
    };

    ClassifiedError::new(kind, error.to_string(), retryable)
}

/// Message-wording fallback for failures without a status code.
///
/// Timeout wording wins over connectivity wording so that "connection
/// timed out" lands in the timeout bucket.
fn kind_from_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    const TIMEOUT_SIGNALS: [&str; 2] = ["timeout", "timed out"];
    const NETWORK_SIGNALS: [&str; 9] = [
        "network",
        "connection",
        "connect",
        "fetch",
        "dns",
        "refused",
        "reset",
        "broken pipe",
        "unreachable",
    ];
    const TOKEN_LIMIT_SIGNALS: [&str; 4] = [
        "context length",
        "context window",
        "maximum context",
        "token limit",
    ];

    if TIMEOUT_SIGNALS.iter().any(|s| lower.contains(s)) {
        ErrorKind::Timeout
    } else if NETWORK_SIGNALS.iter().any(|s| lower.contains(s)) {
        ErrorKind::Network
    } else if TOKEN_LIMIT_SIGNALS.iter().any(|s| lower.contains(s)) {
        ErrorKind::TokenLimit
    } else {
        ErrorKind::Unknown
    }
}

/// Recovery bookkeeping for one logical stream session
#[derive(Debug, Clone, Default)]
pub struct RecoveryState {
    /// Retry attempts consumed so far; monotone within a session
    pub attempts: u32,

    /// True from the first `prepare_retry` until the session settles
    pub is_recovering: bool,

    /// Output already delivered to the caller, preserved across retries
    pub partial_content: String,

    /// Most recent classified failure, if any
    pub last_error: Option<ClassifiedError>,
}

/// Cooperative cancellation handle shared by everyone who may stop a
/// session.
///
/// Clones share one signal: any clone's [`abort`](AbortHandle::abort)
/// trips the flag and wakes every pending [`cancelled`](AbortHandle::cancelled)
/// wait. Aborting is idempotent.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the abort flag and wake all waiters
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether the handle has been aborted
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once the handle is aborted.
    ///
    /// The waiter is registered before the flag check, so an abort racing
    /// this call is never missed.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }

    /// Clear the flag so the same handle can guard the next session
    pub(crate) fn rearm(&self) {
        self.aborted.store(false, Ordering::SeqCst);
    }
}

/// Failure classification and retry coordination for a streaming client.
///
/// Owns the [`RecoveryState`] for the active session and the session's
/// [`AbortHandle`]. The recovery state machine is simple: `idle →
/// recovering` on [`prepare_retry`](Self::prepare_retry), `recovering →
/// idle` on [`complete_recovery`](Self::complete_recovery) or
/// [`reset`](Self::reset); it stays `recovering` across repeated retries
/// until the session either completes or exhausts its budget.
#[derive(Debug)]
pub struct RecoveryManager {
    config: RecoveryConfig,
    state: RecoveryState,
    last_event_id: Option<String>,
    abort: AbortHandle,
}

impl RecoveryManager {
    /// Create a manager with the given policy
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            state: RecoveryState::default(),
            last_event_id: None,
            abort: AbortHandle::new(),
        }
    }

    /// The active policy
    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Classify a raw failure under this manager's policy.
    ///
    /// Pure with respect to the manager's mutable state; see
    /// [`classify_error`].
    pub fn classify(&self, error: &Error) -> ClassifiedError {
        classify_error(error, self.config.retry_unknown)
    }

    /// Decide whether the session may retry after the given failure,
    /// waiting out the backoff delay when the answer is yes.
    ///
    /// Returns false for non-retryable failures, for aborts, once the
    /// attempt budget is spent, or when the session is aborted during the
    /// backoff wait.
    pub async fn should_retry(&self, error: &ClassifiedError) -> bool {
        if !error.retryable || error.kind == ErrorKind::Aborted {
            return false;
        }
        if self.state.attempts >= self.config.max_attempts {
            log::debug!(
                "retry budget exhausted after {} attempts ({})",
                self.state.attempts,
                error.kind
            );
            return false;
        }

        let delay = self.config.backoff_delay(self.state.attempts);
        if !delay.is_zero() {
            log::debug!(
                "waiting {:?} before retry attempt {} ({})",
                delay,
                self.state.attempts + 1,
                error.kind
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = self.abort.cancelled() => return false,
            }
        }
        !self.abort.is_aborted()
    }

    /// Mark the next attempt: bumps the attempt counter and enters the
    /// recovering state. The partial-content snapshot is already current
    /// thanks to [`update_partial_content`](Self::update_partial_content).
    pub fn prepare_retry(&mut self) {
        self.state.attempts += 1;
        self.state.is_recovering = true;
        log::debug!(
            "prepared retry attempt {}, preserving {} bytes of partial output",
            self.state.attempts,
            self.state.partial_content.len()
        );
    }

    /// Refresh the preserved partial output from the caller's accumulated
    /// data. Called on every delta append so a mid-stream drop resumes
    /// from the freshest position.
    pub fn update_partial_content(&mut self, content: &str) {
        if self.state.partial_content != content {
            self.state.partial_content.clear();
            self.state.partial_content.push_str(content);
        }
    }

    /// Remember the most recent classified failure
    pub fn record_error(&mut self, error: &ClassifiedError) {
        self.state.last_error = Some(error.clone());
    }

    /// Remember the most recent SSE event id for resumption
    pub fn record_event_id(&mut self, id: &str) {
        self.last_event_id = Some(id.to_string());
    }

    /// The most recent SSE event id, if any
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Resume-context headers for the next attempt.
    ///
    /// Empty unless the session is recovering with partial output to
    /// resume from.
    pub fn recovery_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if self.state.is_recovering && !self.state.partial_content.is_empty() {
            headers.insert(
                RESUME_OFFSET_HEADER.to_string(),
                self.state.partial_content.len().to_string(),
            );
            headers.insert(
                RETRY_ATTEMPT_HEADER.to_string(),
                self.state.attempts.to_string(),
            );
            if let Some(id) = &self.last_event_id {
                headers.insert(LAST_EVENT_ID_HEADER.to_string(), id.clone());
            }
        }
        headers
    }

    /// The session's cancellation handle.
    ///
    /// All clones share one signal, and the handle stays valid across
    /// sessions: [`reset`](Self::reset) re-arms it instead of replacing
    /// it, so a handle obtained before `start()` can stop the session
    /// that follows.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Trigger cancellation on the current handle; idempotent
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Read-only snapshot of the recovery state
    pub fn state(&self) -> RecoveryState {
        self.state.clone()
    }

    /// Leave the recovering state after a successful resumed completion.
    /// Attempts persist until the next session boundary.
    pub fn complete_recovery(&mut self) {
        if self.state.is_recovering {
            log::debug!("stream recovered after {} attempts", self.state.attempts);
        }
        self.state.is_recovering = false;
    }

    /// Clear all counters and partial content back to initial values and
    /// re-arm the abort handle. Called at every session boundary.
    pub fn reset(&mut self) {
        self.state = RecoveryState::default();
        self.last_event_id = None;
        self.abort.rearm();
    }
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new(RecoveryConfig::default())
    }
}
