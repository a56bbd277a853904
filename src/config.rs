//! Configuration helpers for streaming endpoints

use std::env;

/// Get the API key from environment variable or fallback
///
/// Priority:
/// 1. ROBUST_SSE_API_KEY environment variable
/// 2. fallback parameter
///
/// # Examples
///
/// ```rust,no_run
/// use robust_sse::get_api_key;
///
/// // Read from environment
/// let key = get_api_key(None);
///
/// // With fallback
/// let key = get_api_key(Some("sk-local-dev"));
/// ```
pub fn get_api_key(fallback: Option<&str>) -> Option<String> {
    // Try environment variable first
    if let Ok(key) = env::var("ROBUST_SSE_API_KEY") {
        return Some(key);
    }

    // Use fallback
    fallback.map(|s| s.to_string())
}

/// Get the streaming endpoint URL from environment variable or fallback
///
/// Priority:
/// 1. ROBUST_SSE_ENDPOINT environment variable
/// 2. fallback parameter
///
/// # Examples
///
/// ```rust,no_run
/// use robust_sse::get_endpoint;
///
/// let endpoint = get_endpoint(Some("http://localhost:8080/v1/chat/completions"));
/// ```
pub fn get_endpoint(fallback: Option<&str>) -> Option<String> {
    // Try environment variable first
    if let Ok(url) = env::var("ROBUST_SSE_ENDPOINT") {
        return Some(url);
    }

    // Use fallback
    fallback.map(|s| s.to_string())
}

/// Whether streaming is enabled, from environment variable or default
///
/// ROBUST_SSE_STREAMING accepts `1`/`true`/`yes`/`on` and
/// `0`/`false`/`no`/`off` (case-insensitive). Unset or unrecognized
/// values fall back to the default.
///
/// # Examples
///
/// ```rust,no_run
/// use robust_sse::streaming_enabled;
///
/// if streaming_enabled(true) {
///     // issue a streaming request
/// }
/// ```
pub fn streaming_enabled(default: bool) -> bool {
    match env::var("ROBUST_SSE_STREAMING") {
        Ok(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
