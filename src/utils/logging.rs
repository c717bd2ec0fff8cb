//! Logging utilities
//!
//! Relay observability hook. Request/response inspection is opt-in through
//! `RELAY_DEBUG` and never buffers a stream to log it.

use reqwest::header::HeaderMap;
use std::sync::Arc;
use tracing::debug;

/// Maximum payload length kept in debug logs
pub const MAX_LOGGED_PAYLOAD: usize = 512;

/// Observer notified at each stage of one upstream exchange
pub trait RelayObserver: Send + Sync {
    /// Called once the wire request is fully built, before it is sent
    fn on_request(&self, _url: &str, _headers: &HeaderMap, _body: &[u8]) {}

    /// Called when the upstream status line arrives
    fn on_response(&self, _url: &str, _status: u16) {}

    /// Called for every SSE line as it is forwarded
    fn on_stream_frame(&self, _line: &str) {}
}

/// Observer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RelayObserver for NoopObserver {}

/// Observer that writes truncated payloads to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RelayObserver for TracingObserver {
    fn on_request(&self, url: &str, headers: &HeaderMap, body: &[u8]) {
        let header_names: Vec<&str> = headers.keys().map(|k| k.as_str()).collect();
        debug!(
            url = %url,
            headers = ?header_names,
            body = %truncate_content(&String::from_utf8_lossy(body), MAX_LOGGED_PAYLOAD),
            "Upstream request"
        );
    }

    fn on_response(&self, url: &str, status: u16) {
        debug!(url = %url, status = status, "Upstream response");
    }

    fn on_stream_frame(&self, line: &str) {
        debug!(frame = %truncate_content(line, MAX_LOGGED_PAYLOAD), "Stream frame");
    }
}

/// Pick the observer for the configured debug flag
pub fn observer_for(debug: bool) -> Arc<dyn RelayObserver> {
    if debug {
        Arc::new(TracingObserver)
    } else {
        Arc::new(NoopObserver)
    }
}

/// Truncate a string with a note about original length
pub fn truncate_content(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let total = s.chars().count();
            format!("{}... ({} chars truncated)", &s[..cut], total - max_chars)
        }
        None => s.to_string(),
    }
}
