//! Incremental Server-Sent-Events framing and delta extraction.
//!
//! The upstream endpoint answers with newline-delimited event frames:
//!
//! ```text
//! id: event-123
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: [DONE]
//! ```
//!
//! HTTP chunking does not respect frame boundaries: a read may end in the
//! middle of a line, between the field name and its payload, or inside a
//! multi-byte UTF-8 sequence. [`FrameDecoder`] therefore keeps a carry-over
//! byte buffer and only surfaces complete lines, so the resulting field
//! sequence is identical for every possible chunking of the same bytes.
//!
//! Lines are split at `\n` (a trailing `\r` is tolerated). Since the line
//! terminator is ASCII it can never fall inside a UTF-8 code point, which
//! makes byte-level splitting safe; text decoding happens per complete
//! line. Each `data:` line is processed independently, including several
//! within one event block, and the literal payload `[DONE]` marks normal
//! end of stream.

use crate::Result;
use crate::types::StreamChunk;

/// Payload value signalling normal end of stream
pub const DONE_MARKER: &str = "[DONE]";

/// A significant line extracted from the event stream.
///
/// Blank delimiter lines, `:` comments, and unrecognized fields are
/// consumed by the decoder and never surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseField {
    /// Payload of a `data: ` line
    Data(String),
    /// Event id from an `id: ` line
    Id(String),
    /// Event name from an `event: ` line
    Event(String),
}

/// Incremental line framer with a carry-over buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of raw bytes and return every field completed by it.
    ///
    /// Fields come back in wire order. Bytes after the last `\n` stay in
    /// the buffer until a later chunk completes their line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseField> {
        self.buffer.extend_from_slice(chunk);

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();

        let mut fields = Vec::new();
        for raw_line in complete.split(|&b| b == b'\n') {
            let raw_line = match raw_line.last() {
                Some(b'\r') => &raw_line[..raw_line.len() - 1],
                _ => raw_line,
            };
            let line = String::from_utf8_lossy(raw_line);
            if let Some(field) = parse_line(&line) {
                fields.push(field);
            }
        }
        fields
    }

    /// Number of buffered bytes still waiting for a line terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Classify one complete line.
///
/// Blank lines delimit events and carry no data. Lines starting with `:`
/// are comments (heartbeats). Unrecognized field names are accepted and
/// ignored.
fn parse_line(line: &str) -> Option<SseField> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(payload) = line.strip_prefix("data: ") {
        return Some(SseField::Data(payload.to_string()));
    }
    if let Some(id) = line.strip_prefix("id: ") {
        return Some(SseField::Id(id.to_string()));
    }
    if let Some(name) = line.strip_prefix("event: ") {
        return Some(SseField::Event(name.to_string()));
    }
    None
}

/// Extract the content delta from one `data:` payload.
///
/// Returns `Ok(None)` for well-formed chunks without delta text (empty
/// deltas, role-only chunks, finish markers). A malformed payload is an
/// error for the caller to report as a non-fatal diagnostic.
pub fn delta_text(payload: &str) -> Result<Option<String>> {
    let chunk: StreamChunk = serde_json::from_str(payload)?;
    Ok(chunk.delta_text().map(str::to_owned))
}
