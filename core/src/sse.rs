//! Incremental decoding of Server-Sent Events produced by streamed chat
//! completions.
//!
//! Network chunks do not respect line boundaries, so [`SseDecoder`] buffers
//! raw bytes until a full line is available. `data:` lines accumulate until a
//! blank line ends the event; several `data:` lines of one event are joined
//! with `\n`. Comments, `event:` and `id:` lines are skipped.

use crate::errors::{ProviderError, ProviderResult};
use crate::types::ChatCompletionChunk;

/// Marker sent by OpenAI-compatible providers after the last chunk
pub const DONE_MARKER: &str = "[DONE]";

/// One decoded event of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Line-oriented SSE decoder with carry-over between chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a network chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = self.feed_line(&line[..line.len() - 1]) {
                events.push(event);
            }
        }
        events
    }

    /// Ends the stream, dispatching an event cut short by end of body.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        let mut events: Vec<SseEvent> = self.feed_line(&line).into_iter().collect();
        events.extend(self.dispatch());
        events
    }

    fn feed_line(&mut self, line: &[u8]) -> Option<SseEvent> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(line);
        if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            match &mut self.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(payload);
                }
                None => self.data = Some(payload.to_string()),
            }
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let data = self.data.take()?;
        if data.trim() == DONE_MARKER {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(data))
        }
    }
}

/// Extracts the text delta from a `data:` payload.
///
/// Returns `Ok(None)` for chunks without content (role announcements,
/// finish markers, usage reports).
pub fn parse_delta(data: &str) -> ProviderResult<Option<String>> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| ProviderError::ParsingError(format!("Invalid stream chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(ProviderError::StreamError(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}
