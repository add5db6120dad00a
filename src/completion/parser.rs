//! Incremental server-sent-events parser for streamed completions
//!
//! Bytes arrive in arbitrary chunks. Complete lines are consumed as they
//! appear; `data:` lines are accumulated until a blank line ends the event.
//! - Buffer: 1MB maximum for a single unterminated line
//! - `[DONE]` sentinels are dropped
//! - `event:` names are kept so error frames can be told apart

use serde::Deserialize;

use crate::errors::{RagError, Result};

/// Maximum buffer size (1MB)
pub const MAX_BUFFER_SIZE: usize = 1_048_576;

/// Sentinel some endpoints send as the final event
const DONE_SENTINEL: &str = "[DONE]";

/// Event name the service uses for mid-stream failures
const ERROR_EVENT: &str = "error";

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Value of the `event:` field, if the frame carried one
    pub event: Option<String>,
    /// `data:` lines joined with newlines
    pub data: String,
}

impl StreamEvent {
    /// Service failure reported inside the stream, if this is one
    ///
    /// Either the frame is named `error`, or its payload carries a `message`
    /// and no `choices`.
    pub fn error_message(&self) -> Option<String> {
        let named_error = self.event.as_deref() == Some(ERROR_EVENT);
        let payload = serde_json::from_str::<ErrorPayload>(&self.data).ok();

        match payload {
            Some(ErrorPayload {
                message: Some(message),
                code,
                choices: None,
            }) => Some(match code {
                Some(serde_json::Value::String(code)) => format!("{} (code {})", message, code),
                Some(serde_json::Value::Number(code)) => format!("{} (code {})", message, code),
                _ => message,
            }),
            _ if named_error => Some(self.data.trim().to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    choices: Option<serde_json::Value>,
}

/// Incremental event-stream parser
#[derive(Debug)]
pub struct EventStreamParser {
    /// Bytes of the current unterminated line
    buffer: Vec<u8>,

    /// `data:` lines of the event being assembled
    pending: Vec<String>,

    /// `event:` name of the event being assembled
    pending_name: Option<String>,

    /// Maximum buffer size
    max_buffer_size: usize,
}

impl EventStreamParser {
    /// Create new parser with default settings
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFER_SIZE)
    }

    /// Create parser with custom buffer capacity
    pub fn with_capacity(max_buffer_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            pending: Vec::new(),
            pending_name: None,
            max_buffer_size,
        }
    }

    /// Add bytes and return every event they complete
    pub fn add_bytes(&mut self, bytes: &[u8]) -> Result<Vec<StreamEvent>> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_buffer_size {
            return Err(RagError::StreamParseError(format!(
                "Buffer overflow: {} bytes exceeds maximum {}",
                self.buffer.len(),
                self.max_buffer_size
            )));
        }

        Ok(events)
    }

    /// Flush a trailing unterminated line and any event still open
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            if let Some(event) = self.process_line(line.trim_end_matches('\r')) {
                return Some(event);
            }
        }
        self.take_event()
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.take_event();
        }

        if let Some(data) = line.strip_prefix("data:") {
            self.pending.push(strip_field_space(data).to_string());
        } else if let Some(name) = line.strip_prefix("event:") {
            self.pending_name = Some(strip_field_space(name).to_string());
        }
        // Comments, id: and retry: are ignored
        None
    }

    fn take_event(&mut self) -> Option<StreamEvent> {
        let event = self.pending_name.take();
        if self.pending.is_empty() {
            return None;
        }
        let data = self.pending.join("\n");
        self.pending.clear();
        if data.trim() == DONE_SENTINEL {
            None
        } else {
            Some(StreamEvent { event, data })
        }
    }

    /// Get current buffer size
    pub fn buffer_size(&self) -> usize {
        self.buffer.len()
    }

    /// Check if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.pending.is_empty() && self.pending_name.is_none()
    }
}

fn strip_field_space(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}

impl Default for EventStreamParser {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Extract the text fragment carried by one streamed event
pub fn delta_text(payload: &str) -> Result<Option<String>> {
    let chunk: ChunkPayload = serde_json::from_str(payload)
        .map_err(|e| RagError::StreamParseError(format!("Invalid completion chunk: {}", e)))?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content.or(delta.text)))
}
