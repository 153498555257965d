//! Incremental parser for line-delimited `data:` event frames.
//!
//! Network reads split frames anywhere, including inside a multi-byte UTF-8
//! sequence. The parser keeps the unterminated tail of each read as raw
//! bytes and only decodes complete lines.

use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// One decoded event payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Text the model produced; the only frame that reaches the transcript.
    TextDelta(String),
    /// Structured non-text payload (tool calls, usage, finish reasons, ...).
    Control(Value),
    /// Terminal `[DONE]` marker.
    Done,
}

#[derive(Debug, Default)]
pub struct FrameParser {
    pending: Vec<u8>,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read and return every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            if let Some(frame) = parse_line(&self.pending[consumed..end]) {
                frames.push(frame);
            }
            consumed = end + 1;
        }
        self.pending.drain(..consumed);
        frames
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        let rest = std::mem::take(&mut self.pending);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<StreamFrame> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches('\r');
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.is_empty() {
        return None;
    }
    if payload.trim() == DONE_MARKER {
        return Some(StreamFrame::Done);
    }

    match serde_json::from_str::<Value>(payload) {
        Ok(Value::String(text)) => Some(StreamFrame::TextDelta(text)),
        // Bare scalars are text the model wrote, kept as sent.
        Ok(Value::Number(_) | Value::Bool(_)) => {
            Some(StreamFrame::TextDelta(payload.trim().to_string()))
        }
        Ok(value) => Some(match text_from_event(&value) {
            Some(text) => StreamFrame::TextDelta(text.to_string()),
            None => StreamFrame::Control(value),
        }),
        // Bare, unquoted text payload.
        Err(_) => Some(StreamFrame::TextDelta(payload.to_string())),
    }
}

/// Pull the text delta out of the event shapes upstreams emit.
fn text_from_event(value: &Value) -> Option<&str> {
    let kind = value.get("type").and_then(Value::as_str);
    match kind {
        Some("text-delta") | Some("text_delta") => value
            .get("delta")
            .or_else(|| value.get("textDelta"))
            .or_else(|| value.get("text"))
            .and_then(Value::as_str),
        Some("content_block_delta") => value
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(Value::as_str),
        Some(_) => None,
        // OpenAI chat completion chunk.
        None => value
            .get("choices")?
            .get(0)?
            .get("delta")?
            .get("content")?
            .as_str(),
    }
}
