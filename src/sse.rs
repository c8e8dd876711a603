//! Server-Sent Events framing
//!
//! The server writes `hello` / `post` frames plus comment keep-alives; the
//! client feeds raw body chunks into [`SseDecoder`] and gets whole messages
//! back regardless of where the chunk boundaries fall.

use bytes::Bytes;

use crate::feed::{Entry, FeedEvent};
use crate::types::Result;

pub const CONTENT_TYPE: &str = "text/event-stream";

/// Event name sent once when a stream attaches
pub const EVENT_HELLO: &str = "hello";

/// Event name for each appended entry
pub const EVENT_POST: &str = "post";

/// Encode one event. Multi-line data becomes several `data:` lines.
pub fn encode_event(event: &str, data: &str) -> Bytes {
    let mut frame = String::with_capacity(event.len() + data.len() + 16);
    frame.push_str("event: ");
    frame.push_str(event);
    frame.push('\n');
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}

pub fn hello_frame() -> Bytes {
    encode_event(EVENT_HELLO, "{}")
}

pub fn post_frame(entry: &Entry) -> Result<Bytes> {
    Ok(encode_event(EVENT_POST, &serde_json::to_string(entry)?))
}

/// Comment line; clients ignore it, proxies see traffic
pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(b": keepalive\n\n")
}

/// A dispatched SSE message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// `message` when the frame had no `event:` line
    pub event: String,
    pub data: String,
}

impl SseMessage {
    /// Map onto the feed protocol. Unknown event names yield `None`.
    pub fn into_feed_event(self) -> Option<FeedEvent> {
        match self.event.as_str() {
            EVENT_HELLO => Some(FeedEvent::Hello),
            EVENT_POST => Some(match serde_json::from_str::<Entry>(&self.data) {
                Ok(entry) => FeedEvent::Post(entry),
                Err(_) => FeedEvent::Malformed(self.data),
            }),
            _ => None,
        }
    }
}

/// Incremental decoder for a `text/event-stream` body
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every message it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.pending.extend_from_slice(chunk);

        let mut messages = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if let Some(message) = self.process_line(line) {
                messages.push(message);
            }
        }
        messages
    }

    fn process_line(&mut self, line: &str) -> Option<SseMessage> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry are not used by the feed protocol
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseMessage {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}
