//! Incremental Server-Sent Events parser.
//!
//! Feeds arbitrary byte chunks (as they come off the HTTP body) and yields
//! complete messages. Lines end in `\n`, `\r\n` or `\r`; a blank line
//! dispatches the pending message. `retry:` and comment lines are ignored.

use bytes::BytesMut;

/// One dispatched SSE message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseMessage {
    /// `event:` field, `None` for the default `message` type.
    pub event: Option<String>,
    pub data: String,
    /// Last event id seen on the stream (persists across messages).
    pub id: Option<String>,
}

impl SseMessage {
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

#[derive(Debug, Default)]
pub struct SseParser {
    buffer: BytesMut,
    event: Option<String>,
    data: String,
    has_data: bool,
    last_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk, returning every message it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.buffer.extend_from_slice(chunk);
        let mut messages = Vec::new();

        let mut start = 0;
        let mut i = 0;
        while i < self.buffer.len() {
            let byte = self.buffer[i];
            if byte != b'\n' && byte != b'\r' {
                i += 1;
                continue;
            }
            // A trailing CR may be the first half of CRLF split across chunks.
            if byte == b'\r' && i + 1 == self.buffer.len() {
                break;
            }

            let line = String::from_utf8_lossy(&self.buffer[start..i]).into_owned();
            let terminator_len = if byte == b'\r' && self.buffer[i + 1] == b'\n' { 2 } else { 1 };
            i += terminator_len;
            start = i;

            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }

        // Keep only the unterminated tail.
        let _ = self.buffer.split_to(start);
        messages
    }

    /// Flush at end of stream.
    ///
    /// A held-back trailing `\r` still terminates its line. An unterminated
    /// line and a message without its closing blank line are discarded.
    pub fn finish(&mut self) -> Vec<SseMessage> {
        let mut messages = Vec::new();
        if let Some((b'\r', line)) = self.buffer.split_last() {
            let line = String::from_utf8_lossy(line).into_owned();
            if let Some(message) = self.process_line(&line) {
                messages.push(message);
            }
        }
        self.buffer.clear();
        self.event = None;
        self.data.clear();
        self.has_data = false;
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
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;
        Some(SseMessage {
            event,
            data: std::mem::take(&mut self.data),
            id: self.last_id.clone(),
        })
    }
}
