//! Line-oriented framing for the push channel.
//!
//! The server writes records as groups of `field:value` lines terminated by a
//! blank line:
//!
//! ```text
//! event: notification
//! data: {"title":"hello"}
//! id: 42
//!
//! ```
//!
//! A record is emitted only when it carries both a type and a payload.
//! Records with a type but no payload are dropped. Unknown event types are
//! passed through untouched; deciding what to do with them is up to the
//! consumer.
//!
//! Two entry points exist:
//!
//! - [`parse_chunk`] handles one decoded chunk in isolation. Anything left
//!   pending at the end of the chunk is discarded.
//! - [`FrameParser`] keeps a carry-over buffer, so a record (or a line, or a
//!   multi-byte character) split across two network reads still parses.

use serde::{Deserialize, Serialize};

const LF: u8 = b'\n';
const CR: u8 = b'\r';

/// Upper bound on a single unterminated line held in the carry-over buffer.
const MAX_LINE_BYTES: usize = 1024 * 1024;

// ── EventRecord ──────────────────────────────────────────────────────

/// One parsed unit of the wire protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Value of the `event:` line.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Value of the `data:` line.
    pub data: String,

    /// Value of the `id:` line, empty when the record carried none.
    #[serde(default)]
    pub id: String,
}

impl EventRecord {
    pub fn new(
        event_type: impl Into<String>,
        data: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
            id: id.into(),
        }
    }
}

// ── Pending fields ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PendingRecord {
    event_type: Option<String>,
    data: Option<String>,
    id: Option<String>,
}

impl PendingRecord {
    /// Apply one line (without its terminator). Returns a record when the
    /// line closes a complete one.
    fn apply(&mut self, line: &str) -> Option<EventRecord> {
        if line.trim().is_empty() {
            return self.take();
        }

        if let Some(value) = line.strip_prefix("event:") {
            self.event_type = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("id:") {
            self.id = Some(value.trim().to_owned());
        }
        // Comments (":keep-alive") and unknown fields are ignored.

        None
    }

    /// Close the current record, resetting the pending fields either way.
    fn take(&mut self) -> Option<EventRecord> {
        let pending = std::mem::take(self);
        match (pending.event_type, pending.data) {
            (Some(event_type), Some(data)) if !event_type.is_empty() && !data.is_empty() => {
                Some(EventRecord {
                    event_type,
                    data,
                    id: pending.id.unwrap_or_default(),
                })
            }
            _ => None,
        }
    }

    fn is_empty(&self) -> bool {
        self.event_type.is_none() && self.data.is_none() && self.id.is_none()
    }
}

// ── Stateless per-chunk parsing ──────────────────────────────────────

/// Parse a single decoded chunk. Records left incomplete at the end of the
/// chunk are discarded.
pub fn parse_chunk(text: &str) -> Vec<EventRecord> {
    let mut pending = PendingRecord::default();
    text.lines().filter_map(|line| pending.apply(line)).collect()
}

// ── Cross-chunk parser ───────────────────────────────────────────────

/// Incremental parser that carries incomplete lines and pending fields
/// across chunk boundaries.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    pending: PendingRecord,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from the stream, returning every record they complete,
    /// in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<EventRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;

        while let Some((line_end, next)) = find_eol(&self.buffer[start..]) {
            let line = String::from_utf8_lossy(&self.buffer[start..start + line_end]);
            if let Some(record) = self.pending.apply(&line) {
                records.push(record);
            }
            start += next;
        }

        self.buffer.drain(..start);

        if self.buffer.len() > MAX_LINE_BYTES {
            tracing::warn!(
                buffered = self.buffer.len(),
                "Discarding oversized unterminated line"
            );
            self.buffer.clear();
        }

        records
    }

    /// Drop any partial line and pending fields.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pending = PendingRecord::default();
    }

    /// `true` when nothing is carried over to the next chunk.
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.pending.is_empty()
    }
}

/// Find the next line terminator in `bytes`.
///
/// Returns `(line_end, remainder_start)`. A trailing lone CR yields `None`
/// because the LF of a CRLF pair may arrive in the next chunk.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = bytes.iter().position(|b| *b == LF || *b == CR)?;

    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }

    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}

// ── Tests ────────────────────────────────────────────────────────────
