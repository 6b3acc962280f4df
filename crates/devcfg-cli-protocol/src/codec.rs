//! Line accumulation for the interactive console.
//!
//! Telnet clients deliver input in arbitrary chunks, often one byte at a
//! time. [`LineBuffer`] collects printable bytes until a terminator arrives:
//!
//! - Printable ASCII (`0x20..=0x7E`) is appended, up to
//!   [`MAX_LINE_LENGTH`] bytes
//! - CR or LF completes the line; an LF right after a CR is swallowed so a
//!   CRLF pair produces one line
//! - Any other byte (control characters, telnet negotiation) discards the
//!   partial line
//! - A printable byte arriving with the buffer full discards the line and
//!   reports an overflow; the rest of that line is ignored up to its
//!   terminator

use bytes::BytesMut;

/// Maximum command line length.
pub const MAX_LINE_LENGTH: usize = 127;

/// Result of feeding one byte to a [`LineBuffer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Byte consumed; no complete line yet.
    Pending,
    /// A terminator completed a line. The text is trimmed and may be empty.
    Line(String),
    /// The line exceeded [`MAX_LINE_LENGTH`] and was dropped.
    Overflow,
    /// A non-printable byte dropped the partial line.
    Discarded,
}

/// Per-connection accumulator for a partial command line.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: BytesMut,
    last_was_cr: bool,
    overflowed: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        LineBuffer::new()
    }
}

impl LineBuffer {
    /// Create an empty line buffer.
    pub fn new() -> Self {
        LineBuffer {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH),
            last_was_cr: false,
            overflowed: false,
        }
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> LineEvent {
        match byte {
            b'\r' | b'\n' => {
                let swallow = byte == b'\n' && self.last_was_cr;
                self.last_was_cr = byte == b'\r';
                if swallow {
                    return LineEvent::Pending;
                }
                self.overflowed = false;
                let data = self.buffer.split();
                let line = String::from_utf8_lossy(&data).trim().to_string();
                LineEvent::Line(line)
            }
            0x20..=0x7e => {
                self.last_was_cr = false;
                if self.overflowed {
                    return LineEvent::Pending;
                }
                if self.buffer.len() >= MAX_LINE_LENGTH {
                    self.buffer.clear();
                    self.overflowed = true;
                    return LineEvent::Overflow;
                }
                self.buffer.extend_from_slice(&[byte]);
                LineEvent::Pending
            }
            _ => {
                self.last_was_cr = false;
                if self.buffer.is_empty() {
                    LineEvent::Pending
                } else {
                    self.buffer.clear();
                    LineEvent::Discarded
                }
            }
        }
    }

    /// Feed a chunk, returning every non-pending event in order.
    pub fn extend(&mut self, data: &[u8]) -> Vec<LineEvent> {
        data.iter()
            .map(|&b| self.push(b))
            .filter(|e| *e != LineEvent::Pending)
            .collect()
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no partial line is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop any partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.last_was_cr = false;
        self.overflowed = false;
    }

    /// Current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}
