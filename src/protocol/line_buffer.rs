//! Line buffer for accumulating partial reads.
//!
//! Messages travel one per line, terminated by `\n`. JSON encoding never
//! emits a raw newline inside a document, so the terminator is unambiguous.
//! Uses `bytes::BytesMut` so complete lines are split off without copying.
//!
//! # Example
//!
//! ```
//! use objwire::protocol::LineBuffer;
//!
//! let mut buffer = LineBuffer::new();
//!
//! assert!(buffer.push(b"[\"ret").unwrap().is_empty());
//! let lines = buffer.push(b"urn\",1]\n").unwrap();
//! assert_eq!(&lines[0][..], b"[\"return\",1]");
//! ```

use bytes::{Bytes, BytesMut};

use crate::error::{BridgeError, Result};

/// Default maximum line length (16 MiB).
pub const DEFAULT_MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Buffer for accumulating incoming bytes and extracting complete lines.
pub struct LineBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Bytes already scanned for a terminator.
    scanned: usize,
    /// Maximum allowed line length, terminator excluded.
    max_line_length: usize,
}

impl LineBuffer {
    /// Create a new line buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_LINE_LENGTH)
    }

    /// Create a new line buffer with a custom maximum line length.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            scanned: 0,
            max_line_length,
        }
    }

    /// Push data into the buffer and extract all complete lines.
    ///
    /// Terminators are stripped, as is a trailing `\r`. Blank lines are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `Protocol` if a line exceeds the maximum length.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(line) = self.try_extract_one()? {
            if !line.is_empty() {
                lines.push(line);
            }
        }

        Ok(lines)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        let found = self.buffer[self.scanned..].iter().position(|&b| b == b'\n');

        let Some(offset) = found else {
            self.scanned = self.buffer.len();
            if self.scanned > self.max_line_length {
                return Err(BridgeError::Protocol(format!(
                    "Line length exceeds maximum {}",
                    self.max_line_length
                )));
            }
            return Ok(None);
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_line_length {
            return Err(BridgeError::Protocol(format!(
                "Line length {} exceeds maximum {}",
                end, self.max_line_length
            )));
        }

        let mut line = self.buffer.split_to(end + 1);
        line.truncate(end);
        if line.last() == Some(&b'\r') {
            line.truncate(end - 1);
        }

        Ok(Some(line.freeze()))
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
