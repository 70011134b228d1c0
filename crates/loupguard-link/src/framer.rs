//! Splits the inbound byte stream into text lines.

use bytes::{Buf, BytesMut};

/// Accumulates bytes and yields complete `\n`-terminated lines.
///
/// Trailing `\r`/`\n` are stripped, empty lines are skipped and invalid
/// UTF-8 is replaced rather than rejected.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append `data` and return every line it completes.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|&b| b == b'\n') {
            let raw = self.buf.split_to(idx + 1);
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(|c: char| c == '\r' || c == '\n');
            if !line.is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Drop any partial line.
    pub fn clear(&mut self) {
        self.buf.advance(self.buf.len());
    }
}
