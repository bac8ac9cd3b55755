//! Append-only output sink
//!
//! [`OutputBuffer`] accumulates the rendered document in memory. Once the
//! configured limit is reached every further byte is dropped and counted, so
//! a runaway trace can never grow without bound.

use tracing::warn;

/// Append-only text buffer with a hard size limit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    buf: String,
    limit: usize,
    missing: usize,
}

impl OutputBuffer {
    /// Create an empty buffer that keeps at most `limit` bytes
    pub fn with_limit(limit: usize) -> Self {
        OutputBuffer {
            buf: String::new(),
            limit,
            missing: 0,
        }
    }

    /// Append a string, truncating at the limit
    pub fn push_str(&mut self, s: &str) {
        if self.missing == 0 && self.buf.len() + s.len() <= self.limit {
            self.buf.push_str(s);
        } else {
            self.overflow(s);
        }
    }

    /// Append a single character
    pub fn push(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.push_str(c.encode_utf8(&mut utf8));
    }

    fn overflow(&mut self, s: &str) {
        if self.missing > 0 {
            self.missing += s.len();
            return;
        }

        // Keep whatever fits without splitting a code point
        let mut cut = self.limit.saturating_sub(self.buf.len()).min(s.len());
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        self.buf.push_str(&s[..cut]);
        self.missing = s.len() - cut;
        warn!(
            limit = self.limit,
            "trace output exceeds the memory limit, truncating"
        );
    }

    /// The text written so far
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Number of bytes kept
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of bytes dropped beyond the limit
    pub fn missing_bytes(&self) -> usize {
        self.missing
    }

    /// Consume the buffer and return the kept text
    pub fn into_string(self) -> String {
        self.buf
    }
}
