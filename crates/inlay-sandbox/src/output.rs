//! Per-execution output capture.

use std::fmt;
use std::io;

/// Exclusively-owned buffer collecting everything a target writes.
///
/// One sink belongs to one execution; it is never shared between requests.
#[derive(Debug, Default)]
pub struct OutputSink {
    buf: Vec<u8>,
}

impl OutputSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append text.
    pub fn push_str(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
    }

    /// Number of captured bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the sink, decoding invalid UTF-8 lossily.
    pub fn into_string(self) -> String {
        match String::from_utf8(self.buf) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

impl io::Write for OutputSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Write for OutputSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}
