//! Incremental line framer for the device's text serial mode.
//!
//! The link delivers newline-terminated records but the serial driver hands
//! us arbitrary chunks. This framer can be fed any split of the byte stream
//! and yields whole lines when available, with a size cap and simple
//! resynchronization on runaway input.
use bytes::{Buf, BytesMut};

/// Maximum accumulated bytes before the buffer is considered garbage and
/// dropped (device reset mid-line, binary noise on the link).
const MAX_LINE_BYTES: usize = 8 * 1024;

pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Attempt to extract the next complete line, without its terminator.
    /// Returns None when no full line is buffered. Lossy UTF-8 decode; a
    /// trailing `\r` is stripped.
    pub fn next_line(&mut self) -> Option<String> {
        match self.buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = self.buf.split_to(pos);
                self.buf.advance(1); // discard the newline
                let mut text = String::from_utf8_lossy(&line).into_owned();
                if text.ends_with('\r') {
                    text.pop();
                }
                Some(text)
            }
            None => {
                if self.buf.len() > MAX_LINE_BYTES {
                    self.buf.clear();
                }
                None
            }
        }
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
