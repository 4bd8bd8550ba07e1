//! Line reassembly over a chunked byte stream
//!
//! Chunks arrive with no relation to record boundaries: one chunk may hold
//! several records, or a record may be spread over many single-byte chunks.
//! [`LineBuffer`] accumulates bytes and releases complete lines as soon as
//! their terminator has been seen, so a record is never held back waiting
//! for more data.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tracing::trace;

/// Reassembly buffer for newline-delimited records
///
/// Lines end with LF, optionally preceded by CR. Lines are trimmed of
/// surrounding ASCII whitespace and blank lines (keepalives) are dropped.
/// Between calls the buffer only ever holds the fragment after the last
/// terminator seen.
#[derive(Debug, Default)]
pub struct LineBuffer {
    /// Bytes after the last terminator
    partial: BytesMut,
    /// Complete lines not yet handed out
    ready: VecDeque<Bytes>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and split off any lines it completes
    pub fn push(&mut self, chunk: &[u8]) {
        let terminator = chunk.iter().rposition(|&b| b == b'\n');
        self.partial.extend_from_slice(chunk);

        if let Some(pos) = terminator {
            let complete_len = self.partial.len() - chunk.len() + pos + 1;
            let complete = self.partial.split_to(complete_len).freeze();
            for line in complete.split(|&b| b == b'\n') {
                let line = line.trim_ascii();
                if line.is_empty() {
                    trace!("Skipping keepalive");
                    continue;
                }
                self.ready.push_back(complete.slice_ref(line));
            }
        }

        // Whitespace on its own never becomes a record
        if !self.partial.is_empty() && self.partial.iter().all(u8::is_ascii_whitespace) {
            self.partial.clear();
        }
    }

    /// Next complete line, if any
    pub fn pop_line(&mut self) -> Option<Bytes> {
        self.ready.pop_front()
    }

    /// Whether a complete line is waiting
    pub fn has_line(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Length of the unterminated fragment
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    /// True when nothing at all is buffered
    pub fn is_empty(&self) -> bool {
        self.partial.is_empty() && self.ready.is_empty()
    }

    /// Drop everything buffered
    pub fn clear(&mut self) {
        self.partial.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STREAM: &[u8] = b"{\"text\":\"one\"}\r\n\r\n\r\n{\"text\":\"two\"}\r\n  \r\n[1,2,3]\r\n";

    fn drain(buffer: &mut LineBuffer) -> Vec<String> {
        std::iter::from_fn(|| buffer.pop_line())
            .map(|line| String::from_utf8(line.to_vec()).unwrap())
            .collect()
    }

    fn feed(chunks: &[&[u8]]) -> Vec<String> {
        let mut buffer = LineBuffer::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            buffer.push(chunk);
            lines.extend(drain(&mut buffer));
        }
        lines
    }

    fn expected() -> Vec<String> {
        vec![
            "{\"text\":\"one\"}".to_string(),
            "{\"text\":\"two\"}".to_string(),
            "[1,2,3]".to_string(),
        ]
    }

    #[test]
    fn test_whole_stream_in_one_chunk() {
        assert_eq!(feed(&[STREAM]), expected());
    }

    #[test]
    fn test_every_two_way_split() {
        for i in 0..=STREAM.len() {
            let (a, b) = STREAM.split_at(i);
            assert_eq!(feed(&[a, b]), expected(), "split at {}", i);
        }
    }

    #[test]
    fn test_every_three_way_split() {
        for i in 0..=STREAM.len() {
            for j in i..=STREAM.len() {
                let chunks = [&STREAM[..i], &STREAM[i..j], &STREAM[j..]];
                assert_eq!(feed(&chunks), expected(), "split at {} and {}", i, j);
            }
        }
    }

    #[test]
    fn test_single_byte_chunks() {
        let chunks: Vec<&[u8]> = STREAM.chunks(1).collect();
        assert_eq!(feed(&chunks), expected());
    }

    #[test]
    fn test_line_released_as_soon_as_terminated() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"{\"text\":\"a\"}\r");
        assert!(!buffer.has_line());
        buffer.push(b"\n{\"te");
        assert_eq!(drain(&mut buffer), vec!["{\"text\":\"a\"}"]);
        assert_eq!(buffer.pending(), 4);
    }

    #[test]
    fn test_keepalives_are_discarded() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"\r\n");
        buffer.push(b"\r\n   ");
        buffer.push(b"\r");
        assert!(buffer.is_empty());
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_no_terminator_left_at_rest() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"a\r\nb\r\nc");
        assert_eq!(buffer.pending(), 1);
        assert_eq!(drain(&mut buffer), vec!["a", "b"]);
    }

    #[test]
    fn test_bare_lf_terminator() {
        assert_eq!(feed(&[b"x\ny\n"]), vec!["x", "y"]);
    }

    #[test]
    fn test_clear() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"a\r\npartial");
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.pop_line(), None);
    }
}
