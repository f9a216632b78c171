//! Streaming UTF-8 decoding
//!
//! Chunk boundaries are chosen by the transport, so a multi-byte character can
//! arrive split across two reads. [`StreamDecoder`] holds the incomplete tail
//! of one chunk and completes it with the head of the next.

use std::char::REPLACEMENT_CHARACTER;

const BOM: char = '\u{FEFF}';

#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Incomplete trailing sequence, never longer than 3 bytes.
    pending: Vec<u8>,
    started: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, returning all text that is complete so far.
    ///
    /// Invalid sequences become U+FFFD. A byte order mark at the very start
    /// of the stream is dropped.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Truncated sequence: wait for the next chunk.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        if !self.started && !out.is_empty() {
            self.started = true;
            if out.starts_with(BOM) {
                out.replace_range(..BOM.len_utf8(), "");
            }
        }
        out
    }

    /// Flush at end of stream. A dangling partial sequence becomes one U+FFFD.
    pub fn finish(&mut self) -> String {
        let mut out = String::new();
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(REPLACEMENT_CHARACTER);
        }
        self.started = false;
        out
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
