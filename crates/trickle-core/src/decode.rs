//! Incremental UTF-8 decoding
//!
//! Chunk boundaries fall wherever the transport puts them, so a multi-byte
//! character may arrive split across reads. The decoder holds the
//! incomplete tail back until the rest of the character shows up.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

const REPLACEMENT: char = '\u{FFFD}';

/// How invalid byte sequences are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Substitute U+FFFD for each invalid sequence
    #[default]
    Lossy,
    /// Fail the stream on the first invalid sequence
    Strict,
}

/// Streaming UTF-8 decoder
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    mode: DecodeMode,
    /// Bytes of an incomplete trailing character
    pending: Vec<u8>,
    /// Body bytes fully consumed so far (for error offsets)
    consumed: usize,
}

impl Utf8Decoder {
    pub fn new(mode: DecodeMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Whether an incomplete character is being held back
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Decode the next chunk, returning only complete characters
    pub fn decode(&mut self, chunk: &[u8]) -> Result<String, StreamError> {
        let joined;
        let mut rest: &[u8] = if self.pending.is_empty() {
            chunk
        } else {
            let mut bytes = std::mem::take(&mut self.pending);
            bytes.extend_from_slice(chunk);
            joined = bytes;
            &joined
        };

        let mut out = String::with_capacity(rest.len());
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.consumed += rest.len();
                    return Ok(out);
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // Validated by from_utf8 above
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    self.consumed += valid.len();

                    let Some(invalid_len) = e.error_len() else {
                        // Incomplete character at the end; wait for more bytes
                        self.pending.extend_from_slice(after);
                        return Ok(out);
                    };

                    if self.mode == DecodeMode::Strict {
                        return Err(StreamError::Decode {
                            offset: self.consumed,
                        });
                    }
                    out.push(REPLACEMENT);
                    self.consumed += invalid_len;
                    rest = &after[invalid_len..];
                }
            }
        }
    }

    /// Flush at end of stream
    ///
    /// A dangling incomplete character becomes a single U+FFFD in lossy mode
    /// and an error in strict mode.
    pub fn finish(&mut self) -> Result<String, StreamError> {
        if self.pending.is_empty() {
            return Ok(String::new());
        }
        let dangling = std::mem::take(&mut self.pending);
        match self.mode {
            DecodeMode::Strict => Err(StreamError::Decode {
                offset: self.consumed,
            }),
            DecodeMode::Lossy => {
                self.consumed += dangling.len();
                Ok(REPLACEMENT.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8Decoder::new(DecodeMode::Lossy);
        assert_eq!(decoder.decode(b"Hello").unwrap(), "Hello");
        assert_eq!(decoder.decode(b", world").unwrap(), ", world");
        assert!(!decoder.has_pending());
        assert_eq!(decoder.finish().unwrap(), "");
    }

    #[test]
    fn test_two_byte_char_split_across_chunks() {
        // "é" is C3 A9
        let mut decoder = Utf8Decoder::new(DecodeMode::Strict);
        assert_eq!(decoder.decode(b"caf\xC3").unwrap(), "caf");
        assert!(decoder.has_pending());
        assert_eq!(decoder.decode(b"\xA9!").unwrap(), "é!");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_four_byte_char_split_three_ways() {
        // "🦀" is F0 9F A6 80
        let mut decoder = Utf8Decoder::new(DecodeMode::Strict);
        assert_eq!(decoder.decode(b"\xF0").unwrap(), "");
        assert_eq!(decoder.decode(b"\x9F\xA6").unwrap(), "");
        assert_eq!(decoder.decode(b"\x80 ok").unwrap(), "🦀 ok");
    }

    #[test]
    fn test_lossy_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new(DecodeMode::Lossy);
        assert_eq!(decoder.decode(b"a\xFFb\xC0c").unwrap(), "a\u{FFFD}b\u{FFFD}c");
    }

    #[test]
    fn test_strict_reports_absolute_offset() {
        let mut decoder = Utf8Decoder::new(DecodeMode::Strict);
        assert_eq!(decoder.decode(b"abcd").unwrap(), "abcd");
        match decoder.decode(b"ef\xFF") {
            Err(StreamError::Decode { offset }) => assert_eq!(offset, 6),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_finish_with_dangling_bytes() {
        let mut lossy = Utf8Decoder::new(DecodeMode::Lossy);
        assert_eq!(lossy.decode(b"x\xE2\x82").unwrap(), "x");
        assert_eq!(lossy.finish().unwrap(), "\u{FFFD}");
        assert!(!lossy.has_pending());

        let mut strict = Utf8Decoder::new(DecodeMode::Strict);
        assert_eq!(strict.decode(b"x\xE2\x82").unwrap(), "x");
        assert!(matches!(
            strict.finish(),
            Err(StreamError::Decode { offset: 1 })
        ));
    }

    #[test]
    fn test_decode_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: DecodeMode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"strict\"").unwrap();
        assert_eq!(parsed.mode, DecodeMode::Strict);
    }
}
