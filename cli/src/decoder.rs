//! Streaming UTF-8 decoding for relay responses.
//!
//! A chunk boundary may fall inside a multi-byte character; the incomplete
//! tail is carried over and completed by the next chunk. Invalid sequences
//! decode to U+FFFD instead of failing the stream.

use std::char::REPLACEMENT_CHARACTER;

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    residue: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk`, holding back a trailing partial character.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.residue);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let (valid, tail) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            self.residue = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Ends the stream; a dangling partial character becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.residue.is_empty() {
            String::new()
        } else {
            self.residue.clear();
            REPLACEMENT_CHARACTER.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"The"), "The");
        assert_eq!(decoder.decode(b" dataset"), " dataset");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_character_split_across_chunks() {
        // "°" is C2 B0
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"28.5\xC2"), "28.5");
        assert_eq!(decoder.decode(b"\xB0C"), "°C");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_four_byte_character_split_byte_by_byte() {
        let wave = "🌊".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        for byte in wave {
            text.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(text, "🌊");
    }

    #[test]
    fn test_every_split_point_reassembles() {
        let source = "Salinité 35‰ près de l’Inde 🌊";
        let bytes = source.as_bytes();
        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut text = decoder.decode(&bytes[..split]);
            text.push_str(&decoder.decode(&bytes[split..]));
            text.push_str(&decoder.finish());
            assert_eq!(text, source, "split at {}", split);
        }
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_dangling_partial_character_on_finish() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"ok\xE2\x82"), "ok");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }
}
