use std::mem;

use utf8parse::Receiver;

/// Result of advancing the decoder by one byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utf8Step {
    /// More continuation bytes are needed.
    Pending,
    /// A complete codepoint and the bytes that encoded it.
    Char(char, Vec<u8>),
    /// The bytes do not form valid UTF-8.
    Invalid(Vec<u8>),
}

enum Outcome {
    Char(char),
    Invalid,
}

#[derive(Default)]
struct Decoder {
    inner: Option<Outcome>,
}

impl Receiver for Decoder {
    fn codepoint(&mut self, c: char) {
        self.inner.replace(Outcome::Char(c));
    }

    fn invalid_sequence(&mut self) {
        self.inner.replace(Outcome::Invalid);
    }
}

/// Reassembles multi-byte codepoints that arrive split across reads.
#[derive(Default)]
pub struct Utf8Decoder {
    inner: utf8parse::Parser,
    raw: Vec<u8>,
}

impl Utf8Decoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a codepoint has been started but not completed.
    pub fn in_progress(&self) -> bool {
        !self.raw.is_empty()
    }

    pub fn advance(&mut self, byte: u8) -> Utf8Step {
        let mut decoder = Decoder::default();
        self.inner.advance(&mut decoder, byte);
        self.raw.push(byte);

        match decoder.inner {
            None => Utf8Step::Pending,
            Some(Outcome::Char(c)) => Utf8Step::Char(c, mem::take(&mut self.raw)),
            Some(Outcome::Invalid) => Utf8Step::Invalid(mem::take(&mut self.raw)),
        }
    }

    /// Drop the partial codepoint, returning the bytes consumed so far.
    pub fn abandon(&mut self) -> Vec<u8> {
        self.inner = utf8parse::Parser::default();
        mem::take(&mut self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_split_codepoints() {
        let mut decoder = Utf8Decoder::new();

        assert_eq!(decoder.advance(0xc3), Utf8Step::Pending);
        assert!(decoder.in_progress());
        assert_eq!(decoder.advance(0xa9), Utf8Step::Char('é', vec![0xc3, 0xa9]));
        assert!(!decoder.in_progress());

        let euro = "€".as_bytes();
        assert_eq!(decoder.advance(euro[0]), Utf8Step::Pending);
        assert_eq!(decoder.advance(euro[1]), Utf8Step::Pending);
        assert_eq!(decoder.advance(euro[2]), Utf8Step::Char('€', euro.to_vec()));
    }

    #[test]
    fn ascii_passes_through() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.advance(b'q'), Utf8Step::Char('q', vec![b'q']));
    }

    #[test]
    fn invalid_bytes_are_reported() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.advance(0xff), Utf8Step::Invalid(vec![0xff]));
        assert!(!decoder.in_progress());
    }

    #[test]
    fn abandon_returns_partial_bytes() {
        let mut decoder = Utf8Decoder::new();
        decoder.advance(0xe2);
        decoder.advance(0x82);

        assert_eq!(decoder.abandon(), vec![0xe2, 0x82]);
        assert!(!decoder.in_progress());
        assert_eq!(decoder.advance(b'a'), Utf8Step::Char('a', vec![b'a']));
    }
}
