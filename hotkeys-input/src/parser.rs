use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::actor::{Actor, Resolution};
use crate::key::{Key, KeyChord, KeyEvent};
use crate::matcher::{SequenceMatcher, Step};
use crate::utf8::{Utf8Decoder, Utf8Step};

/// Byte stream to key event parser.
///
/// Bytes go to the UTF-8 decoder while no escape sequence is pending and the
/// byte is non-ASCII (or continues a codepoint), and to the sequence matcher
/// otherwise. Escape sequences are ASCII only, so a non-ASCII byte arriving
/// mid-sequence ends the sequence and is decoded afterwards.
#[derive(Default)]
pub struct InputParser {
    matcher: SequenceMatcher,
    utf8: Utf8Decoder,
    backlog: VecDeque<u8>,
}

impl InputParser {
    pub fn new(timeout: Duration) -> Self {
        Self {
            matcher: SequenceMatcher::new(timeout),
            utf8: Utf8Decoder::new(),
            backlog: VecDeque::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.matcher.timeout()
    }

    /// Feed a chunk of bytes read at `now`.
    pub fn advance<A>(&mut self, bytes: &[u8], now: Instant, actor: &mut A)
    where
        A: Actor + ?Sized,
    {
        self.backlog.extend(bytes);
        self.drain(now, actor);
    }

    /// Resolve a pending sequence whose deadline has passed.
    pub fn tick<A>(&mut self, now: Instant, actor: &mut A)
    where
        A: Actor + ?Sized,
    {
        if let Some(step) = self.matcher.expire(now) {
            self.emit(step, actor);
            self.drain(now, actor);
        }
    }

    /// When [`InputParser::tick`] has work to do next.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.matcher.deadline()
    }

    pub fn is_pending(&self) -> bool {
        self.matcher.is_pending()
            || self.utf8.in_progress()
            || !self.backlog.is_empty()
    }

    /// Discard every partially received sequence or codepoint.
    pub fn reset(&mut self) {
        self.matcher.reset();
        self.utf8.abandon();
        self.backlog.clear();
    }

    fn drain<A>(&mut self, now: Instant, actor: &mut A)
    where
        A: Actor + ?Sized,
    {
        while let Some(byte) = self.backlog.pop_front() {
            self.process(byte, now, actor);
        }
    }

    fn process<A>(&mut self, byte: u8, now: Instant, actor: &mut A)
    where
        A: Actor + ?Sized,
    {
        if !self.matcher.is_pending() {
            if byte.is_ascii() && self.utf8.in_progress() {
                let raw = self.utf8.abandon();
                actor.resolve(Resolution::Unmatched(KeyEvent::unknown(raw)));
            } else if !byte.is_ascii() || self.utf8.in_progress() {
                self.decode(byte, actor);
                return;
            }
        }

        let step = self.matcher.feed(byte, now);
        self.emit(step, actor);
    }

    fn decode<A>(&mut self, byte: u8, actor: &mut A)
    where
        A: Actor + ?Sized,
    {
        match self.utf8.advance(byte) {
            Utf8Step::Pending => {},
            Utf8Step::Char(c, raw) if c.is_control() => {
                actor.resolve(Resolution::Unmatched(KeyEvent::unknown(raw)));
            },
            Utf8Step::Char(c, raw) => {
                let chord = KeyChord::plain(Key::Char(c));
                actor.resolve(Resolution::Resolved(KeyEvent::new(chord, raw)));
            },
            Utf8Step::Invalid(raw) => {
                actor.resolve(Resolution::Unmatched(KeyEvent::unknown(raw)));
            },
        }
    }

    fn emit<A>(&mut self, step: Step, actor: &mut A)
    where
        A: Actor + ?Sized,
    {
        for byte in self.matcher.take_replay().into_iter().rev() {
            self.backlog.push_front(byte);
        }

        match step {
            Step::Pending => {},
            Step::Resolved(event) => actor.resolve(Resolution::Resolved(event)),
            Step::Unmatched(event) => {
                actor.resolve(Resolution::Unmatched(event))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DEFAULT_TIMEOUT;

    #[derive(Default)]
    struct Recorder {
        resolutions: Vec<Resolution>,
    }

    impl Actor for Recorder {
        fn resolve(&mut self, resolution: Resolution) {
            self.resolutions.push(resolution);
        }
    }

    impl Recorder {
        fn names(&self) -> Vec<String> {
            self.resolutions
                .iter()
                .map(|resolution| resolution.event().to_string())
                .collect()
        }
    }

    #[test]
    fn keeps_arrival_order() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(b"ab\x1b[Ac\x1b[1;5B\x03", now, &mut recorder);

        assert_eq!(recorder.names(), ["a", "b", "up", "c", "ctrl+down", "ctrl+c"]);
        assert!(recorder.resolutions.iter().all(Resolution::is_matched));
        assert!(!parser.is_pending());
    }

    #[test]
    fn reassembles_codepoints_across_reads() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(b"a\xe2\x82", now, &mut recorder);
        assert_eq!(recorder.names(), ["a"]);
        assert!(parser.is_pending());

        parser.advance(b"\xacb", now, &mut recorder);
        assert_eq!(recorder.names(), ["a", "€", "b"]);
        assert_eq!(recorder.resolutions[1].event().raw(), "€".as_bytes());
    }

    #[test]
    fn escape_sequences_split_across_reads() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(b"\x1b[2", now, &mut recorder);
        parser.advance(b"0~", now, &mut recorder);

        assert_eq!(recorder.names(), ["f9"]);
        assert_eq!(recorder.resolutions[0].event().raw(), b"\x1b[20~");
    }

    #[test]
    fn tick_resolves_lone_escape() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(b"x\x1b", now, &mut recorder);
        assert_eq!(recorder.names(), ["x"]);
        assert_eq!(parser.next_deadline(), Some(now + DEFAULT_TIMEOUT));

        parser.tick(now + Duration::from_millis(10), &mut recorder);
        assert_eq!(recorder.names(), ["x"]);

        parser.tick(now + DEFAULT_TIMEOUT, &mut recorder);
        assert_eq!(recorder.names(), ["x", "escape"]);
        assert_eq!(parser.next_deadline(), None);
    }

    #[test]
    fn tick_replays_leftover_bytes() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(b"\x1b[1;", now, &mut recorder);
        parser.tick(now + DEFAULT_TIMEOUT, &mut recorder);

        assert_eq!(recorder.names(), ["alt+[", "1", ";"]);
    }

    #[test]
    fn ascii_interrupts_partial_codepoint() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(&[0xc3, b'a'], now, &mut recorder);

        assert_eq!(recorder.resolutions.len(), 2);
        assert!(!recorder.resolutions[0].is_matched());
        assert_eq!(recorder.resolutions[0].event().raw(), [0xc3]);
        assert!(recorder.resolutions[0].event().is_unknown());
        assert_eq!(recorder.names()[1], "a");
    }

    #[test]
    fn non_ascii_ends_pending_escape() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance("\x1bé".as_bytes(), now, &mut recorder);

        assert_eq!(recorder.names(), ["escape", "é"]);
        assert!(!recorder.resolutions[0].is_matched());
        assert!(recorder.resolutions[1].is_matched());
    }

    #[test]
    fn c1_controls_are_unknown() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance("\u{85}".as_bytes(), now, &mut recorder);

        assert_eq!(recorder.resolutions.len(), 1);
        assert!(recorder.resolutions[0].event().is_unknown());
    }

    #[test]
    fn reset_drops_partial_input() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut recorder = Recorder::default();

        parser.advance(b"\x1b[1;5", now, &mut recorder);
        parser.reset();
        assert!(!parser.is_pending());

        parser.advance(b"A", now, &mut recorder);
        parser.tick(now + DEFAULT_TIMEOUT, &mut recorder);
        assert_eq!(recorder.names(), ["A"]);
    }

    #[test]
    fn closures_are_actors() {
        let now = Instant::now();
        let mut parser = InputParser::default();
        let mut seen = Vec::new();

        parser.advance(b"\x1bOP", now, &mut |resolution: Resolution| {
            seen.push(resolution.into_event());
        });

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].to_string(), "f1");
    }
}
