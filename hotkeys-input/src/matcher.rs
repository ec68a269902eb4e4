use std::mem;
use std::time::{Duration, Instant};

use log::trace;

use crate::key::KeyEvent;
use crate::table::{KeyTable, byte_chord, key_table};

/// Default time a complete-but-extendable sequence waits for more bytes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of feeding one byte or expiring the deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The buffer may still grow into a longer sequence.
    Pending,
    /// The buffer is an unambiguous table entry.
    Resolved(KeyEvent),
    /// Nothing in the table matches. Carries either the first buffered
    /// byte read on its own, or a whole well-formed CSI sequence as an
    /// `unknown` key.
    Unmatched(KeyEvent),
}

/// Bytes not yet resolved and the instant they are forced to resolve.
#[derive(Debug, Default)]
struct PendingSequence {
    buffer: Vec<u8>,
    deadline: Option<Instant>,
}

impl PendingSequence {
    fn take(&mut self) -> Vec<u8> {
        self.deadline = None;
        mem::take(&mut self.buffer)
    }
}

/// Incremental escape sequence recognizer.
///
/// Bytes that can not belong to the sequence under construction are never
/// dropped: they are handed back through [`SequenceMatcher::take_replay`]
/// and must be fed again, ahead of any newer input.
pub struct SequenceMatcher {
    table: &'static KeyTable,
    timeout: Duration,
    pending: PendingSequence,
    replay: Vec<u8>,
}

impl Default for SequenceMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl SequenceMatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: key_table(),
            timeout,
            pending: PendingSequence::default(),
            replay: Vec::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Instant at which the pending buffer is force-resolved.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.deadline
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.buffer.is_empty()
    }

    /// Consume one byte received at `now`.
    pub fn feed(&mut self, byte: u8, now: Instant) -> Step {
        self.pending.buffer.push(byte);
        let buffer = &self.pending.buffer;
        let lookup = self.table.lookup(buffer);

        if lookup.prefix || (lookup.exact.is_none() && is_partial_csi(buffer)) {
            self.pending.deadline = Some(now + self.timeout);
            return Step::Pending;
        }

        if let Some(chord) = lookup.exact {
            let raw = self.pending.take();
            return Step::Resolved(KeyEvent::new(chord, raw));
        }

        if is_complete_csi(buffer) {
            let raw = self.pending.take();
            trace!("unknown control sequence {raw:?}");
            return Step::Unmatched(KeyEvent::unknown(raw));
        }

        let raw = self.pending.take();
        self.unmatched_first_byte(raw)
    }

    /// Force-resolve the pending buffer once its deadline has passed.
    ///
    /// Resolves the longest complete entry at the front of the buffer, or
    /// the first byte alone when there is none. Leftover bytes go to the
    /// replay buffer.
    pub fn expire(&mut self, now: Instant) -> Option<Step> {
        let deadline = self.pending.deadline?;
        if now < deadline {
            return None;
        }

        let mut buffer = self.pending.take();
        let longest = (1..=buffer.len()).rev().find_map(|len| {
            self.table.get(&buffer[..len]).map(|chord| (len, chord))
        });

        let Some((len, chord)) = longest else {
            return Some(self.unmatched_first_byte(buffer));
        };

        let rest = buffer.split_off(len);
        self.push_replay(rest);
        Some(Step::Resolved(KeyEvent::new(chord, buffer)))
    }

    /// Bytes that must be fed again before any new input.
    pub fn take_replay(&mut self) -> Vec<u8> {
        mem::take(&mut self.replay)
    }

    /// Discard the pending sequence and any bytes awaiting replay.
    pub fn reset(&mut self) {
        self.pending.take();
        self.replay.clear();
    }

    fn unmatched_first_byte(&mut self, mut buffer: Vec<u8>) -> Step {
        let rest = buffer.split_off(1.min(buffer.len()));
        self.push_replay(rest);

        let event = match buffer.first().copied().and_then(byte_chord) {
            Some(chord) => KeyEvent::new(chord, buffer),
            None => KeyEvent::unknown(buffer),
        };
        Step::Unmatched(event)
    }

    fn push_replay(&mut self, rest: Vec<u8>) {
        if !rest.is_empty() {
            self.replay.splice(0..0, rest);
        }
    }
}

/// `ESC [` followed only by parameter and intermediate bytes.
fn is_partial_csi(buffer: &[u8]) -> bool {
    match buffer {
        [0x1b, b'[', body @ ..] => body.iter().all(|byte| is_csi_body(*byte)),
        _ => false,
    }
}

/// `ESC [ params intermediates final`.
fn is_complete_csi(buffer: &[u8]) -> bool {
    match buffer {
        [0x1b, b'[', body @ .., final_byte] => {
            (0x40..=0x7e).contains(final_byte)
                && body.iter().all(|byte| is_csi_body(*byte))
        },
        _ => false,
    }
}

fn is_csi_body(byte: u8) -> bool {
    (0x20..=0x3f).contains(&byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyChord;

    fn chord(spec: &str) -> KeyChord {
        spec.parse().unwrap_or_else(|err| panic!("{spec}: {err}"))
    }

    fn feed_all(
        matcher: &mut SequenceMatcher,
        bytes: &[u8],
        now: Instant,
    ) -> Vec<Step> {
        bytes.iter().map(|byte| matcher.feed(*byte, now)).collect()
    }

    fn resolved(step: &Step) -> Option<&KeyEvent> {
        match step {
            Step::Resolved(event) => Some(event),
            _ => None,
        }
    }

    #[test]
    fn every_table_sequence_resolves_once() {
        let start = Instant::now();
        for (sequence, expected) in key_table().iter() {
            let mut matcher = SequenceMatcher::default();
            let mut steps = feed_all(&mut matcher, sequence, start);
            if steps.last() == Some(&Step::Pending) {
                steps.pop();
                steps.extend(matcher.expire(start + DEFAULT_TIMEOUT));
            }

            let events: Vec<_> = steps.iter().filter_map(resolved).collect();
            assert_eq!(events.len(), 1, "sequence {sequence:?}: {steps:?}");
            assert_eq!(events[0].chord(), &expected, "sequence {sequence:?}");
            assert_eq!(events[0].raw(), sequence);
            assert!(matcher.take_replay().is_empty());
            assert!(!matcher.is_pending());
        }
    }

    #[test]
    fn lone_escape_waits_for_timeout() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();

        assert_eq!(matcher.feed(0x1b, start), Step::Pending);
        assert_eq!(matcher.deadline(), Some(start + DEFAULT_TIMEOUT));
        assert_eq!(matcher.expire(start + Duration::from_millis(50)), None);

        let step = matcher.expire(start + DEFAULT_TIMEOUT);
        assert_eq!(
            step,
            Some(Step::Resolved(KeyEvent::new(chord("escape"), vec![0x1b])))
        );
        assert!(!matcher.is_pending());
        assert_eq!(matcher.deadline(), None);
    }

    #[test]
    fn escape_prefix_completes_before_timeout() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();

        let steps = feed_all(&mut matcher, b"\x1b[A", start);
        assert_eq!(steps[..2], [Step::Pending, Step::Pending]);
        assert_eq!(
            steps[2],
            Step::Resolved(KeyEvent::new(chord("up"), b"\x1b[A".to_vec()))
        );
    }

    #[test]
    fn control_bytes_resolve_without_waiting() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();
        for byte in 0x01..=0x1a {
            let step = matcher.feed(byte, start);
            assert!(matches!(step, Step::Resolved(_)), "byte {byte:#04x}");
            assert_eq!(matcher.deadline(), None);
        }
    }

    #[test]
    fn each_byte_refreshes_deadline() {
        let start = Instant::now();
        let later = start + Duration::from_millis(80);
        let mut matcher = SequenceMatcher::default();

        matcher.feed(0x1b, start);
        matcher.feed(b'[', later);
        assert_eq!(matcher.deadline(), Some(later + DEFAULT_TIMEOUT));
        assert_eq!(matcher.expire(start + Duration::from_millis(150)), None);
        assert!(matcher.is_pending());
    }

    #[test]
    fn unknown_csi_is_one_unmatched_event() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();

        let steps = feed_all(&mut matcher, b"\x1b[200~", start);
        assert!(steps[..5].iter().all(|step| *step == Step::Pending));
        match &steps[5] {
            Step::Unmatched(event) => {
                assert!(event.is_unknown());
                assert_eq!(event.raw(), b"\x1b[200~");
            },
            other => panic!("unexpected step {other:?}"),
        }
        assert!(matcher.take_replay().is_empty());
    }

    #[test]
    fn dead_end_emits_first_byte_and_replays_rest() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();

        assert_eq!(matcher.feed(0x1b, start), Step::Pending);
        assert_eq!(matcher.feed(b'O', start), Step::Pending);
        let step = matcher.feed(b'z', start);

        assert_eq!(
            step,
            Step::Unmatched(KeyEvent::new(chord("escape"), vec![0x1b]))
        );
        assert_eq!(matcher.take_replay(), b"Oz");
        assert!(!matcher.is_pending());

        let steps = feed_all(&mut matcher, b"Oz", start);
        let chords: Vec<_> =
            steps.iter().filter_map(resolved).map(|e| *e.chord()).collect();
        assert_eq!(chords, [chord("O"), chord("z")]);
    }

    #[test]
    fn timeout_resolves_longest_complete_prefix() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();

        feed_all(&mut matcher, b"\x1b[1;", start);
        let step = matcher.expire(start + DEFAULT_TIMEOUT);

        assert_eq!(
            step,
            Some(Step::Resolved(KeyEvent::new(chord("alt+["), b"\x1b[".to_vec())))
        );
        assert_eq!(matcher.take_replay(), b"1;");
    }

    #[test]
    fn reset_discards_partial_sequence() {
        let start = Instant::now();
        let mut matcher = SequenceMatcher::default();

        feed_all(&mut matcher, b"\x1b[1;5", start);
        matcher.reset();
        assert!(!matcher.is_pending());
        assert_eq!(matcher.expire(start + DEFAULT_TIMEOUT), None);

        let step = matcher.feed(b'x', start);
        assert_eq!(step, Step::Resolved(KeyEvent::new(chord("x"), vec![b'x'])));
    }
}
