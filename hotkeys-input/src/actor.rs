//! Consumer interface of the [`InputParser`](crate::InputParser).
//!
//! The parser turns raw terminal bytes into key events and hands each one to
//! an [`Actor`] in arrival order, synchronously, while it walks the input.

use crate::key::KeyEvent;

/// A key event together with how it was recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A table sequence or a printable character.
    Resolved(KeyEvent),
    /// Bytes that matched nothing: an unknown sequence, a stray byte
    /// split from a dead-end sequence, or malformed UTF-8.
    Unmatched(KeyEvent),
}

impl Resolution {
    pub fn event(&self) -> &KeyEvent {
        match self {
            Resolution::Resolved(event) | Resolution::Unmatched(event) => event,
        }
    }

    pub fn into_event(self) -> KeyEvent {
        match self {
            Resolution::Resolved(event) | Resolution::Unmatched(event) => event,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Receiver of parsed key events.
pub trait Actor {
    fn resolve(&mut self, resolution: Resolution);
}

impl<F> Actor for F
where
    F: FnMut(Resolution),
{
    fn resolve(&mut self, resolution: Resolution) {
        self(resolution)
    }
}
