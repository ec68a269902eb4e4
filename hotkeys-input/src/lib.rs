//! Keyboard input recognition for terminals in raw mode.
//!
//! Turns the byte stream a VT/xterm compatible terminal sends for key
//! presses into [`KeyEvent`]s. No I/O happens here: callers feed bytes with
//! the instant they arrived and drive the ambiguity timeout themselves.

mod actor;
mod error;
mod key;
mod matcher;
mod parser;
mod table;
mod utf8;

pub use actor::{Actor, Resolution};
pub use error::KeySpecError;
pub use key::{Key, KeyChord, KeyEvent, MAX_FUNCTION_KEY, Modifiers, NamedKey};
pub use matcher::{DEFAULT_TIMEOUT, SequenceMatcher, Step};
pub use parser::InputParser;
pub use table::{KeyTable, Lookup, key_table};
pub use utf8::{Utf8Decoder, Utf8Step};
