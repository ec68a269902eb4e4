//! Immutable byte-sequence table for ANSI/VT keyboard input.
//!
//! The table is generated once and stored sorted, so the matcher answers
//! both "is this buffer a complete key" and "can this buffer still grow
//! into a key" with a single ordered lookup.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::LazyLock;

use crate::key::{Key, KeyChord, MAX_FUNCTION_KEY, Modifiers, NamedKey};

pub(crate) const ESC: u8 = 0x1b;

/// xterm modifier parameters from `shift` (2) up to `ctrl+alt+shift` (8).
const MODIFIER_PARAMS: std::ops::RangeInclusive<u8> = 2..=8;

/// `CSI <final>` / `SS3 <final>` cursor and editing keys.
const CURSOR_FINALS: [(u8, NamedKey); 6] = [
    (b'A', NamedKey::Up),
    (b'B', NamedKey::Down),
    (b'C', NamedKey::Right),
    (b'D', NamedKey::Left),
    (b'H', NamedKey::Home),
    (b'F', NamedKey::End),
];

/// `SS3 <final>` encodings of F1-F4.
const SS3_FUNCTION_FINALS: [(u8, u8); 4] =
    [(b'P', 1), (b'Q', 2), (b'R', 3), (b'S', 4)];

/// `CSI <code> ~` keys.
const TILDE_CODES: [(u8, Key); 34] = [
    (1, Key::Named(NamedKey::Home)),
    (2, Key::Named(NamedKey::Insert)),
    (3, Key::Named(NamedKey::Delete)),
    (4, Key::Named(NamedKey::End)),
    (5, Key::Named(NamedKey::PageUp)),
    (6, Key::Named(NamedKey::PageDown)),
    (7, Key::Named(NamedKey::Home)),
    (8, Key::Named(NamedKey::End)),
    (11, Key::Function(1)),
    (12, Key::Function(2)),
    (13, Key::Function(3)),
    (14, Key::Function(4)),
    (15, Key::Function(5)),
    (17, Key::Function(6)),
    (18, Key::Function(7)),
    (19, Key::Function(8)),
    (20, Key::Function(9)),
    (21, Key::Function(10)),
    (23, Key::Function(11)),
    (24, Key::Function(12)),
    (25, Key::Function(13)),
    (26, Key::Function(14)),
    (28, Key::Function(15)),
    (29, Key::Function(16)),
    (31, Key::Function(17)),
    (32, Key::Function(18)),
    (33, Key::Function(19)),
    (34, Key::Function(20)),
    (35, Key::Function(21)),
    (36, Key::Function(22)),
    (37, Key::Function(23)),
    (38, Key::Function(24)),
    // rxvt reports shifted F11/F12 past the vt220 range.
    (39, Key::Function(23)),
    (40, Key::Function(24)),
];

/// Linux console `CSI [ <final>` encodings of F1-F5.
const LINUX_FUNCTION_FINALS: [(u8, u8); 5] =
    [(b'A', 1), (b'B', 2), (b'C', 3), (b'D', 4), (b'E', 5)];

/// Named keys that CSI-u and modifyOtherKeys report by codepoint.
const CODEPOINT_KEYS: [(u32, NamedKey); 5] = [
    (9, NamedKey::Tab),
    (13, NamedKey::Enter),
    (27, NamedKey::Escape),
    (32, NamedKey::Space),
    (127, NamedKey::Backspace),
];

static TABLE: LazyLock<KeyTable> = LazyLock::new(KeyTable::build);

/// Shared, lazily built key table.
pub fn key_table() -> &'static KeyTable {
    &TABLE
}

/// Classification of a byte buffer against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// Chord for an exact match of the whole buffer.
    pub exact: Option<KeyChord>,
    /// Whether some longer sequence starts with the buffer.
    pub prefix: bool,
}

pub struct KeyTable {
    sequences: BTreeMap<Vec<u8>, KeyChord>,
}

impl KeyTable {
    pub fn get(&self, bytes: &[u8]) -> Option<KeyChord> {
        self.sequences.get(bytes).copied()
    }

    /// Whether `bytes` is a strict prefix of at least one sequence.
    pub fn is_prefix(&self, bytes: &[u8]) -> bool {
        self.sequences
            .range::<[u8], _>((Bound::Excluded(bytes), Bound::Unbounded))
            .next()
            .is_some_and(|(sequence, _)| sequence.starts_with(bytes))
    }

    pub fn lookup(&self, bytes: &[u8]) -> Lookup {
        Lookup {
            exact: self.get(bytes),
            prefix: self.is_prefix(bytes),
        }
    }

    /// Every byte sequence that resolves to `chord`.
    pub fn sequences_for(&self, chord: &KeyChord) -> Vec<&[u8]> {
        self.sequences
            .iter()
            .filter(|(_, candidate)| *candidate == chord)
            .map(|(sequence, _)| sequence.as_slice())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], KeyChord)> {
        self.sequences
            .iter()
            .map(|(sequence, chord)| (sequence.as_slice(), *chord))
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    fn build() -> Self {
        let mut table = Self {
            sequences: BTreeMap::new(),
        };

        for byte in 0x00..=0x7f {
            if let Some(chord) = byte_chord(byte) {
                table.insert(vec![byte], chord);
                table.insert(vec![ESC, byte], chord.with_modifiers(Modifiers::ALT));
            }
        }

        for (final_byte, named) in CURSOR_FINALS {
            let key = Key::Named(named);
            table.insert(vec![ESC, b'[', final_byte], KeyChord::plain(key));
            table.insert(vec![ESC, b'O', final_byte], KeyChord::plain(key));
            table.insert_modified_csi(final_byte, key);
        }

        for (final_byte, number) in SS3_FUNCTION_FINALS {
            let key = Key::Function(number);
            table.insert(vec![ESC, b'O', final_byte], KeyChord::plain(key));
            table.insert_modified_csi(final_byte, key);
        }

        for (code, key) in TILDE_CODES {
            table.insert(format!("\x1b[{code}~").into_bytes(), KeyChord::plain(key));
            for param in MODIFIER_PARAMS {
                table.insert(
                    format!("\x1b[{code};{param}~").into_bytes(),
                    chord_with_param(key, param),
                );
            }
        }

        for (final_byte, number) in LINUX_FUNCTION_FINALS {
            table.insert(
                vec![ESC, b'[', b'[', final_byte],
                KeyChord::plain(Key::Function(number)),
            );
        }

        table.insert(
            vec![ESC, b'[', b'Z'],
            KeyChord::new(Key::Named(NamedKey::Tab), Modifiers::SHIFT),
        );

        let printable = (0x21u8..=0x7e)
            .map(|byte| (u32::from(byte), Key::Char(char::from(byte))));
        let named = CODEPOINT_KEYS
            .into_iter()
            .map(|(codepoint, named)| (codepoint, Key::Named(named)));

        for (codepoint, key) in printable.chain(named) {
            if matches!(key, Key::Named(_)) {
                table.insert(
                    format!("\x1b[{codepoint}u").into_bytes(),
                    KeyChord::plain(key),
                );
            }
            for param in MODIFIER_PARAMS {
                let chord = chord_with_param(key, param);
                table.insert(format!("\x1b[{codepoint};{param}u").into_bytes(), chord);
                table.insert(format!("\x1b[27;{param};{codepoint}~").into_bytes(), chord);
            }
        }

        table
    }

    fn insert_modified_csi(&mut self, final_byte: u8, key: Key) {
        for param in MODIFIER_PARAMS {
            self.insert(
                vec![ESC, b'[', b'1', b';', b'0' + param, final_byte],
                chord_with_param(key, param),
            );
        }
    }

    fn insert(&mut self, sequence: Vec<u8>, chord: KeyChord) {
        self.sequences.entry(sequence).or_insert(chord);
    }
}

fn chord_with_param(key: Key, param: u8) -> KeyChord {
    let modifiers = Modifiers::from_xterm_param(param).unwrap_or_default();
    KeyChord::new(key, modifiers)
}

/// Chord for a single byte as a terminal in raw mode sends it.
pub(crate) fn byte_chord(byte: u8) -> Option<KeyChord> {
    let chord = match byte {
        0x00 => KeyChord::raw(Key::Named(NamedKey::Space), Modifiers::CTRL),
        0x08 | 0x7f => {
            KeyChord::raw(Key::Named(NamedKey::Backspace), Modifiers::empty())
        },
        0x09 => KeyChord::raw(Key::Named(NamedKey::Tab), Modifiers::empty()),
        0x0d => KeyChord::raw(Key::Named(NamedKey::Enter), Modifiers::empty()),
        ESC => KeyChord::raw(Key::Named(NamedKey::Escape), Modifiers::empty()),
        0x01..=0x1a => {
            KeyChord::raw(Key::Char(char::from(b'a' + byte - 1)), Modifiers::CTRL)
        },
        0x1c..=0x1f => {
            KeyChord::raw(Key::Char(char::from(byte + 0x40)), Modifiers::CTRL)
        },
        0x20 => KeyChord::raw(Key::Named(NamedKey::Space), Modifiers::empty()),
        0x21..=0x7e => KeyChord::raw(Key::Char(char::from(byte)), Modifiers::empty()),
        _ => return None,
    };
    Some(chord)
}

/// Byte a terminal sends for `ctrl+<ch>`.
fn control_byte(ch: char) -> Option<u8> {
    match ch {
        '@' => Some(0x00),
        'a'..='z' => Some(ch as u8 - b'a' + 1),
        '[' => Some(ESC),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' => Some(0x1e),
        '_' => Some(0x1f),
        '?' => Some(0x7f),
        _ => None,
    }
}

/// Replace a ctrl chord by the chord of the byte it produces, so aliases
/// such as `ctrl+h` and `backspace` share one identifier.
///
/// `ctrl+shift+<letter>` is left alone: modern key reporting tells it
/// apart from the bare control byte.
pub(crate) fn canonical_chord(chord: KeyChord) -> KeyChord {
    let modifiers = chord.modifiers();
    if !modifiers.contains(Modifiers::CTRL) || modifiers.contains(Modifiers::SHIFT) {
        return chord;
    }

    let Key::Char(ch) = chord.key() else {
        return chord;
    };

    match control_byte(ch).and_then(byte_chord) {
        Some(base) => KeyChord::raw(
            base.key(),
            base.modifiers() | (modifiers - Modifiers::CTRL),
        ),
        None => chord,
    }
}

/// Resolve a base key name or alias.
pub(crate) fn key_for_name(name: &str) -> Option<Key> {
    let named = match name {
        "enter" | "return" | "ret" => NamedKey::Enter,
        "tab" => NamedKey::Tab,
        "backspace" | "bs" => NamedKey::Backspace,
        "escape" | "esc" => NamedKey::Escape,
        "space" | "spacebar" => NamedKey::Space,
        "up" | "arrowup" | "arrow_up" => NamedKey::Up,
        "down" | "arrowdown" | "arrow_down" => NamedKey::Down,
        "left" | "arrowleft" | "arrow_left" => NamedKey::Left,
        "right" | "arrowright" | "arrow_right" => NamedKey::Right,
        "home" => NamedKey::Home,
        "end" => NamedKey::End,
        "insert" | "ins" => NamedKey::Insert,
        "delete" | "del" => NamedKey::Delete,
        "pageup" | "page_up" | "pgup" => NamedKey::PageUp,
        "pagedown" | "page_down" | "pgdn" | "pgdown" => NamedKey::PageDown,
        "plus" => return Some(Key::Char('+')),
        _ => return function_key(name),
    };
    Some(Key::Named(named))
}

fn function_key(name: &str) -> Option<Key> {
    let digits = name.strip_prefix('f')?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let number: u8 = digits.parse().ok()?;
    (1..=MAX_FUNCTION_KEY)
        .contains(&number)
        .then_some(Key::Function(number))
}
