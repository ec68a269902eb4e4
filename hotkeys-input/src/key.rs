use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::KeySpecError;
use crate::table;

/// Highest function key number recognised by the key table.
pub const MAX_FUNCTION_KEY: u8 = 24;

/// Non-printable keys with a dedicated name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Enter,
    Tab,
    Backspace,
    Escape,
    Space,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
}

impl NamedKey {
    pub const ALL: [NamedKey; 15] = [
        NamedKey::Enter,
        NamedKey::Tab,
        NamedKey::Backspace,
        NamedKey::Escape,
        NamedKey::Space,
        NamedKey::Up,
        NamedKey::Down,
        NamedKey::Left,
        NamedKey::Right,
        NamedKey::Home,
        NamedKey::End,
        NamedKey::Insert,
        NamedKey::Delete,
        NamedKey::PageUp,
        NamedKey::PageDown,
    ];

    /// Canonical lowercase name used in key specifications.
    pub fn name(self) -> &'static str {
        match self {
            NamedKey::Enter => "enter",
            NamedKey::Tab => "tab",
            NamedKey::Backspace => "backspace",
            NamedKey::Escape => "escape",
            NamedKey::Space => "space",
            NamedKey::Up => "up",
            NamedKey::Down => "down",
            NamedKey::Left => "left",
            NamedKey::Right => "right",
            NamedKey::Home => "home",
            NamedKey::End => "end",
            NamedKey::Insert => "insert",
            NamedKey::Delete => "delete",
            NamedKey::PageUp => "pageup",
            NamedKey::PageDown => "pagedown",
        }
    }
}

/// Base key of a chord, without modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// A printable character, already shifted by the terminal (`A`, `!`).
    Char(char),
    Named(NamedKey),
    /// `F1` through `F24`.
    Function(u8),
    /// A well-formed escape sequence that no table entry describes.
    Unknown,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(ch) => write!(f, "{ch}"),
            Key::Named(named) => f.write_str(named.name()),
            Key::Function(number) => write!(f, "f{number}"),
            Key::Unknown => f.write_str("unknown"),
        }
    }
}

bitflags! {
    /// Modifier set of a chord. Iteration and display order is
    /// `ctrl`, `alt`, `shift`.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const CTRL  = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const SHIFT = 0b0000_0100;
    }
}

impl Modifiers {
    /// Decode the xterm modifier parameter (`1 + bitmask`, shift = 1,
    /// alt = 2, ctrl = 4). Meta and higher bits are ignored.
    pub fn from_xterm_param(param: u8) -> Option<Self> {
        let mask = param.checked_sub(1)?;
        let mut modifiers = Modifiers::empty();
        modifiers.set(Modifiers::SHIFT, mask & 0b001 != 0);
        modifiers.set(Modifiers::ALT, mask & 0b010 != 0);
        modifiers.set(Modifiers::CTRL, mask & 0b100 != 0);
        Some(modifiers)
    }

    /// Encode as the xterm modifier parameter.
    pub fn xterm_param(self) -> u8 {
        let mut mask = 0;
        if self.contains(Modifiers::SHIFT) {
            mask |= 0b001;
        }
        if self.contains(Modifiers::ALT) {
            mask |= 0b010;
        }
        if self.contains(Modifiers::CTRL) {
            mask |= 0b100;
        }
        mask + 1
    }

    /// Canonical names in display order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        [
            (Modifiers::CTRL, "ctrl"),
            (Modifiers::ALT, "alt"),
            (Modifiers::SHIFT, "shift"),
        ]
        .into_iter()
        .filter(move |(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
    }

    fn from_spec_name(name: &str) -> Option<Self> {
        match name {
            "ctrl" | "control" => Some(Modifiers::CTRL),
            "alt" | "meta" | "option" => Some(Modifiers::ALT),
            "shift" => Some(Modifiers::SHIFT),
            _ => None,
        }
    }
}

/// Canonical key identifier: a base key plus its modifiers.
///
/// Construction always normalizes, so two chords that a terminal can not
/// tell apart compare equal:
/// - `shift` on a letter without `ctrl` folds into the uppercase letter
///   (`shift+a` is `A`), because terminals deliver the shifted character;
/// - letters under `ctrl` are lowercase (`ctrl+H` is `ctrl+h`);
/// - ctrl chords that share a byte with a named key become that key
///   (`ctrl+h` is `backspace`, `ctrl+i` is `tab`, `ctrl+m` is `enter`,
///   `ctrl+[` is `escape`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    key: Key,
    modifiers: Modifiers,
}

impl KeyChord {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        table::canonical_chord(Self { key, modifiers }.fold_case())
    }

    /// A chord without modifiers.
    pub fn plain(key: Key) -> Self {
        Self::new(key, Modifiers::empty())
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn with_modifiers(self, modifiers: Modifiers) -> Self {
        Self::new(self.key, self.modifiers | modifiers)
    }

    pub(crate) const fn raw(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    fn fold_case(self) -> Self {
        let Key::Char(ch) = self.key else {
            return self;
        };
        if !ch.is_ascii_alphabetic() {
            return self;
        }

        let mut modifiers = self.modifiers;
        let ch = if modifiers.contains(Modifiers::CTRL) {
            ch.to_ascii_lowercase()
        } else if modifiers.contains(Modifiers::SHIFT) {
            modifiers.remove(Modifiers::SHIFT);
            ch.to_ascii_uppercase()
        } else {
            ch
        };

        Self {
            key: Key::Char(ch),
            modifiers,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.modifiers.names() {
            write!(f, "{name}+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for KeyChord {
    type Err = KeySpecError;

    /// Parse `([modifier+])*base_key`.
    ///
    /// Modifier and key names are case-insensitive; a single-character base
    /// key keeps its case since `a` and `A` are different keystrokes.
    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(KeySpecError::Empty);
        }

        let (prefix, base) = if spec == "+" {
            ("", "+")
        } else if let Some(prefix) = spec.strip_suffix("++") {
            (prefix, "+")
        } else {
            match spec.rsplit_once('+') {
                Some((prefix, base)) => (prefix, base),
                None => ("", spec),
            }
        };

        let base = base.trim();
        if base.is_empty() {
            return Err(KeySpecError::MissingKey(spec.to_string()));
        }

        let mut modifiers = Modifiers::empty();
        if !prefix.is_empty() {
            for part in prefix.split('+') {
                let name = part.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return Err(KeySpecError::MissingKey(spec.to_string()));
                }
                let modifier = Modifiers::from_spec_name(&name)
                    .ok_or(KeySpecError::UnknownModifier(name))?;
                modifiers |= modifier;
            }
        }

        let key = parse_base_key(base)?;
        Ok(KeyChord::new(key, modifiers))
    }
}

fn parse_base_key(base: &str) -> Result<Key, KeySpecError> {
    let mut chars = base.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_control() {
            return Err(KeySpecError::ControlCharacter(ch));
        }
        return Ok(Key::Char(ch));
    }

    let name = base.to_ascii_lowercase();
    table::key_for_name(&name).ok_or(KeySpecError::UnknownKey(name))
}

/// A single resolved keystroke.
///
/// Carries the chord used for binding lookup and the raw bytes the
/// terminal sent for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    chord: KeyChord,
    raw: Vec<u8>,
}

impl KeyEvent {
    pub fn new(chord: KeyChord, raw: Vec<u8>) -> Self {
        Self { chord, raw }
    }

    pub(crate) fn unknown(raw: Vec<u8>) -> Self {
        Self::new(KeyChord::raw(Key::Unknown, Modifiers::empty()), raw)
    }

    pub fn chord(&self) -> &KeyChord {
        &self.chord
    }

    pub fn key(&self) -> Key {
        self.chord.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.chord.modifiers
    }

    /// Bytes exactly as read from the terminal.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn is_unknown(&self) -> bool {
        self.chord.key == Key::Unknown
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.chord.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(spec: &str) -> KeyChord {
        spec.parse().unwrap_or_else(|err| panic!("{spec}: {err}"))
    }

    #[test]
    fn parse_and_display_canonical_form() {
        let cases = vec![
            ("f9", "f9"),
            ("F10", "f10"),
            ("Ctrl+C", "ctrl+c"),
            ("shift+ctrl+H", "ctrl+shift+h"),
            ("alt+ctrl+ctrl+x", "ctrl+alt+x"),
            ("shift+a", "A"),
            ("alt+shift+a", "alt+A"),
            ("A", "A"),
            ("a", "a"),
            ("return", "enter"),
            ("esc", "escape"),
            ("ctrl+h", "backspace"),
            ("ctrl+i", "tab"),
            ("ctrl+m", "enter"),
            ("ctrl+[", "escape"),
            ("ctrl+alt+h", "alt+backspace"),
            ("pgup", "pageup"),
            ("Page_Down", "pagedown"),
            ("shift+up", "shift+up"),
            ("control+alt+f1", "ctrl+alt+f1"),
            ("+", "+"),
            ("ctrl++", "ctrl++"),
            ("ctrl+space", "ctrl+space"),
            ("ctrl+@", "ctrl+space"),
            (" alt + x ", "alt+x"),
        ];

        for (input, expected) in cases {
            assert_eq!(chord(input).to_string(), expected, "input: {input}");
        }
    }

    #[test]
    fn canonical_form_round_trips() {
        for spec in ["ctrl+shift+h", "alt+A", "f24", "shift+tab", "ctrl++"] {
            assert_eq!(chord(&chord(spec).to_string()), chord(spec));
        }
    }

    #[test]
    fn parse_rejects_malformed_specs() {
        assert_eq!("".parse::<KeyChord>(), Err(KeySpecError::Empty));
        assert_eq!("   ".parse::<KeyChord>(), Err(KeySpecError::Empty));
        assert_eq!(
            "hyper+a".parse::<KeyChord>(),
            Err(KeySpecError::UnknownModifier("hyper".into()))
        );
        assert_eq!(
            "ctrl+banana".parse::<KeyChord>(),
            Err(KeySpecError::UnknownKey("banana".into()))
        );
        assert_eq!(
            "f25".parse::<KeyChord>(),
            Err(KeySpecError::UnknownKey("f25".into()))
        );
        assert_eq!(
            "f0".parse::<KeyChord>(),
            Err(KeySpecError::UnknownKey("f0".into()))
        );
        assert!(matches!(
            "ctrl+".parse::<KeyChord>(),
            Err(KeySpecError::MissingKey(_))
        ));
        assert!(matches!(
            "ctrl++a".parse::<KeyChord>(),
            Err(KeySpecError::MissingKey(_))
        ));
        assert_eq!(
            "\u{7}".parse::<KeyChord>(),
            Err(KeySpecError::ControlCharacter('\u{7}'))
        );
        assert_eq!(
            "unknown".parse::<KeyChord>(),
            Err(KeySpecError::UnknownKey("unknown".into()))
        );
    }

    #[test]
    fn xterm_modifier_param_round_trip() {
        for param in 1..=8 {
            let modifiers = Modifiers::from_xterm_param(param)
                .expect("param in range");
            assert_eq!(modifiers.xterm_param(), param);
        }
        assert_eq!(Modifiers::from_xterm_param(0), None);
        assert_eq!(
            Modifiers::from_xterm_param(6),
            Some(Modifiers::CTRL | Modifiers::SHIFT)
        );
    }

    #[test]
    fn modifier_names_follow_display_order() {
        let all = Modifiers::SHIFT | Modifiers::CTRL | Modifiers::ALT;
        assert_eq!(all.names().collect::<Vec<_>>(), ["ctrl", "alt", "shift"]);
    }
}
