use std::collections::HashMap;

use hotkeys_input::KeyChord;
use parking_lot::RwLock;

use crate::callback::Callback;

/// Chord to callback map shared by the controller and the reader.
///
/// Lookups clone the callback handle out of the map, so no lock is held
/// while user code runs.
#[derive(Default)]
pub(crate) struct BindingTable {
    bindings: RwLock<HashMap<KeyChord, Callback>>,
}

impl BindingTable {
    /// Bind `chord`, returning the callback it replaces.
    pub(crate) fn insert(
        &self,
        chord: KeyChord,
        callback: Callback,
    ) -> Option<Callback> {
        self.bindings.write().insert(chord, callback)
    }

    pub(crate) fn remove(&self, chord: &KeyChord) -> bool {
        self.bindings.write().remove(chord).is_some()
    }

    pub(crate) fn get(&self, chord: &KeyChord) -> Option<Callback> {
        self.bindings.read().get(chord).cloned()
    }

    /// Bound chords in canonical string order.
    pub(crate) fn chords(&self) -> Vec<KeyChord> {
        let mut chords: Vec<_> = self.bindings.read().keys().copied().collect();
        chords.sort_by_cached_key(KeyChord::to_string);
        chords
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(spec: &str) -> KeyChord {
        spec.parse().expect("valid chord")
    }

    #[test]
    fn insert_replaces_and_remove_reports_presence() {
        let table = BindingTable::default();

        assert!(table.insert(chord("f9"), Callback::sync(|_| {})).is_none());
        let replaced = table.insert(chord("F9"), Callback::asynchronous(|_| async {}));
        assert!(matches!(replaced, Some(Callback::Sync(_))));
        assert!(table.get(&chord("f9")).is_some_and(|cb| cb.is_async()));

        assert!(table.remove(&chord("f9")));
        assert!(!table.remove(&chord("f9")));
        assert!(table.get(&chord("f9")).is_none());
    }

    #[test]
    fn aliases_share_one_binding() {
        let table = BindingTable::default();
        table.insert(chord("ctrl+h"), Callback::sync(|_| {}));
        assert!(table.get(&chord("backspace")).is_some());
    }

    #[test]
    fn chords_are_sorted() {
        let table = BindingTable::default();
        for spec in ["f10", "ctrl+c", "alt+x"] {
            table.insert(chord(spec), Callback::sync(|_| {}));
        }
        let names: Vec<_> =
            table.chords().iter().map(ToString::to_string).collect();
        assert_eq!(names, ["alt+x", "ctrl+c", "f10"]);
    }
}
