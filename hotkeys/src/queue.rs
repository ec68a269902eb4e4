use std::collections::VecDeque;

use hotkeys_input::KeyEvent;
use log::{debug, warn};
use parking_lot::Mutex;

/// An unhandled key and its arrival number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnhandledEntry {
    pub sequence: u64,
    pub event: KeyEvent,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<UnhandledEntry>,
    next_sequence: u64,
    evicted: u64,
    overflowing: bool,
}

/// Bounded FIFO of keys nobody was bound to.
///
/// When full, pushing evicts the oldest entry.
pub struct UnhandledQueue {
    state: Mutex<QueueState>,
    capacity: usize,
}

impl UnhandledQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::default(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `event`, returning the entry evicted to make room.
    pub fn push(&self, event: KeyEvent) -> Option<UnhandledEntry> {
        let mut state = self.state.lock();
        let sequence = state.next_sequence;
        state.next_sequence += 1;

        let evicted = if state.entries.len() >= self.capacity {
            state.evicted += 1;
            if !state.overflowing {
                state.overflowing = true;
                warn!(
                    "unhandled key queue is full ({} entries), dropping oldest keys",
                    self.capacity
                );
            }
            state.entries.pop_front()
        } else {
            None
        };

        debug!("unhandled key `{event}` queued as #{sequence}");
        state.entries.push_back(UnhandledEntry { sequence, event });
        evicted
    }

    pub fn pop(&self) -> Option<KeyEvent> {
        self.pop_entry().map(|entry| entry.event)
    }

    pub fn pop_entry(&self) -> Option<UnhandledEntry> {
        let mut state = self.state.lock();
        state.overflowing = false;
        state.entries.pop_front()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.overflowing = false;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Number of entries dropped because the queue was full.
    pub fn evicted(&self) -> u64 {
        self.state.lock().evicted
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use hotkeys_input::{Key, KeyChord};

    use super::*;

    fn key(ch: char) -> KeyEvent {
        let mut raw = [0u8; 4];
        KeyEvent::new(
            KeyChord::plain(Key::Char(ch)),
            ch.encode_utf8(&mut raw).as_bytes().to_vec(),
        )
    }

    #[test]
    fn pops_in_arrival_order() {
        let queue = UnhandledQueue::new(8);
        for ch in ['a', 'b', 'c'] {
            assert!(queue.push(key(ch)).is_none());
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(key('a')));
        assert_eq!(queue.pop(), Some(key('b')));
        assert_eq!(queue.pop(), Some(key('c')));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn full_queue_drops_oldest() {
        let queue = UnhandledQueue::new(1000);
        for index in 0..1005u32 {
            let ch = char::from_u32(0x4e00 + index).expect("cjk codepoint");
            let evicted = queue.push(key(ch));
            assert_eq!(evicted.is_some(), index >= 1000);
        }

        assert_eq!(queue.len(), 1000);
        assert_eq!(queue.evicted(), 5);

        let first = queue.pop_entry().expect("entry");
        assert_eq!(first.sequence, 5);
        assert_eq!(first.event, key(char::from_u32(0x4e05).expect("cjk")));

        let mut previous = first.sequence;
        while let Some(entry) = queue.pop_entry() {
            assert_eq!(entry.sequence, previous + 1);
            previous = entry.sequence;
        }
        assert_eq!(previous, 1004);
    }

    #[test]
    fn clear_empties_queue() {
        let queue = UnhandledQueue::new(4);
        queue.push(key('x'));
        queue.push(key('y'));
        queue.clear();

        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn zero_capacity_keeps_latest_key() {
        let queue = UnhandledQueue::new(0);
        queue.push(key('x'));
        queue.push(key('y'));
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.pop(), Some(key('y')));
    }

    #[test]
    fn concurrent_producers_respect_capacity() {
        let queue = Arc::new(UnhandledQueue::new(50));
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        queue.push(key('k'));
                        assert!(queue.len() <= 50);
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().expect("producer thread");
        }

        assert_eq!(queue.len(), 50);
        assert_eq!(queue.evicted(), 350);
    }
}
