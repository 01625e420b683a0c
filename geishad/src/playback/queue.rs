//! Playback queue
//!
//! An ordered list of entries plus a cursor. The cursor is a plain index that
//! may sit outside `[0, len)` to mean "exhausted"; structural mutations keep
//! it on the same entry (by id) whenever that entry survives.
//!
//! The queue has no locking of its own. It is owned by the player actor.

use std::fmt;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

/// Opaque track identifier (a file path or URI)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Track(String);

impl Track {
    pub fn new(track: impl Into<String>) -> Self {
        Self(track.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Track {
    fn from(track: String) -> Self {
        Self(track)
    }
}

impl From<&str> for Track {
    fn from(track: &str) -> Self {
        Self(track.to_string())
    }
}

/// One queue element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Assigned at insertion, never reused
    pub id: u64,
    pub track: Track,
}

/// Ordered entries with a cursor and loop/repeat/shuffle modes
#[derive(Debug, Clone)]
pub struct Queue {
    entries: Vec<QueueEntry>,
    cursor: i64,
    next_id: u64,
    looping: bool,
    repeat: bool,
    shuffled: bool,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            next_id: 1,
            looping: false,
            repeat: false,
            shuffled: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    pub fn shuffled(&self) -> bool {
        self.shuffled
    }

    /// Flip the loop flag, returning the new value
    pub fn toggle_loop(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Flip the repeat flag, returning the new value
    pub fn toggle_repeat(&mut self) -> bool {
        self.repeat = !self.repeat;
        self.repeat
    }

    /// Index the cursor points at, if it points at an entry
    fn cursor_index(&self) -> Option<usize> {
        usize::try_from(self.cursor)
            .ok()
            .filter(|&index| index < self.entries.len())
    }

    fn current_id(&self) -> Option<u64> {
        self.cursor_index().map(|index| self.entries[index].id)
    }

    /// Put the cursor back on entry `id` after a reorder
    fn relocate(&mut self, id: Option<u64>) {
        if let Some(index) = id.and_then(|id| self.find(id)) {
            self.cursor = index as i64;
        }
    }

    /// Resolve the cursor to an entry (normalizing it first)
    pub fn current(&mut self) -> Option<&QueueEntry> {
        self.advance(0, false);
        self.cursor_index().map(|index| &self.entries[index])
    }

    /// Move the cursor by `step`
    ///
    /// Under `repeat` only a forced move changes the cursor. Under `loop`, or
    /// for any forced move, the result wraps modulo the queue length;
    /// otherwise an out-of-range cursor means the queue is exhausted.
    pub fn advance(&mut self, step: i64, forced: bool) {
        let len = self.entries.len() as i64;
        if len == 0 {
            self.cursor = 0;
            return;
        }

        if forced || !self.repeat {
            self.cursor += step;
        }
        if forced || self.looping {
            self.cursor = self.cursor.rem_euclid(len);
        }
    }

    /// Point the cursor at `index`
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index as i64;
    }

    pub fn find(&self, id: u64) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Insert `track` before `index` (`index <= len`)
    pub fn insert(&mut self, index: usize, track: Track) -> QueueEntry {
        let entry = QueueEntry {
            id: self.next_id,
            track,
        };
        self.next_id += 1;

        if self.cursor_index().is_some_and(|cursor| index <= cursor) {
            self.cursor += 1;
        }
        self.entries.insert(index, entry.clone());
        entry
    }

    pub fn append(&mut self, track: Track) -> QueueEntry {
        self.insert(self.entries.len(), track)
    }

    /// Where tracks queued with "play next" go: right after the current
    /// entry, or at the exhausted cursor so the first one becomes current
    pub fn next_slot(&self) -> usize {
        match self.cursor_index() {
            Some(index) => index + 1,
            None => self.cursor.clamp(0, self.entries.len() as i64) as usize,
        }
    }

    /// Remove the entry at `index` (`index < len`)
    pub fn remove(&mut self, index: usize) -> QueueEntry {
        let len_before = self.entries.len() as i64;
        let entry = self.entries.remove(index);

        // An exhausted cursor steps back with the shrinking end so the next
        // advance wraps from the right place.
        if (index as i64) < self.cursor || self.cursor >= len_before {
            self.cursor -= 1;
        }
        if self.entries.is_empty() {
            self.cursor = 0;
        }
        entry
    }

    /// Order entries by id (insertion order)
    pub fn sort(&mut self) {
        let current = self.current_id();
        self.entries.sort_by_key(|entry| entry.id);
        self.relocate(current);
        self.shuffled = false;
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Shuffle with an explicit random source
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let current = self.current_id();
        self.entries.shuffle(rng);
        self.relocate(current);
        self.shuffled = true;
    }

    /// Empty the queue, keeping loop/repeat and the id counter
    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.shuffled = false;
    }
}
