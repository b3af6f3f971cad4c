//! Play queue
//!
//! Ordered list of tracks plus a cursor. Navigation only ever moves the
//! cursor: shuffle picks among existing indices and nothing is reordered.
//!
//! ```text
//! tracks:  [A] [B] [C] [D]
//!                ^
//!             current = Some(1)
//! ```
//!
//! Invariant: `current` is `Some(i)` with `i < len` whenever the queue is
//! non-empty, and `None` when it is empty.

use crate::error::{PlaybackError, Result};
use crate::types::{RepeatMode, ShuffleMode};
use rand::Rng;
use soul_core::{Track, TrackId};

/// Outcome of [`Queue::remove_at`]
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The removed entry
    pub track: Track,
    /// Whether the cursor pointed at it; the caller decides what plays next
    pub was_current: bool,
}

/// Play queue
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    current: Option<usize>,
}

impl Queue {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the queue has no entries
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All entries in order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Cursor position
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Entry under the cursor
    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// First index holding `id`
    pub fn position_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    /// Install a new list and move the cursor to `start_index` (clamped).
    ///
    /// An empty list clears the queue and returns `None`.
    pub fn replace(&mut self, tracks: Vec<Track>, start_index: usize) -> Option<&Track> {
        self.tracks = tracks;
        self.current = if self.tracks.is_empty() {
            None
        } else {
            Some(start_index.min(self.tracks.len() - 1))
        };
        self.current()
    }

    /// Add tracks to the tail without moving the cursor.
    ///
    /// Appending to an empty queue puts the cursor on the first new entry.
    pub fn append(&mut self, tracks: Vec<Track>) {
        self.tracks.extend(tracks);
        if self.current.is_none() && !self.tracks.is_empty() {
            self.current = Some(0);
        }
    }

    /// Move the cursor to `index`.
    pub fn jump_to(&mut self, index: usize) -> Result<&Track> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.current = Some(index);
        Ok(&self.tracks[index])
    }

    /// Step forward one entry.
    ///
    /// Returns `None` without moving the cursor at the end of the queue.
    pub fn next(&mut self) -> Option<&Track> {
        self.next_with(RepeatMode::Off, ShuffleMode::Off)
    }

    /// Step back one entry.
    ///
    /// Returns `None` without moving the cursor at the start of the queue.
    pub fn previous(&mut self) -> Option<&Track> {
        self.previous_with(RepeatMode::Off, ShuffleMode::Off)
    }

    /// [`Queue::next`] under a repeat/shuffle strategy.
    ///
    /// `All` and `One` wrap at the end; `One` replaying on natural end is
    /// the caller's job.
    pub fn next_with(&mut self, repeat: RepeatMode, shuffle: ShuffleMode) -> Option<&Track> {
        let target = self.step(1, repeat, shuffle, &mut rand::thread_rng())?;
        self.current = Some(target);
        self.tracks.get(target)
    }

    /// [`Queue::previous`] under a repeat/shuffle strategy.
    pub fn previous_with(&mut self, repeat: RepeatMode, shuffle: ShuffleMode) -> Option<&Track> {
        let target = self.step(-1, repeat, shuffle, &mut rand::thread_rng())?;
        self.current = Some(target);
        self.tracks.get(target)
    }

    fn step<R: Rng>(
        &self,
        direction: isize,
        repeat: RepeatMode,
        shuffle: ShuffleMode,
        rng: &mut R,
    ) -> Option<usize> {
        let current = self.current?;
        let len = self.tracks.len();

        if shuffle == ShuffleMode::Random && len > 1 {
            // Uniform over every index except the current one
            let pick = rng.gen_range(0..len - 1);
            return Some(if pick >= current { pick + 1 } else { pick });
        }

        let wraps = repeat != RepeatMode::Off;
        match current.checked_add_signed(direction) {
            Some(i) if i < len => Some(i),
            _ if wraps => Some(if direction > 0 { 0 } else { len - 1 }),
            _ => None,
        }
    }

    /// Remove the entry at `index`, keeping the cursor consistent.
    ///
    /// Entries before the cursor shift it down by one. Removing the current
    /// entry leaves the cursor on whatever now occupies that slot (or the
    /// new last entry).
    pub fn remove_at(&mut self, index: usize) -> Result<Removal> {
        if index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }

        let track = self.tracks.remove(index);
        let was_current = self.current == Some(index);

        self.current = match self.current {
            _ if self.tracks.is_empty() => None,
            Some(cur) if index < cur => Some(cur - 1),
            Some(cur) => Some(cur.min(self.tracks.len() - 1)),
            None => Some(0),
        };

        Ok(Removal { track, was_current })
    }

    /// Drop everything except the current entry, which moves to index 0.
    pub fn clear_to_current(&mut self) {
        let current = self.current.map(|i| self.tracks.swap_remove(i));
        self.tracks.clear();
        self.tracks.extend(current);
        self.current = if self.tracks.is_empty() { None } else { Some(0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn track(id: &str) -> Track {
        Track::new(TrackId::new(id), format!("Track {id}"), "Artist")
    }

    fn queue_of(ids: &[&str]) -> Queue {
        let mut queue = Queue::new();
        queue.replace(ids.iter().map(|id| track(id)).collect(), 0);
        queue
    }

    fn current_id(queue: &Queue) -> Option<&str> {
        queue.current().map(|t| t.id.as_str())
    }

    #[test]
    fn replace_clamps_start_index() {
        let mut queue = Queue::new();
        let started = queue.replace(vec![track("a"), track("b")], 7).unwrap();
        assert_eq!(started.id.as_str(), "b");
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn replace_with_empty_clears() {
        let mut queue = queue_of(&["a", "b"]);
        assert!(queue.replace(Vec::new(), 0).is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn append_keeps_cursor() {
        let mut queue = queue_of(&["a", "b"]);
        queue.jump_to(1).unwrap();
        queue.append(vec![track("c")]);
        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn append_to_empty_points_at_first() {
        let mut queue = Queue::new();
        queue.append(Vec::new());
        assert_eq!(queue.current_index(), None);
        queue.append(vec![track("a"), track("b")]);
        assert_eq!(current_id(&queue), Some("a"));
    }

    #[test]
    fn next_and_previous_stop_at_edges() {
        let mut queue = queue_of(&["a", "b"]);

        assert!(queue.previous().is_none());
        assert_eq!(queue.current_index(), Some(0));

        assert_eq!(queue.next().unwrap().id.as_str(), "b");
        assert!(queue.next().is_none());
        assert_eq!(queue.current_index(), Some(1));

        assert_eq!(queue.previous().unwrap().id.as_str(), "a");
    }

    #[test]
    fn empty_queue_navigation_is_none() {
        let mut queue = Queue::new();
        assert!(queue.next().is_none());
        assert!(queue.previous().is_none());
    }

    #[test]
    fn repeat_all_wraps_both_ways() {
        let mut queue = queue_of(&["a", "b", "c"]);
        assert_eq!(
            queue.previous_with(RepeatMode::All, ShuffleMode::Off).unwrap().id.as_str(),
            "c"
        );
        assert_eq!(
            queue.next_with(RepeatMode::All, ShuffleMode::Off).unwrap().id.as_str(),
            "a"
        );
    }

    #[test]
    fn shuffle_never_picks_current() {
        let queue = queue_of(&["a", "b", "c", "d"]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let pick = queue
                .step(1, RepeatMode::Off, ShuffleMode::Random, &mut rng)
                .unwrap();
            assert_ne!(pick, 0);
            assert!(pick < 4);
        }
    }

    #[test]
    fn shuffle_single_track_follows_repeat() {
        let mut queue = queue_of(&["a"]);
        assert!(queue.next_with(RepeatMode::Off, ShuffleMode::Random).is_none());
        assert_eq!(
            queue.next_with(RepeatMode::All, ShuffleMode::Random).unwrap().id.as_str(),
            "a"
        );
    }

    #[test]
    fn remove_before_cursor_shifts_down() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(2).unwrap();

        let removal = queue.remove_at(0).unwrap();
        assert!(!removal.was_current);
        assert_eq!(current_id(&queue), Some("c"));
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn remove_after_cursor_keeps_it() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.remove_at(2).unwrap();
        assert_eq!(current_id(&queue), Some("a"));
    }

    #[test]
    fn remove_current_points_at_successor() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(1).unwrap();

        let removal = queue.remove_at(1).unwrap();
        assert!(removal.was_current);
        assert_eq!(removal.track.id.as_str(), "b");
        assert_eq!(current_id(&queue), Some("c"));
    }

    #[test]
    fn remove_current_last_clamps() {
        let mut queue = queue_of(&["a", "b"]);
        queue.jump_to(1).unwrap();
        queue.remove_at(1).unwrap();
        assert_eq!(current_id(&queue), Some("a"));

        queue.remove_at(0).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.current_index(), None);
    }

    #[test]
    fn remove_out_of_bounds() {
        let mut queue = queue_of(&["a"]);
        assert!(matches!(
            queue.remove_at(1),
            Err(PlaybackError::IndexOutOfBounds(1))
        ));
    }

    #[test]
    fn clear_to_current_keeps_only_current() {
        let mut queue = queue_of(&["a", "b", "c"]);
        queue.jump_to(1).unwrap();
        queue.clear_to_current();
        assert_eq!(queue.len(), 1);
        assert_eq!(current_id(&queue), Some("b"));
        assert_eq!(queue.current_index(), Some(0));

        let mut empty = Queue::new();
        empty.clear_to_current();
        assert!(empty.is_empty());
    }
}
