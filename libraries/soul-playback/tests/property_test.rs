//! Property-based tests for the queue, volume and seek clamping
//!
//! Uses proptest to verify invariants across many random inputs.

use proptest::prelude::*;
use soul_core::{Track, TrackId};
use soul_playback::{clamp_position, Queue, RepeatMode, ShuffleMode, Volume};
use std::collections::HashSet;
use std::time::Duration;

// ===== Helpers =====

fn arbitrary_track() -> impl Strategy<Value = Track> {
    (
        "[a-z0-9]{1,10}",  // id
        "[A-Za-z ]{1,30}", // title
        "[A-Za-z ]{1,20}", // artist
        0u64..600,         // duration (0 = unknown)
    )
        .prop_map(|(id, title, artist, duration_secs)| {
            Track::new(TrackId::new(id), title, artist)
                .with_duration(Duration::from_secs(duration_secs))
        })
}

fn arbitrary_tracks(max: usize) -> impl Strategy<Value = Vec<Track>> {
    prop::collection::vec(arbitrary_track(), 0..max)
}

#[derive(Debug, Clone)]
enum Op {
    Replace(Vec<Track>, usize),
    Append(Vec<Track>),
    Remove(usize),
    Jump(usize),
    Next,
    Previous,
    NextWith(RepeatMode, ShuffleMode),
    PreviousWith(RepeatMode, ShuffleMode),
    ClearToCurrent,
}

fn arbitrary_mode() -> impl Strategy<Value = (RepeatMode, ShuffleMode)> {
    (
        prop_oneof![
            Just(RepeatMode::Off),
            Just(RepeatMode::All),
            Just(RepeatMode::One)
        ],
        prop_oneof![Just(ShuffleMode::Off), Just(ShuffleMode::Random)],
    )
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arbitrary_tracks(8), 0usize..12).prop_map(|(t, i)| Op::Replace(t, i)),
        arbitrary_tracks(4).prop_map(Op::Append),
        (0usize..12).prop_map(Op::Remove),
        (0usize..12).prop_map(Op::Jump),
        Just(Op::Next),
        Just(Op::Previous),
        arbitrary_mode().prop_map(|(r, s)| Op::NextWith(r, s)),
        arbitrary_mode().prop_map(|(r, s)| Op::PreviousWith(r, s)),
        Just(Op::ClearToCurrent),
    ]
}

fn apply(queue: &mut Queue, op: Op) {
    match op {
        Op::Replace(tracks, start) => {
            queue.replace(tracks, start);
        }
        Op::Append(tracks) => queue.append(tracks),
        Op::Remove(index) => {
            let _ = queue.remove_at(index);
        }
        Op::Jump(index) => {
            let _ = queue.jump_to(index);
        }
        Op::Next => {
            queue.next();
        }
        Op::Previous => {
            queue.previous();
        }
        Op::NextWith(repeat, shuffle) => {
            queue.next_with(repeat, shuffle);
        }
        Op::PreviousWith(repeat, shuffle) => {
            queue.previous_with(repeat, shuffle);
        }
        Op::ClearToCurrent => queue.clear_to_current(),
    }
}

// ===== Property Tests =====

proptest! {
    /// Property: the cursor is in range whenever the queue is non-empty,
    /// and absent when it is empty
    #[test]
    fn cursor_always_in_bounds(ops in prop::collection::vec(arbitrary_op(), 1..60)) {
        let mut queue = Queue::new();
        for op in ops {
            apply(&mut queue, op);
            match queue.current_index() {
                Some(index) => prop_assert!(index < queue.len()),
                None => prop_assert!(queue.is_empty()),
            }
        }
    }

    /// Property: append never moves an existing cursor
    #[test]
    fn append_keeps_cursor(
        initial in arbitrary_tracks(10),
        start in 0usize..10,
        extra in arbitrary_tracks(10),
    ) {
        let mut queue = Queue::new();
        queue.replace(initial.clone(), start);
        let before = queue.current_index();

        queue.append(extra.clone());

        prop_assert_eq!(queue.len(), initial.len() + extra.len());
        if before.is_some() {
            prop_assert_eq!(queue.current_index(), before);
        }
    }

    /// Property: shuffle only picks existing entries and never reorders
    #[test]
    fn shuffle_never_reorders(tracks in prop::collection::vec(arbitrary_track(), 2..20), steps in 1usize..30) {
        let mut queue = Queue::new();
        queue.replace(tracks.clone(), 0);

        for _ in 0..steps {
            let before = queue.current_index();
            let picked = queue.next_with(RepeatMode::Off, ShuffleMode::Random).cloned();
            prop_assert!(picked.is_some());
            prop_assert_ne!(queue.current_index(), before);
        }

        let ids: Vec<_> = queue.tracks().iter().map(|t| t.id.clone()).collect();
        let expected: Vec<_> = tracks.iter().map(|t| t.id.clone()).collect();
        prop_assert_eq!(ids, expected);
    }

    /// Property: removing an entry before the cursor keeps the same track current
    #[test]
    fn removal_before_cursor_shifts_down(
        tracks in prop::collection::vec(arbitrary_track(), 2..20),
        cursor_seed in any::<usize>(),
        remove_seed in any::<usize>(),
    ) {
        let mut queue = Queue::new();
        let cursor = 1 + cursor_seed % (tracks.len() - 1);
        queue.replace(tracks, cursor);
        let current = queue.current().cloned();

        let index = remove_seed % cursor;
        let removal = queue.remove_at(index).unwrap();

        prop_assert!(!removal.was_current);
        prop_assert_eq!(queue.current_index(), Some(cursor - 1));
        prop_assert_eq!(queue.current().cloned(), current);
    }

    /// Property: clear keeps at most the current track
    #[test]
    fn clear_keeps_only_current(tracks in arbitrary_tracks(20), start in 0usize..20) {
        let mut queue = Queue::new();
        queue.replace(tracks, start);
        let current = queue.current().map(|t| t.id.clone());

        queue.clear_to_current();

        prop_assert_eq!(queue.len(), usize::from(current.is_some()));
        prop_assert_eq!(queue.current().map(|t| t.id.clone()), current);
    }

    /// Property: stored volume is always clamp(x, 0, 1)
    #[test]
    fn volume_clamped_to_range(level in -1e6f32..1e6) {
        let mut volume = Volume::default();
        let stored = volume.set_level(level);

        prop_assert_eq!(stored, level.clamp(0.0, 1.0));
        prop_assert_eq!(volume.level(), stored);
    }

    /// Property: mute silences output but preserves the stored level
    #[test]
    fn mute_preserves_level(level in 0.0f32..=1.0) {
        let mut volume = Volume::new(level);
        volume.mute();

        prop_assert_eq!(volume.effective(), 0.0);
        prop_assert_eq!(volume.level(), level);

        volume.unmute();
        prop_assert_eq!(volume.effective(), level);
    }

    /// Property: seek position is always clamp(t, 0, duration)
    #[test]
    fn seek_clamped_to_duration(seconds in prop::num::f64::ANY, duration_ms in 0u64..36_000_000) {
        let duration = Duration::from_millis(duration_ms);
        let position = clamp_position(seconds, Some(duration));

        prop_assert!(position <= duration);
        if seconds.is_nan() || seconds <= 0.0 {
            prop_assert_eq!(position, Duration::ZERO);
        } else if seconds >= duration.as_secs_f64() {
            prop_assert_eq!(position, duration);
        }
    }

    /// Property: replace always lands on a track that is in the new list
    #[test]
    fn replace_lands_in_list(tracks in arbitrary_tracks(20), start in any::<usize>()) {
        let mut queue = Queue::new();
        let ids: HashSet<_> = tracks.iter().map(|t| t.id.clone()).collect();
        let landed = queue.replace(tracks.clone(), start).map(|t| t.id.clone());

        match landed {
            Some(id) => prop_assert!(ids.contains(&id)),
            None => prop_assert!(tracks.is_empty()),
        }
    }
}
