//! Per-guild track queue
//!
//! Plain ordered storage. It knows nothing about player state: the engine
//! decides when index 0 may be removed and whether it is held fixed during a
//! shuffle.

use encore_common::Track;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

/// Ordered sequence of tracks; index 0 is the head
#[derive(Debug, Default, Clone)]
pub struct TrackQueue {
    tracks: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn head(&self) -> Option<&Track> {
        self.tracks.front()
    }

    /// Append in order, returning the new length
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        self.tracks.extend(tracks);
        self.tracks.len()
    }

    pub fn pop_head(&mut self) -> Option<Track> {
        self.tracks.pop_front()
    }

    /// Remove everything, returning how many tracks were dropped
    pub fn clear(&mut self) -> usize {
        let removed = self.tracks.len();
        self.tracks.clear();
        removed
    }

    /// Remove everything after the head, returning how many tracks were dropped
    pub fn clear_keep_head(&mut self) -> usize {
        let removed = self.tracks.len().saturating_sub(1);
        self.tracks.truncate(1);
        removed
    }

    /// Uniformly permute the queue, optionally holding index 0 in place
    ///
    /// Returns how many positions took part in the permutation.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R, keep_head: bool) -> usize {
        let start = usize::from(keep_head).min(self.tracks.len());
        let slice = &mut self.tracks.make_contiguous()[start..];
        slice.shuffle(rng);
        slice.len()
    }

    /// Owned copy of the queue in order
    pub fn snapshot(&self) -> Vec<Track> {
        self.tracks.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }
}
