//! Pending-track storage.
//!
//! Plain FIFO: tracks are appended at the tail, popped from the head, or cleared wholesale.
//! A head that could not start yet goes back to the front. Nothing reorders them.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A playable audio resource, usually a file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Track(PathBuf);

impl Track {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// File name for display, falling back to the full path.
    pub fn display_name(&self) -> String {
        self.0
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.to_string())
            .unwrap_or_else(|| self.0.to_string_lossy().to_string())
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<PathBuf> for Track {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl From<&str> for Track {
    fn from(path: &str) -> Self {
        Self(PathBuf::from(path))
    }
}

#[derive(Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, track: Track) {
        self.items.push_back(track);
    }

    /// Pop the head, or `None` when the queue is empty.
    pub fn dequeue_head(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Put back a head popped by [`TrackQueue::dequeue_head`] that could not start.
    pub fn requeue_head(&mut self, track: Track) {
        self.items.push_front(track);
    }

    pub fn peek_head(&self) -> Option<&Track> {
        self.items.front()
    }

    /// Drop every pending track and return how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Ordered copy of the pending tracks for display.
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dequeue_preserves_insertion_order() {
        let mut queue = TrackQueue::new();
        queue.enqueue(Track::from("a.mp3"));
        queue.enqueue(Track::from("b.mp3"));
        queue.enqueue(Track::from("c.mp3"));

        assert_eq!(queue.peek_head(), Some(&Track::from("a.mp3")));
        assert_eq!(queue.dequeue_head(), Some(Track::from("a.mp3")));
        assert_eq!(queue.dequeue_head(), Some(Track::from("b.mp3")));
        assert_eq!(queue.snapshot(), vec![Track::from("c.mp3")]);
    }

    #[test]
    fn requeued_head_comes_out_first() {
        let mut queue = TrackQueue::new();
        queue.enqueue(Track::from("a.mp3"));
        queue.enqueue(Track::from("b.mp3"));
        let head = queue.dequeue_head().unwrap();
        queue.requeue_head(head);
        assert_eq!(
            queue.snapshot(),
            vec![Track::from("a.mp3"), Track::from("b.mp3")]
        );
    }

    #[test]
    fn dequeue_on_empty_returns_none() {
        let mut queue = TrackQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue_head(), None);
        assert_eq!(queue.peek_head(), None);
    }

    #[test]
    fn clear_reports_removed_count() {
        let mut queue = TrackQueue::new();
        queue.enqueue(Track::from("a.mp3"));
        queue.enqueue(Track::from("b.mp3"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn display_name_uses_file_name() {
        assert_eq!(Track::from("/music/intro.mp3").display_name(), "intro.mp3");
        assert_eq!(Track::from("/").display_name(), "/");
    }
}
