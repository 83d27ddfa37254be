//! Timing record for the active primary track.

use std::time::{Duration, Instant};

use crate::queue::Track;

/// The primary track that is playing or paused, and where it is.
///
/// Position is wall-clock based: `base_offset` plus time since `started_at`, minus time
/// spent paused.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    track: Track,
    started_at: Instant,
    base_offset: Duration,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl PlaybackSession {
    pub fn start(track: Track, now: Instant) -> Self {
        Self::start_at_offset(track, Duration::ZERO, now)
    }

    /// Session for a track that begins playing from `offset`.
    pub fn start_at_offset(track: Track, offset: Duration, now: Instant) -> Self {
        Self {
            track,
            started_at: now,
            base_offset: offset,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let until = self.paused_at.unwrap_or(now);
        let running = until
            .saturating_duration_since(self.started_at)
            .saturating_sub(self.paused_total);
        self.base_offset + running
    }

    pub fn pause(&mut self, now: Instant) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_tracks_wall_clock() {
        let t0 = Instant::now();
        let session = PlaybackSession::start(Track::from("a.mp3"), t0);
        assert_eq!(session.elapsed(t0 + Duration::from_secs(3)), Duration::from_secs(3));
    }

    #[test]
    fn pause_then_resume_keeps_position() {
        let t0 = Instant::now();
        let mut session = PlaybackSession::start(Track::from("a.mp3"), t0);
        session.pause(t0 + Duration::from_secs(5));
        assert!(session.is_paused());
        assert_eq!(session.elapsed(t0 + Duration::from_secs(60)), Duration::from_secs(5));

        session.resume(t0 + Duration::from_secs(60));
        assert!(!session.is_paused());
        assert_eq!(session.elapsed(t0 + Duration::from_secs(60)), Duration::from_secs(5));
        assert_eq!(session.elapsed(t0 + Duration::from_secs(62)), Duration::from_secs(7));
    }

    #[test]
    fn repeated_pause_keeps_first_timestamp() {
        let t0 = Instant::now();
        let mut session = PlaybackSession::start(Track::from("a.mp3"), t0);
        session.pause(t0 + Duration::from_secs(2));
        session.pause(t0 + Duration::from_secs(4));
        session.resume(t0 + Duration::from_secs(10));
        assert_eq!(session.elapsed(t0 + Duration::from_secs(10)), Duration::from_secs(2));
    }

    #[test]
    fn offset_start_counts_from_offset() {
        let t0 = Instant::now();
        let session = PlaybackSession::start_at_offset(
            Track::from("a.mp3"),
            Duration::from_secs(42),
            t0,
        );
        assert_eq!(session.elapsed(t0 + Duration::from_secs(1)), Duration::from_secs(43));
    }
}
