//! Save/restore of the primary track around quick-sound interrupts.

use std::time::{Duration, Instant};

use crate::queue::Track;
use crate::session::PlaybackSession;
use crate::sink::{CompletionCallback, IdleWait, OutputSink, PlayRequest, SinkError};

/// Primary track parked while an interrupt clip occupies the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptState {
    pub track: Track,
    /// Position to resume from.
    pub offset: Duration,
    /// The track was paused when interrupted and is restored paused.
    pub was_paused: bool,
}

#[derive(Debug, Clone)]
pub struct InterruptController {
    idle_wait: IdleWait,
}

impl InterruptController {
    pub fn new(idle_wait: IdleWait) -> Self {
        Self { idle_wait }
    }

    /// Record the session's track and wall-clock position.
    pub fn capture(&self, session: &PlaybackSession, now: Instant) -> InterruptState {
        let state = InterruptState {
            track: session.track().clone(),
            offset: session.elapsed(now),
            was_paused: session.is_paused(),
        };
        tracing::info!(
            track = %state.track,
            offset_ms = state.offset.as_millis() as u64,
            paused = state.was_paused,
            "primary track saved for interrupt"
        );
        state
    }

    /// Start `state.track` at `state.offset` once the sink is idle.
    ///
    /// Returns the new session for the restored track.
    pub fn restore(
        &self,
        state: &InterruptState,
        sink: &mut dyn OutputSink,
        gain: f32,
        on_complete: CompletionCallback,
    ) -> Result<PlaybackSession, SinkError> {
        if !sink.wait_idle(&self.idle_wait) {
            tracing::warn!(track = %state.track, "sink busy before restore; forcing stop");
            sink.stop();
            if !sink.wait_idle(&self.idle_wait) {
                return Err(SinkError::busy("sink did not go idle for restore"));
            }
        }
        sink.play(
            PlayRequest {
                source: state.track.path().to_path_buf(),
                gain,
                start_at: state.offset,
            },
            on_complete,
        )?;
        tracing::info!(
            track = %state.track,
            offset_ms = state.offset.as_millis() as u64,
            "primary track restored"
        );
        Ok(PlaybackSession::start_at_offset(
            state.track.clone(),
            state.offset,
            Instant::now(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedSink;

    #[test]
    fn capture_uses_elapsed_time() {
        let controller = InterruptController::new(IdleWait::default());
        let t0 = Instant::now();
        let session = PlaybackSession::start(Track::from("song.mp3"), t0);
        let state = controller.capture(&session, t0 + Duration::from_secs(12));
        assert_eq!(state.track, Track::from("song.mp3"));
        assert_eq!(state.offset, Duration::from_secs(12));
        assert!(!state.was_paused);
    }

    #[test]
    fn capture_of_paused_session_freezes_offset() {
        let controller = InterruptController::new(IdleWait::default());
        let t0 = Instant::now();
        let mut session = PlaybackSession::start(Track::from("song.mp3"), t0);
        session.pause(t0 + Duration::from_secs(4));
        let state = controller.capture(&session, t0 + Duration::from_secs(30));
        assert_eq!(state.offset, Duration::from_secs(4));
        assert!(state.was_paused);
    }

    #[test]
    fn restore_seeks_to_saved_offset() {
        let controller = InterruptController::new(IdleWait::default());
        let mut sink = ScriptedSink::with_channels(&["main"]);
        let state = InterruptState {
            track: Track::from("song.mp3"),
            offset: Duration::from_secs(7),
            was_paused: false,
        };
        let session = controller
            .restore(&state, &mut sink, 0.5, Box::new(|_| {}))
            .expect("restore");

        let plays = sink.plays();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].source, std::path::PathBuf::from("song.mp3"));
        assert_eq!(plays[0].start_at, Duration::from_secs(7));
        assert_eq!(plays[0].gain, 0.5);
        assert!(session.elapsed(Instant::now()) >= Duration::from_secs(7));
    }

    #[test]
    fn restore_stops_a_lingering_stream_first() {
        let controller = InterruptController::new(IdleWait {
            timeout: Duration::from_millis(10),
            poll_initial: Duration::from_millis(1),
            poll_max: Duration::from_millis(2),
        });
        let mut sink = ScriptedSink::with_channels(&["main"]);
        sink.play(
            PlayRequest {
                source: "clip.mp3".into(),
                gain: 1.0,
                start_at: Duration::ZERO,
            },
            Box::new(|_| {}),
        )
        .expect("clip play");

        let state = InterruptState {
            track: Track::from("song.mp3"),
            offset: Duration::from_secs(1),
            was_paused: false,
        };
        controller
            .restore(&state, &mut sink, 1.0, Box::new(|_| {}))
            .expect("restore");
        assert_eq!(sink.stops(), 1);
        assert_eq!(sink.plays().len(), 2);
    }
}
