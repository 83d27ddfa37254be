//! Output sink contract.
//!
//! A sink hosts exactly one audio stream at a time. Decoding and transport live behind this
//! trait; the coordinator is the only caller that mutates it.

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::ConnectionError;

/// Failure reported by a sink while starting or playing a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkError {
    message: String,
    busy: bool,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            busy: false,
        }
    }

    /// `play` refused because a previous stream still occupies the sink.
    pub fn busy(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            busy: true,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The source may be fine; retry once the sink is idle.
    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SinkError {}

/// Invoked exactly once when a started stream ends: naturally, on error, or after `stop`.
///
/// May run on any thread. A `play` call that returns `Err` drops its callback unused.
pub type CompletionCallback = Box<dyn FnOnce(Option<SinkError>) + Send + 'static>;

/// Stream start parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayRequest {
    /// Playable resource (file path or URL).
    pub source: PathBuf,
    /// Initial gain in `[0.0, 1.0]`.
    pub gain: f32,
    /// Position to seek to before producing audio.
    pub start_at: Duration,
}

/// Bounds for waiting on a sink to go idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleWait {
    /// Give up after this long.
    pub timeout: Duration,
    /// First poll interval for sinks without a stop-confirmed signal.
    pub poll_initial: Duration,
    /// Poll interval cap; the interval doubles up to this value.
    pub poll_max: Duration,
}

impl Default for IdleWait {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            poll_initial: Duration::from_millis(5),
            poll_max: Duration::from_millis(100),
        }
    }
}

/// Single-stream audio output.
pub trait OutputSink: Send {
    /// Attach to the named output channel.
    fn connect(&mut self, channel: &str) -> Result<(), ConnectionError>;

    /// Detach from the current channel. Callers stop the stream first.
    fn disconnect(&mut self);

    /// Start a stream. Fails with [`SinkError::busy`] if another stream still occupies the sink.
    fn play(&mut self, request: PlayRequest, on_complete: CompletionCallback)
        -> Result<(), SinkError>;

    /// End the current stream, if any. Its completion callback still fires.
    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// `true` while a stream is producing audio (not paused).
    fn is_playing(&self) -> bool;

    /// `true` while a stream is held paused.
    fn is_paused(&self) -> bool;

    /// Change the gain of the active stream in place.
    fn set_gain(&mut self, gain: f32);

    fn is_idle(&self) -> bool {
        !self.is_playing() && !self.is_paused()
    }

    /// Block until the sink reports idle. Returns `false` if `wait.timeout` elapses first.
    ///
    /// The default polls with exponential backoff. Sinks that can signal stop
    /// confirmation should override this with a blocking wait on that signal.
    fn wait_idle(&self, wait: &IdleWait) -> bool {
        poll_with_backoff(wait, || self.is_idle())
    }
}

/// Poll `ready` until it returns `true` or the wait times out.
pub fn poll_with_backoff(wait: &IdleWait, mut ready: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + wait.timeout;
    let mut interval = wait.poll_initial.max(Duration::from_millis(1));
    loop {
        if ready() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        std::thread::sleep(interval.min(deadline - now));
        interval = (interval * 2).min(wait.poll_max.max(interval));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn poll_with_backoff_returns_once_ready() {
        let calls = Cell::new(0);
        let wait = IdleWait {
            timeout: Duration::from_secs(1),
            poll_initial: Duration::from_millis(1),
            poll_max: Duration::from_millis(4),
        };
        let ready = poll_with_backoff(&wait, || {
            calls.set(calls.get() + 1);
            calls.get() >= 3
        });
        assert!(ready);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn poll_with_backoff_times_out() {
        let wait = IdleWait {
            timeout: Duration::from_millis(20),
            poll_initial: Duration::from_millis(1),
            poll_max: Duration::from_millis(8),
        };
        let started = Instant::now();
        assert!(!poll_with_backoff(&wait, || false));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sink_error_displays_message() {
        let err = SinkError::new("decoder exited");
        assert_eq!(err.to_string(), "decoder exited");
        assert_eq!(err.message(), "decoder exited");
        assert!(!err.is_busy());
        assert!(SinkError::busy("still rendering").is_busy());
    }
}
