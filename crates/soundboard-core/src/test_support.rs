//! In-memory sink for driving the coordinator from tests.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::ConnectionError;
use crate::sink::{CompletionCallback, OutputSink, PlayRequest, SinkError};

#[derive(Default)]
struct ScriptedState {
    channels: Vec<String>,
    connected: Option<String>,
    plays: Vec<PlayRequest>,
    current: Option<CompletionCallback>,
    paused: bool,
    gain_changes: Vec<f32>,
    stops: usize,
    /// `stop` is recorded but the stream keeps occupying the sink.
    stop_held: bool,
    rejected: Vec<PathBuf>,
}

/// Records every call; completions fire only when the test calls [`ScriptedSink::finish`]
/// or the coordinator calls `stop`.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSink {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedSink {
    pub(crate) fn with_channels(channels: &[&str]) -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().channels = channels.iter().map(|c| c.to_string()).collect();
        sink
    }

    /// Make `play` fail for this source.
    pub(crate) fn reject(&self, source: &str) {
        self.state.lock().unwrap().rejected.push(PathBuf::from(source));
    }

    /// Simulate a renderer that has not confirmed stops yet; `finish` still releases it.
    pub(crate) fn hold_stops(&self, held: bool) {
        self.state.lock().unwrap().stop_held = held;
    }

    pub(crate) fn plays(&self) -> Vec<PlayRequest> {
        self.state.lock().unwrap().plays.clone()
    }

    pub(crate) fn gain_changes(&self) -> Vec<f32> {
        self.state.lock().unwrap().gain_changes.clone()
    }

    pub(crate) fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected.is_some()
    }

    /// End the current stream as if it ran out. Returns `false` if nothing was playing.
    pub(crate) fn finish(&self, error: Option<SinkError>) -> bool {
        let callback = {
            let mut state = self.state.lock().unwrap();
            state.paused = false;
            state.current.take()
        };
        match callback {
            Some(callback) => {
                callback(error);
                true
            }
            None => false,
        }
    }
}

impl OutputSink for ScriptedSink {
    fn connect(&mut self, channel: &str) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().unwrap();
        if state.connected.is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }
        if !state.channels.iter().any(|c| c == channel) {
            return Err(ConnectionError::ChannelNotFound {
                channel: channel.to_string(),
            });
        }
        state.connected = Some(channel.to_string());
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().connected = None;
    }

    fn play(
        &mut self,
        request: PlayRequest,
        on_complete: CompletionCallback,
    ) -> Result<(), SinkError> {
        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(&request.source) {
            return Err(SinkError::new(format!(
                "unplayable source {}",
                request.source.display()
            )));
        }
        if state.current.is_some() {
            return Err(SinkError::busy("sink busy"));
        }
        state.plays.push(request);
        state.current = Some(on_complete);
        state.paused = false;
        Ok(())
    }

    fn stop(&mut self) {
        let callback = {
            let mut state = self.state.lock().unwrap();
            state.stops += 1;
            if state.stop_held {
                return;
            }
            state.paused = false;
            state.current.take()
        };
        if let Some(callback) = callback {
            callback(None);
        }
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.current.is_some() {
            state.paused = true;
        }
    }

    fn resume(&mut self) {
        self.state.lock().unwrap().paused = false;
    }

    fn is_playing(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.current.is_some() && !state.paused
    }

    fn is_paused(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.current.is_some() && state.paused
    }

    fn set_gain(&mut self, gain: f32) {
        self.state.lock().unwrap().gain_changes.push(gain);
    }
}
