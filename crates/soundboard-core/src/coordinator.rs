//! Playback coordinator.
//!
//! A single worker thread owns the queue, the playback session, the saved interrupt state
//! and the sink. Callers talk to it through [`CoordinatorHandle`]; sink completions are
//! posted onto the same channel, so every transition is serialized in arrival order.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::config::CoordinatorConfig;
use crate::error::{ConnectionError, CoordinatorError};
use crate::events::EventBus;
use crate::interrupt::{InterruptController, InterruptState};
use crate::queue::{Track, TrackQueue};
use crate::session::PlaybackSession;
use crate::sink::{CompletionCallback, IdleWait, OutputSink, PlayRequest, SinkError};
use crate::state::{PlaybackState, StreamKind};
use crate::status::StatusSnapshot;
use crate::volume::VolumeController;

/// Floor for the delay before retrying a start the sink refused as busy.
const RETRY_MIN: Duration = Duration::from_millis(100);

/// Messages accepted by the coordinator worker.
enum Message {
    Connect {
        channel: String,
        reply: Sender<Result<(), ConnectionError>>,
    },
    Disconnect {
        reply: Sender<()>,
    },
    Enqueue {
        track: Track,
        reply: Sender<()>,
    },
    Pause {
        reply: Sender<PlaybackState>,
    },
    Resume {
        reply: Sender<PlaybackState>,
    },
    Stop {
        reply: Sender<PlaybackState>,
    },
    Skip {
        reply: Sender<PlaybackState>,
    },
    Interrupt {
        clip: Track,
        reply: Sender<Result<(), ConnectionError>>,
    },
    SetPrimaryGain {
        gain: f32,
        reply: Sender<f32>,
    },
    SetInterruptGain {
        gain: f32,
        reply: Sender<f32>,
    },
    Snapshot {
        reply: Sender<StatusSnapshot>,
    },
    /// Posted by a sink completion callback.
    SinkCompleted {
        occupancy: u64,
        error: Option<SinkError>,
    },
    Shutdown {
        reply: Sender<()>,
    },
}

/// Cloneable handle for issuing coordinator commands.
///
/// Every call blocks until the worker has applied the command.
#[derive(Clone)]
pub struct CoordinatorHandle {
    cmd_tx: Sender<Message>,
}

impl CoordinatorHandle {
    fn request<T>(&self, build: impl FnOnce(Sender<T>) -> Message) -> Result<T, CoordinatorError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.cmd_tx
            .send(build(reply_tx))
            .map_err(|_| CoordinatorError::Offline)?;
        reply_rx.recv().map_err(|_| CoordinatorError::Offline)
    }

    /// Attach to `channel`. Starts the queue head if tracks are pending.
    pub fn connect(&self, channel: &str) -> Result<(), CoordinatorError> {
        self.request(|reply| Message::Connect {
            channel: channel.to_string(),
            reply,
        })?
        .map_err(CoordinatorError::from)
    }

    /// Stop playback and detach. Pending tracks are kept.
    pub fn disconnect(&self) -> Result<(), CoordinatorError> {
        self.request(|reply| Message::Disconnect { reply })
    }

    pub fn enqueue(&self, track: Track) -> Result<(), CoordinatorError> {
        self.request(|reply| Message::Enqueue { track, reply })
    }

    pub fn pause(&self) -> Result<PlaybackState, CoordinatorError> {
        self.request(|reply| Message::Pause { reply })
    }

    pub fn resume(&self) -> Result<PlaybackState, CoordinatorError> {
        self.request(|reply| Message::Resume { reply })
    }

    /// Stop the sink and clear the queue.
    pub fn stop(&self) -> Result<PlaybackState, CoordinatorError> {
        self.request(|reply| Message::Stop { reply })
    }

    pub fn skip(&self) -> Result<PlaybackState, CoordinatorError> {
        self.request(|reply| Message::Skip { reply })
    }

    /// Play `clip` over the current track, which resumes where it left off afterwards.
    pub fn trigger_interrupt(&self, clip: Track) -> Result<(), CoordinatorError> {
        self.request(|reply| Message::Interrupt { clip, reply })?
            .map_err(CoordinatorError::from)
    }

    /// Returns the gain actually stored after clamping.
    pub fn set_primary_gain(&self, gain: f32) -> Result<f32, CoordinatorError> {
        self.request(|reply| Message::SetPrimaryGain { gain, reply })
    }

    /// Returns the gain actually stored after clamping.
    pub fn set_interrupt_gain(&self, gain: f32) -> Result<f32, CoordinatorError> {
        self.request(|reply| Message::SetInterruptGain { gain, reply })
    }

    pub fn snapshot(&self) -> Result<StatusSnapshot, CoordinatorError> {
        self.request(|reply| Message::Snapshot { reply })
    }

    /// Stop the sink, detach and end the worker.
    pub fn shutdown(&self) -> Result<(), CoordinatorError> {
        self.request(|reply| Message::Shutdown { reply })
    }
}

/// Owner of the coordinator worker thread.
pub struct Coordinator {
    handle: CoordinatorHandle,
    join: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Spawn the worker that owns `sink`.
    pub fn spawn(sink: Box<dyn OutputSink>, config: CoordinatorConfig, events: EventBus) -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let worker = Worker::new(sink, config, events, cmd_tx.clone());
        let join = std::thread::spawn(move || worker.run(cmd_rx));
        Self {
            handle: CoordinatorHandle { cmd_tx },
            join: Some(join),
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Shut the worker down and wait for it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.handle.shutdown();
        if join.join().is_err() {
            tracing::error!("coordinator worker panicked");
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The stream currently occupying the sink.
struct LiveStream {
    occupancy: u64,
    kind: StreamKind,
    source: Track,
}

/// Values watched for change notifications.
struct Observed {
    state: PlaybackState,
    queue: Vec<Track>,
    stop_enabled: bool,
    now_playing: Option<Track>,
}

struct Worker {
    sink: Box<dyn OutputSink>,
    completions: Sender<Message>,
    events: EventBus,
    state: PlaybackState,
    queue: TrackQueue,
    session: Option<PlaybackSession>,
    saved: Option<InterruptState>,
    live: Option<LiveStream>,
    interrupts: InterruptController,
    volume: VolumeController,
    idle_wait: IdleWait,
    next_occupancy: u64,
    /// Set while a start is deferred because the sink has not confirmed a stop.
    retry_at: Option<Instant>,
}

impl Worker {
    fn new(
        sink: Box<dyn OutputSink>,
        config: CoordinatorConfig,
        events: EventBus,
        completions: Sender<Message>,
    ) -> Self {
        Self {
            sink,
            completions,
            events,
            state: PlaybackState::Disconnected,
            queue: TrackQueue::new(),
            session: None,
            saved: None,
            live: None,
            interrupts: InterruptController::new(config.idle_wait),
            volume: VolumeController::new(config.volume),
            idle_wait: config.idle_wait,
            next_occupancy: 0,
            retry_at: None,
        }
    }

    fn run(mut self, cmd_rx: Receiver<Message>) {
        loop {
            let msg = match self.retry_at {
                Some(deadline) => match cmd_rx.recv_deadline(deadline) {
                    Ok(msg) => Some(msg),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match cmd_rx.recv() {
                    Ok(msg) => Some(msg),
                    Err(_) => break,
                },
            };
            let before = self.observe();
            let done = match msg {
                Some(msg) => self.handle(msg),
                None => {
                    self.retry();
                    false
                }
            };
            self.publish_changes(before);
            if done {
                break;
            }
        }
        tracing::debug!("coordinator worker exited");
    }

    /// Apply one message. Returns `true` when the worker should exit.
    fn handle(&mut self, msg: Message) -> bool {
        match msg {
            Message::Connect { channel, reply } => {
                let _ = reply.send(self.connect(&channel));
            }
            Message::Disconnect { reply } => {
                self.disconnect();
                let _ = reply.send(());
            }
            Message::Enqueue { track, reply } => {
                self.enqueue(track);
                let _ = reply.send(());
            }
            Message::Pause { reply } => {
                self.pause();
                let _ = reply.send(self.state);
            }
            Message::Resume { reply } => {
                self.resume();
                let _ = reply.send(self.state);
            }
            Message::Stop { reply } => {
                self.stop();
                let _ = reply.send(self.state);
            }
            Message::Skip { reply } => {
                self.skip();
                let _ = reply.send(self.state);
            }
            Message::Interrupt { clip, reply } => {
                let _ = reply.send(self.trigger_interrupt(clip));
            }
            Message::SetPrimaryGain { gain, reply } => {
                let live = self.live.as_ref().map(|l| l.kind);
                let gain = self.volume.set_primary(gain, live, self.sink.as_mut());
                let _ = reply.send(gain);
            }
            Message::SetInterruptGain { gain, reply } => {
                let live = self.live.as_ref().map(|l| l.kind);
                let gain = self.volume.set_interrupt(gain, live, self.sink.as_mut());
                let _ = reply.send(gain);
            }
            Message::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Message::SinkCompleted { occupancy, error } => {
                self.on_sink_completed(occupancy, error);
            }
            Message::Shutdown { reply } => {
                if self.state.is_connected() {
                    self.halt_sink();
                    self.sink.disconnect();
                }
                self.session = None;
                self.saved = None;
                self.state = PlaybackState::Disconnected;
                tracing::info!("coordinator shut down");
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn connect(&mut self, channel: &str) -> Result<(), ConnectionError> {
        if self.state.is_connected() {
            return Err(ConnectionError::AlreadyConnected);
        }
        self.sink.connect(channel)?;
        self.state = PlaybackState::Idle;
        tracing::info!(channel, pending = self.queue.len(), "connected");
        if !self.queue.is_empty() {
            self.advance();
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        self.halt_sink();
        self.sink.disconnect();
        self.session = None;
        self.saved = None;
        self.retry_at = None;
        self.state = PlaybackState::Disconnected;
        tracing::info!(pending = self.queue.len(), "disconnected");
    }

    fn enqueue(&mut self, track: Track) {
        tracing::info!(track = %track, "track enqueued");
        self.queue.enqueue(track);
        if self.state == PlaybackState::Idle {
            self.advance();
        }
    }

    fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.sink.pause();
        if let Some(session) = self.session.as_mut() {
            session.pause(Instant::now());
        }
        self.state = PlaybackState::Paused;
        tracing::info!("playback paused");
    }

    fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        let live_primary = self
            .live
            .as_ref()
            .is_some_and(|l| l.kind == StreamKind::Primary);
        if live_primary {
            self.sink.resume();
            if let Some(session) = self.session.as_mut() {
                session.resume(Instant::now());
            }
            self.state = PlaybackState::Playing;
            tracing::info!("playback resumed");
            return;
        }
        // Paused behind a finished quick sound: nothing is loaded on the sink.
        match self.session.take() {
            Some(session) => {
                let saved = InterruptState {
                    offset: session.elapsed(Instant::now()),
                    track: session.track().clone(),
                    was_paused: false,
                };
                self.restore(saved);
            }
            None => self.advance(),
        }
    }

    fn stop(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        self.halt_sink();
        let cleared = self.queue.clear();
        self.session = None;
        self.saved = None;
        self.retry_at = None;
        self.state = PlaybackState::Idle;
        tracing::info!(cleared, "playback stopped");
    }

    fn skip(&mut self) {
        match self.state {
            PlaybackState::Playing | PlaybackState::Paused => {
                if let Some(session) = self.session.as_ref() {
                    tracing::info!(track = %session.track(), "skipping track");
                }
                self.halt_sink();
                self.session = None;
                self.advance();
            }
            PlaybackState::Interrupted => {
                if let Some(saved) = self.saved.take() {
                    tracing::info!(track = %saved.track, "interrupted track dropped");
                }
            }
            PlaybackState::Idle | PlaybackState::Disconnected => {}
        }
    }

    fn trigger_interrupt(&mut self, clip: Track) -> Result<(), ConnectionError> {
        match self.state {
            PlaybackState::Disconnected => return Err(ConnectionError::NotConnected),
            PlaybackState::Playing | PlaybackState::Paused => {
                if let Some(session) = self.session.take() {
                    self.saved = Some(self.interrupts.capture(&session, Instant::now()));
                }
                self.halt_sink();
            }
            PlaybackState::Interrupted => {
                tracing::debug!("replacing active quick sound");
                self.halt_sink();
            }
            PlaybackState::Idle => {
                self.saved = None;
            }
        }

        tracing::info!(clip = %clip, "quick sound starting");
        match self.start_stream(clip.clone(), StreamKind::Interrupt, Duration::ZERO) {
            Ok(()) => self.state = PlaybackState::Interrupted,
            Err(err) => {
                tracing::warn!(clip = %clip, error = %err, "quick sound failed to start");
                self.finish_interrupt();
            }
        }
        Ok(())
    }

    fn on_sink_completed(&mut self, occupancy: u64, error: Option<SinkError>) {
        let current = self
            .live
            .as_ref()
            .is_some_and(|l| l.occupancy == occupancy);
        if !current {
            tracing::debug!(occupancy, "stale completion ignored");
            return;
        }
        let Some(live) = self.live.take() else {
            return;
        };
        match error {
            Some(err) => tracing::warn!(track = %live.source, error = %err, "playback ended with error"),
            None => tracing::debug!(track = %live.source, "playback finished"),
        }
        match live.kind {
            StreamKind::Interrupt => self.finish_interrupt(),
            StreamKind::Primary => {
                self.session = None;
                self.advance();
            }
        }
    }

    /// Hand the sink back after a quick sound.
    fn finish_interrupt(&mut self) {
        match self.saved.take() {
            Some(saved) if saved.was_paused => {
                let now = Instant::now();
                let mut session = PlaybackSession::start_at_offset(saved.track, saved.offset, now);
                session.pause(now);
                self.session = Some(session);
                self.state = PlaybackState::Paused;
            }
            Some(saved) => self.restore(saved),
            None => {
                self.state = PlaybackState::Idle;
                self.advance();
            }
        }
    }

    fn restore(&mut self, saved: InterruptState) {
        let (occupancy, on_complete) = self.completion();
        let gain = self.volume.gain_for(StreamKind::Primary);
        match self
            .interrupts
            .restore(&saved, self.sink.as_mut(), gain, on_complete)
        {
            Ok(session) => {
                self.live = Some(LiveStream {
                    occupancy,
                    kind: StreamKind::Primary,
                    source: saved.track,
                });
                self.session = Some(session);
                self.state = PlaybackState::Playing;
            }
            Err(err) if err.is_busy() => {
                tracing::warn!(track = %saved.track, error = %err, "sink busy; restore deferred");
                self.saved = Some(saved);
                self.state = PlaybackState::Interrupted;
                self.schedule_retry();
            }
            Err(err) => {
                tracing::warn!(track = %saved.track, error = %err, "restore failed; advancing");
                self.session = None;
                self.advance();
            }
        }
    }

    /// Start the next playable queued track, or go idle.
    fn advance(&mut self) {
        if !self.state.is_connected() {
            return;
        }
        self.session = None;
        if !self.queue.is_empty() && !self.ensure_idle() {
            self.state = PlaybackState::Idle;
            self.schedule_retry();
            return;
        }
        while let Some(track) = self.queue.dequeue_head() {
            match self.start_stream(track.clone(), StreamKind::Primary, Duration::ZERO) {
                Ok(()) => {
                    tracing::info!(track = %track, "now playing");
                    self.session = Some(PlaybackSession::start(track, Instant::now()));
                    self.state = PlaybackState::Playing;
                    return;
                }
                Err(err) if err.is_busy() => {
                    self.queue.requeue_head(track);
                    self.state = PlaybackState::Idle;
                    self.schedule_retry();
                    return;
                }
                Err(err) => {
                    tracing::warn!(track = %track, error = %err, "sink rejected track; trying next");
                }
            }
        }
        self.state = PlaybackState::Idle;
    }

    fn start_stream(
        &mut self,
        track: Track,
        kind: StreamKind,
        start_at: Duration,
    ) -> Result<(), SinkError> {
        let (occupancy, on_complete) = self.completion();
        let request = PlayRequest {
            source: track.path().to_path_buf(),
            gain: self.volume.gain_for(kind),
            start_at,
        };
        self.sink.play(request, on_complete)?;
        self.live = Some(LiveStream {
            occupancy,
            kind,
            source: track,
        });
        Ok(())
    }

    /// Fresh occupancy id and the callback that reports it.
    fn completion(&mut self) -> (u64, CompletionCallback) {
        let occupancy = self.next_occupancy;
        self.next_occupancy += 1;
        let tx = self.completions.clone();
        let on_complete: CompletionCallback = Box::new(move |error| {
            let _ = tx.send(Message::SinkCompleted { occupancy, error });
        });
        (occupancy, on_complete)
    }

    /// Abandon the live stream and wait for the sink to confirm the stop.
    fn halt_sink(&mut self) {
        let had_live = self.live.take().is_some();
        if had_live || !self.sink.is_idle() {
            self.sink.stop();
            if !self.sink.wait_idle(&self.idle_wait) {
                tracing::warn!("sink did not confirm stop in time");
            }
        }
    }

    /// Returns `false` if the sink is still occupied after a forced stop.
    fn ensure_idle(&mut self) -> bool {
        if self.sink.is_idle() || self.sink.wait_idle(&self.idle_wait) {
            return true;
        }
        tracing::warn!("sink still busy; forcing stop");
        self.sink.stop();
        self.sink.wait_idle(&self.idle_wait)
    }

    /// Try the deferred start again after the sink had time to settle.
    fn schedule_retry(&mut self) {
        let delay = self.idle_wait.timeout.max(RETRY_MIN);
        tracing::warn!(
            pending = self.queue.len(),
            retry_ms = delay.as_millis() as u64,
            "sink busy; start deferred"
        );
        self.retry_at = Some(Instant::now() + delay);
    }

    fn retry(&mut self) {
        self.retry_at = None;
        if self.live.is_some() {
            return;
        }
        match self.state {
            PlaybackState::Idle => self.advance(),
            // Saved track waiting on a sink that was still busy after the clip.
            PlaybackState::Interrupted => self.finish_interrupt(),
            _ => {}
        }
    }

    fn stop_enabled(&self) -> bool {
        self.state.is_connected()
            && (self.live.is_some() || self.session.is_some() || !self.queue.is_empty())
    }

    fn snapshot(&self) -> StatusSnapshot {
        let now = Instant::now();
        StatusSnapshot {
            state: self.state,
            now_playing: self.session.as_ref().map(|s| s.track().clone()),
            elapsed_ms: self
                .session
                .as_ref()
                .map(|s| s.elapsed(now).as_millis() as u64),
            queue: self.queue.snapshot(),
            interrupted_track: self.saved.as_ref().map(|s| s.track.clone()),
            interrupted_at_ms: self.saved.as_ref().map(|s| s.offset.as_millis() as u64),
            clip: self
                .live
                .as_ref()
                .filter(|l| l.kind == StreamKind::Interrupt)
                .map(|l| l.source.clone()),
            volume: self.volume.settings(),
            stop_enabled: self.stop_enabled(),
        }
    }

    fn observe(&self) -> Observed {
        Observed {
            state: self.state,
            queue: self.queue.snapshot(),
            stop_enabled: self.stop_enabled(),
            now_playing: self.session.as_ref().map(|s| s.track().clone()),
        }
    }

    fn publish_changes(&self, before: Observed) {
        let after = self.observe();
        if after.state != before.state {
            tracing::debug!(from = ?before.state, to = ?after.state, "state changed");
            self.events.state_changed(after.state);
        }
        if after.queue != before.queue {
            self.events.queue_changed(after.queue);
        }
        if after.stop_enabled != before.stop_enabled {
            self.events.stop_control(after.stop_enabled);
        }
        if after.now_playing != before.now_playing {
            self.events.now_playing(after.now_playing);
        }
    }
}
