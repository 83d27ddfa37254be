//! Output sink backed by a remote audio-bridge renderer.
//!
//! Control calls go over the bridge HTTP API; a watcher thread polls `/status` and turns
//! end-of-stream reports into completion callbacks.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use soundboard_core::error::ConnectionError;
use soundboard_core::sink::{CompletionCallback, IdleWait, OutputSink, PlayRequest, SinkError};
use soundboard_core::volume::clamp_gain;

/// Ignore end reports this soon after `play` unless the bridge has shown the new stream.
const START_GRACE: Duration = Duration::from_secs(2);
/// Consecutive failed status polls before the stream is declared lost.
const MAX_STATUS_FAILURES: u32 = 5;

/// Device list returned by the bridge.
#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<DeviceInfo>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceInfo {
    pub name: String,
}

/// Why the bridge's last stream ended.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Eof,
    Error,
    Stopped,
}

/// Subset of the bridge status payload the sink relies on.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeStatus {
    pub now_playing: Option<String>,
    pub paused: bool,
    pub elapsed_ms: Option<u64>,
    pub end_reason: Option<EndReason>,
}

#[derive(Debug, Serialize)]
struct PlayBody<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seek_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct VolumeBody {
    value: u8,
}

/// HTTP client for bridge control and status.
#[derive(Clone)]
pub struct BridgeClient {
    http_addr: SocketAddr,
    token: Option<String>,
    timeout: Duration,
}

impl BridgeClient {
    pub fn new(http_addr: SocketAddr, token: Option<String>) -> Self {
        Self {
            http_addr,
            token,
            timeout: Duration::from_secs(2),
        }
    }

    fn get(&self, path: &str) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        let url = format!("http://{}{path}", self.http_addr);
        let req = ureq::get(&url)
            .config()
            .timeout_per_call(Some(self.timeout))
            .build();
        match self.token.as_deref() {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    fn post(&self, path: &str) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        let url = format!("http://{}{path}", self.http_addr);
        let req = ureq::post(&url)
            .config()
            .timeout_per_call(Some(self.timeout))
            .build();
        match self.token.as_deref() {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut resp = self
            .get("/devices")
            .call()
            .map_err(|e| anyhow::anyhow!("http devices request failed: {e}"))?;
        let resp: DevicesResponse = resp
            .body_mut()
            .read_json()
            .map_err(|e| anyhow::anyhow!("http devices decode failed: {e}"))?;
        Ok(resp.devices)
    }

    pub fn select_device(&self, name: &str) -> Result<()> {
        self.post("/devices/select")
            .send_json(serde_json::json!({ "name": name }))
            .map_err(|e| anyhow::anyhow!("http select device failed: {e}"))?;
        Ok(())
    }

    pub fn play(&self, url: &str, seek_ms: Option<u64>) -> Result<()> {
        self.post("/play")
            .send_json(PlayBody { url, seek_ms })
            .map_err(|e| anyhow::anyhow!("http play failed: {e}"))?;
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.post("/pause")
            .send_json(serde_json::json!({}))
            .map_err(|e| anyhow::anyhow!("http pause failed: {e}"))?;
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.post("/resume")
            .send_json(serde_json::json!({}))
            .map_err(|e| anyhow::anyhow!("http resume failed: {e}"))?;
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.post("/stop")
            .send_json(serde_json::json!({}))
            .map_err(|e| anyhow::anyhow!("http stop failed: {e}"))?;
        Ok(())
    }

    pub fn set_volume(&self, value: u8) -> Result<()> {
        self.post("/volume")
            .send_json(VolumeBody { value })
            .map_err(|e| anyhow::anyhow!("http volume failed: {e}"))?;
        Ok(())
    }

    pub fn status(&self) -> Result<BridgeStatus> {
        let mut resp = self
            .get("/status")
            .call()
            .map_err(|e| anyhow::anyhow!("http status request failed: {e}"))?;
        let status: BridgeStatus = resp
            .body_mut()
            .read_json()
            .map_err(|e| anyhow::anyhow!("http status decode failed: {e}"))?;
        Ok(status)
    }
}

/// The stream the bridge is expected to be rendering.
struct StreamSlot {
    token: u64,
    started: Instant,
    paused: bool,
    seen_active: bool,
    on_complete: Option<CompletionCallback>,
}

/// State shared with the status watcher.
struct Shared {
    slot: Mutex<Option<StreamSlot>>,
    /// Notified whenever the slot is cleared.
    idle: Condvar,
    running: AtomicBool,
}

impl Shared {
    fn lock_slot(&self) -> MutexGuard<'_, Option<StreamSlot>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current_token(&self) -> Option<u64> {
        self.lock_slot().as_ref().map(|s| s.token)
    }

    /// Clear the slot if it still holds `token` and fire its callback.
    fn finish(&self, token: u64, error: Option<SinkError>) {
        let callback = {
            let mut slot = self.lock_slot();
            if slot.as_ref().is_none_or(|s| s.token != token) {
                return;
            }
            let callback = slot.take().and_then(|mut s| s.on_complete.take());
            self.idle.notify_all();
            callback
        };
        if let Some(callback) = callback {
            callback(error);
        }
    }
}

#[derive(Debug, PartialEq)]
enum Verdict {
    /// Bridge has not picked up the new stream yet.
    Starting,
    Active,
    Ended(Option<SinkError>),
}

/// Interpret a status report for a stream started `since_start` ago.
fn classify(seen_active: bool, since_start: Duration, status: &BridgeStatus) -> Verdict {
    if status.end_reason.is_none() && status.now_playing.is_some() {
        return Verdict::Active;
    }
    let settled = seen_active || since_start >= START_GRACE;
    if !settled {
        return Verdict::Starting;
    }
    match status.end_reason {
        Some(EndReason::Error) => {
            Verdict::Ended(Some(SinkError::new("bridge reported a playback error")))
        }
        Some(EndReason::Eof) | Some(EndReason::Stopped) => Verdict::Ended(None),
        None if seen_active => Verdict::Ended(None),
        None => Verdict::Ended(Some(SinkError::new("bridge never started the stream"))),
    }
}

/// URL the bridge should fetch for `source`.
fn stream_url(media_base_url: Option<&str>, source: &Path) -> String {
    let raw = source.to_string_lossy();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return raw.into_owned();
    }
    match media_base_url {
        Some(base) => format!(
            "{}/stream?path={}",
            base.trim_end_matches('/'),
            urlencoding::encode(&raw)
        ),
        None => raw.into_owned(),
    }
}

fn gain_to_percent(gain: f32) -> u8 {
    (clamp_gain(gain) * 100.0).round() as u8
}

/// [`OutputSink`] that drives one bridge device.
pub struct BridgeSink {
    client: BridgeClient,
    media_base_url: Option<String>,
    poll_interval: Duration,
    shared: Arc<Shared>,
    watcher: Option<JoinHandle<()>>,
    connected: Option<String>,
    next_token: u64,
}

impl BridgeSink {
    pub fn new(client: BridgeClient, media_base_url: Option<String>, poll_interval: Duration) -> Self {
        Self {
            client,
            media_base_url,
            poll_interval,
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                idle: Condvar::new(),
                running: AtomicBool::new(false),
            }),
            watcher: None,
            connected: None,
            next_token: 0,
        }
    }

    fn start_watcher(&mut self) {
        if self.watcher.is_some() {
            return;
        }
        self.shared.running.store(true, Ordering::Relaxed);
        let client = self.client.clone();
        let shared = self.shared.clone();
        let poll = self.poll_interval;
        self.watcher = Some(std::thread::spawn(move || watch_status(client, shared, poll)));
    }

    fn stop_watcher(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
        if let Some(join) = self.watcher.take() {
            let _ = join.join();
        }
    }

    fn set_paused(&self, paused: bool) {
        if let Some(stream) = self.shared.lock_slot().as_mut() {
            stream.paused = paused;
        }
    }
}

fn watch_status(client: BridgeClient, shared: Arc<Shared>, poll: Duration) {
    tracing::debug!("bridge status watcher start");
    let mut failures = 0u32;
    while shared.running.load(Ordering::Relaxed) {
        std::thread::sleep(poll);
        let Some(token) = shared.current_token() else {
            failures = 0;
            continue;
        };
        let status = match client.status() {
            Ok(status) => {
                failures = 0;
                status
            }
            Err(err) => {
                failures += 1;
                tracing::debug!(error = %err, failures, "bridge status poll failed");
                if failures >= MAX_STATUS_FAILURES {
                    failures = 0;
                    shared.finish(token, Some(SinkError::new(format!("bridge unreachable: {err}"))));
                }
                continue;
            }
        };
        let verdict = {
            let mut slot = shared.lock_slot();
            let Some(stream) = slot.as_mut().filter(|s| s.token == token) else {
                continue;
            };
            let verdict = classify(stream.seen_active, stream.started.elapsed(), &status);
            if verdict == Verdict::Active {
                stream.seen_active = true;
            }
            verdict
        };
        if let Verdict::Ended(error) = verdict {
            tracing::debug!(
                token,
                end_reason = ?status.end_reason,
                elapsed_ms = ?status.elapsed_ms,
                paused = status.paused,
                "bridge stream ended"
            );
            shared.finish(token, error);
        }
    }
    tracing::debug!("bridge status watcher stop");
}

impl OutputSink for BridgeSink {
    fn connect(&mut self, channel: &str) -> Result<(), ConnectionError> {
        if self.connected.is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }
        let devices = self
            .client
            .list_devices()
            .map_err(|e| ConnectionError::Unavailable {
                reason: format!("{e:#}"),
            })?;
        if !devices.iter().any(|d| d.name == channel) {
            return Err(ConnectionError::ChannelNotFound {
                channel: channel.to_string(),
            });
        }
        self.client
            .select_device(channel)
            .map_err(|e| ConnectionError::Unavailable {
                reason: format!("{e:#}"),
            })?;
        self.start_watcher();
        self.connected = Some(channel.to_string());
        tracing::info!(device = channel, "bridge device selected");
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.shared.current_token().is_some() {
            self.stop();
        }
        self.stop_watcher();
        // Nothing watches the bridge any more; release a stream it never confirmed.
        if let Some(token) = self.shared.current_token() {
            self.shared
                .finish(token, Some(SinkError::new("bridge stop unconfirmed at disconnect")));
        }
        if let Some(device) = self.connected.take() {
            tracing::info!(device = %device, "bridge device released");
        }
    }

    fn play(
        &mut self,
        request: PlayRequest,
        on_complete: CompletionCallback,
    ) -> Result<(), SinkError> {
        if self.connected.is_none() {
            return Err(SinkError::new("bridge sink not connected"));
        }
        if self.shared.current_token().is_some() {
            return Err(SinkError::busy("bridge sink busy"));
        }
        let url = stream_url(self.media_base_url.as_deref(), &request.source);
        let seek_ms = Some(request.start_at.as_millis() as u64).filter(|ms| *ms > 0);
        // Gain first so the stream never starts at the previous stream's level.
        if let Err(err) = self.client.set_volume(gain_to_percent(request.gain)) {
            tracing::warn!(error = %err, "bridge volume update failed");
        }
        self.client
            .play(&url, seek_ms)
            .map_err(|e| SinkError::new(format!("{e:#}")))?;

        let token = self.next_token;
        self.next_token += 1;
        *self.shared.lock_slot() = Some(StreamSlot {
            token,
            started: Instant::now(),
            paused: false,
            seen_active: false,
            on_complete: Some(on_complete),
        });
        tracing::debug!(url = %url, seek_ms = ?seek_ms, token, "bridge play sent");
        Ok(())
    }

    fn stop(&mut self) {
        let token = self.shared.current_token();
        match (self.client.stop(), token) {
            (Ok(()), Some(token)) => self.shared.finish(token, None),
            (Ok(()), None) => {}
            // The slot stays until the watcher sees the stream end or gives up on the bridge.
            (Err(err), token) => {
                tracing::warn!(error = %err, token = ?token, "bridge stop failed; stream still held");
            }
        }
    }

    fn pause(&mut self) {
        match self.client.pause() {
            Ok(()) => self.set_paused(true),
            Err(err) => tracing::warn!(error = %err, "bridge pause failed"),
        }
    }

    fn resume(&mut self) {
        match self.client.resume() {
            Ok(()) => self.set_paused(false),
            Err(err) => tracing::warn!(error = %err, "bridge resume failed"),
        }
    }

    fn is_playing(&self) -> bool {
        self.shared.lock_slot().as_ref().is_some_and(|s| !s.paused)
    }

    fn is_paused(&self) -> bool {
        self.shared.lock_slot().as_ref().is_some_and(|s| s.paused)
    }

    fn set_gain(&mut self, gain: f32) {
        if let Err(err) = self.client.set_volume(gain_to_percent(gain)) {
            tracing::warn!(error = %err, "bridge volume update failed");
        }
    }

    fn wait_idle(&self, wait: &IdleWait) -> bool {
        let guard = self.shared.lock_slot();
        match self
            .shared
            .idle
            .wait_timeout_while(guard, wait.timeout, |slot| slot.is_some())
        {
            Ok((_, result)) => !result.timed_out(),
            Err(poisoned) => !poisoned.into_inner().1.timed_out(),
        }
    }
}

impl Drop for BridgeSink {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::mpsc;

    fn status(now_playing: Option<&str>, end_reason: Option<EndReason>) -> BridgeStatus {
        BridgeStatus {
            now_playing: now_playing.map(|s| s.to_string()),
            end_reason,
            ..BridgeStatus::default()
        }
    }

    #[test]
    fn classify_waits_out_stale_end_reason() {
        let report = status(None, Some(EndReason::Stopped));
        assert_eq!(
            classify(false, Duration::from_millis(100), &report),
            Verdict::Starting
        );
        assert_eq!(
            classify(false, START_GRACE, &report),
            Verdict::Ended(None)
        );
    }

    #[test]
    fn classify_reports_active_and_eof() {
        let playing = status(Some("http://media/stream?path=a.mp3"), None);
        assert_eq!(classify(false, Duration::ZERO, &playing), Verdict::Active);

        let eof = status(None, Some(EndReason::Eof));
        assert_eq!(classify(true, Duration::ZERO, &eof), Verdict::Ended(None));
    }

    #[test]
    fn classify_maps_error_end_reason() {
        let report = status(None, Some(EndReason::Error));
        assert!(matches!(
            classify(true, Duration::from_secs(5), &report),
            Verdict::Ended(Some(_))
        ));
    }

    #[test]
    fn classify_flags_stream_that_never_started() {
        let report = status(None, None);
        assert_eq!(
            classify(false, Duration::from_millis(10), &report),
            Verdict::Starting
        );
        assert!(matches!(
            classify(false, START_GRACE, &report),
            Verdict::Ended(Some(_))
        ));
        assert_eq!(classify(true, Duration::ZERO, &report), Verdict::Ended(None));
    }

    #[test]
    fn stream_url_encodes_local_paths() {
        let url = stream_url(
            Some("http://10.0.0.5:8080/"),
            &PathBuf::from("/music/a b.mp3"),
        );
        assert_eq!(url, "http://10.0.0.5:8080/stream?path=%2Fmusic%2Fa%20b.mp3");
    }

    #[test]
    fn stream_url_passes_through_remote_and_unconfigured() {
        let remote = PathBuf::from("https://cdn.example/clip.ogg");
        assert_eq!(stream_url(Some("http://hub"), &remote), "https://cdn.example/clip.ogg");
        assert_eq!(
            stream_url(None, &PathBuf::from("/music/a.mp3")),
            "/music/a.mp3"
        );
    }

    #[test]
    fn gain_to_percent_rounds_and_clamps() {
        assert_eq!(gain_to_percent(0.5), 50);
        assert_eq!(gain_to_percent(0.333), 33);
        assert_eq!(gain_to_percent(1.7), 100);
        assert_eq!(gain_to_percent(f32::NAN), 0);
    }

    #[test]
    fn status_payload_ignores_unknown_fields() {
        let raw = r#"{"now_playing":"x","paused":true,"sample_rate":44100,"end_reason":null}"#;
        let parsed: BridgeStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.now_playing.as_deref(), Some("x"));
        assert!(parsed.paused);
        assert_eq!(parsed.end_reason, None);
    }

    #[test]
    fn finish_fires_callback_once_for_matching_token() {
        let shared = Shared {
            slot: Mutex::new(None),
            idle: Condvar::new(),
            running: AtomicBool::new(false),
        };
        let (tx, rx) = mpsc::channel();
        *shared.lock_slot() = Some(StreamSlot {
            token: 7,
            started: Instant::now(),
            paused: false,
            seen_active: true,
            on_complete: Some(Box::new(move |err| {
                let _ = tx.send(err);
            })),
        });

        shared.finish(6, None);
        assert_eq!(shared.current_token(), Some(7));
        shared.finish(7, None);
        shared.finish(7, None);
        assert_eq!(shared.current_token(), None);
        assert_eq!(rx.try_recv().unwrap(), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_stop_is_not_confirmed() {
        let client = BridgeClient::new("127.0.0.1:9".parse().unwrap(), None);
        let mut sink = BridgeSink::new(client, None, Duration::from_millis(50));
        let (tx, rx) = mpsc::channel();
        *sink.shared.lock_slot() = Some(StreamSlot {
            token: 3,
            started: Instant::now(),
            paused: false,
            seen_active: true,
            on_complete: Some(Box::new(move |err| {
                let _ = tx.send(err);
            })),
        });

        sink.stop();
        let wait = IdleWait {
            timeout: Duration::from_millis(50),
            ..IdleWait::default()
        };
        assert!(!sink.wait_idle(&wait));
        assert!(!sink.is_idle());
        assert!(rx.try_recv().is_err());

        sink.disconnect();
        assert!(sink.is_idle());
        assert!(rx.try_recv().unwrap().is_some());
    }

    #[test]
    fn unconnected_sink_rejects_play() {
        let client = BridgeClient::new("127.0.0.1:9".parse().unwrap(), None);
        let mut sink = BridgeSink::new(client, None, Duration::from_millis(50));
        let err = sink
            .play(
                PlayRequest {
                    source: PathBuf::from("a.mp3"),
                    gain: 1.0,
                    start_at: Duration::ZERO,
                },
                Box::new(|_| {}),
            )
            .unwrap_err();
        assert_eq!(err.message(), "bridge sink not connected");
        assert!(sink.is_idle());
        assert!(sink.wait_idle(&IdleWait::default()));
    }
}
