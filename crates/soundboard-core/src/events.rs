//! Coordinator notifications for presentation layers.
//!
//! Lightweight broadcast channel; subscribers that fall behind lose the oldest events.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::queue::Track;
use crate::state::PlaybackState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackEvent {
    StateChanged { state: PlaybackState },
    QueueChanged { items: Vec<Track> },
    /// Whether a stop control should be enabled.
    StopControl { enabled: bool },
    NowPlaying { track: Option<Track> },
}

impl PlaybackEvent {
    /// Short name, used as the SSE event type.
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackEvent::StateChanged { .. } => "state",
            PlaybackEvent::QueueChanged { .. } => "queue",
            PlaybackEvent::StopControl { .. } => "stop_control",
            PlaybackEvent::NowPlaying { .. } => "now_playing",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.sender.subscribe()
    }

    pub fn state_changed(&self, state: PlaybackState) {
        let _ = self.sender.send(PlaybackEvent::StateChanged { state });
    }

    pub fn queue_changed(&self, items: Vec<Track>) {
        let _ = self.sender.send(PlaybackEvent::QueueChanged { items });
    }

    pub fn stop_control(&self, enabled: bool) {
        let _ = self.sender.send(PlaybackEvent::StopControl { enabled });
    }

    pub fn now_playing(&self, track: Option<Track>) {
        let _ = self.sender.send(PlaybackEvent::NowPlaying { track });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.state_changed(PlaybackState::Playing);
        bus.stop_control(true);

        assert_eq!(
            rx.try_recv().unwrap(),
            PlaybackEvent::StateChanged {
                state: PlaybackState::Playing
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PlaybackEvent::StopControl { enabled: true }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.queue_changed(vec![Track::from("a.mp3")]);
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(PlaybackEvent::QueueChanged {
            items: vec![Track::from("a.mp3")],
        })
        .unwrap();
        assert_eq!(json["kind"], "queue_changed");
        assert_eq!(json["items"][0], "a.mp3");
        assert_eq!(
            PlaybackEvent::StopControl { enabled: false }.name(),
            "stop_control"
        );
    }
}
