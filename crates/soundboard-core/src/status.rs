//! Point-in-time view of the coordinator for status endpoints.

use serde::Serialize;

use crate::queue::Track;
use crate::state::PlaybackState;
use crate::volume::VolumeSettings;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: PlaybackState,
    /// Primary track that is playing or paused.
    pub now_playing: Option<Track>,
    pub elapsed_ms: Option<u64>,
    pub queue: Vec<Track>,
    /// Primary track parked behind a quick sound.
    pub interrupted_track: Option<Track>,
    pub interrupted_at_ms: Option<u64>,
    /// Quick sound currently occupying the sink.
    pub clip: Option<Track>,
    pub volume: VolumeSettings,
    pub stop_enabled: bool,
}
