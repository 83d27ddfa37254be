use serde::Serialize;

/// Coordinator state tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Disconnected,
    /// Connected, nothing occupying the sink.
    Idle,
    Playing,
    Paused,
    /// A quick sound occupies the sink; a primary track may be saved for restore.
    Interrupted,
}

impl PlaybackState {
    pub fn is_connected(self) -> bool {
        self != PlaybackState::Disconnected
    }
}

/// Which gain setting a live stream uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Primary,
    Interrupt,
}
