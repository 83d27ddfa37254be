//! Primary and interrupt gain settings.

use serde::Serialize;

use crate::sink::OutputSink;
use crate::state::StreamKind;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeSettings {
    pub primary: f32,
    pub interrupt: f32,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            primary: 1.0,
            interrupt: 1.0,
        }
    }
}

/// Clamp a gain to `[0.0, 1.0]`; NaN maps to silence.
pub fn clamp_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        0.0
    } else {
        gain.clamp(0.0, 1.0)
    }
}

/// Holds both gains and applies changes to the live stream without restarting it.
#[derive(Debug, Clone)]
pub struct VolumeController {
    settings: VolumeSettings,
}

impl VolumeController {
    pub fn new(settings: VolumeSettings) -> Self {
        Self {
            settings: VolumeSettings {
                primary: clamp_gain(settings.primary),
                interrupt: clamp_gain(settings.interrupt),
            },
        }
    }

    pub fn settings(&self) -> VolumeSettings {
        self.settings
    }

    pub fn gain_for(&self, kind: StreamKind) -> f32 {
        match kind {
            StreamKind::Primary => self.settings.primary,
            StreamKind::Interrupt => self.settings.interrupt,
        }
    }

    /// Store the primary gain and apply it if a primary stream is live.
    pub fn set_primary(
        &mut self,
        gain: f32,
        live: Option<StreamKind>,
        sink: &mut dyn OutputSink,
    ) -> f32 {
        self.settings.primary = clamp_gain(gain);
        self.apply(StreamKind::Primary, live, sink)
    }

    /// Store the interrupt gain and apply it if a quick sound is live.
    pub fn set_interrupt(
        &mut self,
        gain: f32,
        live: Option<StreamKind>,
        sink: &mut dyn OutputSink,
    ) -> f32 {
        self.settings.interrupt = clamp_gain(gain);
        self.apply(StreamKind::Interrupt, live, sink)
    }

    fn apply(&self, kind: StreamKind, live: Option<StreamKind>, sink: &mut dyn OutputSink) -> f32 {
        let gain = self.gain_for(kind);
        if live == Some(kind) {
            sink.set_gain(gain);
            tracing::debug!(?kind, gain, "live gain updated");
        }
        gain
    }
}
