//! QR markers held in front of the camera
//!
//! Continuous markers (nitro, skidding, lookback) hold their button while the
//! marker stays in view, with a grace period for frames where detection
//! flickers. One-shot markers (fire, rescue) send a single pulse when the
//! marker appears and re-arm once it has been out of view for the same grace
//! period.

use crate::command::channel::{emit, CommandSink};
use crate::command::Button;
use crate::controller::pulse::PulseScheduler;
use crate::mapping::marker::{MarkerTracker, DEFAULT_GRACE_FRAMES};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerSettings {
    pub grace_frames: u32,
    /// Decoded text to held button
    pub continuous: HashMap<String, Button>,
    /// Decoded text to pulsed button
    pub one_shot: HashMap<String, Button>,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        let continuous = [
            ("NITRO", Button::Nitro),
            ("SKIDDING", Button::Skidding),
            ("LOOKBACK", Button::Lookback),
        ];
        let one_shot = [("FIRE", Button::Fire), ("RESCUE", Button::Rescue)];
        Self {
            grace_frames: DEFAULT_GRACE_FRAMES,
            continuous: continuous
                .into_iter()
                .map(|(text, button)| (text.to_string(), button))
                .collect(),
            one_shot: one_shot
                .into_iter()
                .map(|(text, button)| (text.to_string(), button))
                .collect(),
        }
    }
}

pub struct MarkerSource {
    continuous: Vec<(String, MarkerTracker)>,
    /// Reuses the tracker's debounce as an armed/disarmed latch
    one_shot: Vec<(String, MarkerTracker)>,
    pulses: PulseScheduler,
    sink: Arc<dyn CommandSink>,
}

impl MarkerSource {
    pub fn new(settings: &MarkerSettings, pulses: PulseScheduler, sink: Arc<dyn CommandSink>) -> Self {
        let trackers = |table: &HashMap<String, Button>| {
            let mut trackers: Vec<(String, MarkerTracker)> = table
                .iter()
                .map(|(text, button)| {
                    (text.clone(), MarkerTracker::new(*button, settings.grace_frames))
                })
                .collect();
            trackers.sort_by_key(|(_, tracker)| tracker.button());
            trackers
        };

        info!(
            "Marker source ready: {} continuous, {} one-shot, grace {} frames",
            settings.continuous.len(),
            settings.one_shot.len(),
            settings.grace_frames
        );
        Self {
            continuous: trackers(&settings.continuous),
            one_shot: trackers(&settings.one_shot),
            pulses,
            sink,
        }
    }

    /// Feeds the decoded strings of one camera frame
    pub fn on_frame<S: AsRef<str>>(&mut self, decoded: &[S]) {
        let seen = |text: &str| decoded.iter().any(|d| d.as_ref().trim() == text);

        for (text, tracker) in &mut self.continuous {
            let command = tracker.on_frame(seen(text));
            emit(self.sink.as_ref(), command);
        }

        for (text, tracker) in &mut self.one_shot {
            // the press edge fires the pulse, the release edge only re-arms
            if let Some(command) = tracker.on_frame(seen(text)) {
                if command.is_press() {
                    debug!("One-shot marker {} seen", text);
                    self.pulses.fire(tracker.button());
                }
            }
        }
    }

    /// Releases held continuous markers and re-arms one-shot markers
    pub fn reset(&mut self) {
        for (_, tracker) in &mut self.continuous {
            emit(self.sink.as_ref(), tracker.reset());
        }
        for (_, tracker) in &mut self.one_shot {
            tracker.reset();
        }
    }
}
