//! Frame-debounced tracking of continuous QR markers

use crate::command::{Button, Command};
use tracing::debug;

pub const DEFAULT_GRACE_FRAMES: u32 = 20;

/// Turns flaky per-frame detections of one marker into a stable held button
///
/// The button is pressed on the first frame the marker is seen and released
/// only after it has been missing for `grace_frames` consecutive frames.
#[derive(Clone, Debug)]
pub struct MarkerTracker {
    button: Button,
    grace_frames: u32,
    frames_since_seen: u32,
    active: bool,
}

impl MarkerTracker {
    pub fn new(button: Button, grace_frames: u32) -> Self {
        Self {
            button,
            grace_frames: grace_frames.max(1),
            frames_since_seen: 0,
            active: false,
        }
    }

    pub fn button(&self) -> Button {
        self.button
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn on_frame(&mut self, seen: bool) -> Option<Command> {
        if seen {
            self.frames_since_seen = 0;
            if !self.active {
                debug!("Marker {:?} seen, pressing", self.button);
                self.active = true;
                return Some(Command::Press(self.button));
            }
            return None;
        }

        self.frames_since_seen = self.frames_since_seen.saturating_add(1);
        if self.active && self.frames_since_seen >= self.grace_frames {
            debug!(
                "Marker {:?} missing for {} frames, releasing",
                self.button, self.frames_since_seen
            );
            self.active = false;
            return Some(Command::Release(self.button));
        }
        None
    }

    /// Releases the button if held
    pub fn reset(&mut self) -> Option<Command> {
        self.frames_since_seen = 0;
        if std::mem::take(&mut self.active) {
            Some(Command::Release(self.button))
        } else {
            None
        }
    }
}
