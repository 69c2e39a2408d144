//! Compound gesture detection: shake and two-zone double-tap / hold

use crate::command::{Button, Command};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShakeSettings {
    /// Trailing window over which the derivative is averaged
    pub window_ms: u64,
    /// Minimum number of samples in the window before a shake can fire
    pub min_samples: usize,
    /// Mean absolute derivative above which the signal counts as shaking
    pub derivative_threshold: f32,
    /// Minimum time between two detections
    pub cooldown_ms: u64,
}

impl Default for ShakeSettings {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            min_samples: 50,
            derivative_threshold: 3.0,
            cooldown_ms: 1000,
        }
    }
}

/// Shake detection over a sliding window of the signal's derivative
#[derive(Clone, Debug)]
pub struct ShakeDetector {
    window: Duration,
    min_samples: usize,
    threshold: f32,
    cooldown: Duration,
    previous: Option<f32>,
    samples: VecDeque<(Instant, f32)>,
    last_shake: Option<Instant>,
}

impl ShakeDetector {
    pub fn new(settings: &ShakeSettings) -> Self {
        Self {
            window: Duration::from_millis(settings.window_ms),
            min_samples: settings.min_samples.max(1),
            threshold: settings.derivative_threshold,
            cooldown: Duration::from_millis(settings.cooldown_ms),
            previous: None,
            samples: VecDeque::new(),
            last_shake: None,
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Feeds one reading, returns true when a shake is detected
    pub fn on_sample(&mut self, value: f32, now: Instant) -> bool {
        if !value.is_finite() {
            return false;
        }
        let derivative = self.previous.map_or(0.0, |prev| (value - prev).abs());
        self.previous = Some(value);
        self.samples.push_back((now, derivative));

        while let Some((timestamp, _)) = self.samples.front() {
            if now.saturating_duration_since(*timestamp) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }

        if self.samples.len() < self.min_samples {
            return false;
        }
        let mean =
            self.samples.iter().map(|(_, d)| *d).sum::<f32>() / self.samples.len() as f32;
        if mean <= self.threshold {
            return false;
        }

        let cooled_down = self
            .last_shake
            .map_or(true, |last| now.saturating_duration_since(last) > self.cooldown);
        if cooled_down {
            info!(
                "Shake detected: mean derivative {:.2} over {} samples",
                mean,
                self.samples.len()
            );
            self.last_shake = Some(now);
        }
        cooled_down
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Zone {
    Left,
    Right,
}

/// Buttons pressed by the two gestures of one zone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneActions {
    pub double_tap: Button,
    pub hold: Button,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapSettings {
    /// Second press within this window is a double tap, holding past it is a hold
    pub tap_window_ms: u64,
    pub left: ZoneActions,
    pub right: ZoneActions,
}

impl Default for TapSettings {
    fn default() -> Self {
        Self {
            tap_window_ms: 200,
            left: ZoneActions {
                double_tap: Button::Lookback,
                hold: Button::Fire,
            },
            right: ZoneActions {
                double_tap: Button::Skidding,
                hold: Button::Nitro,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapGesture {
    DoubleTap(Zone),
    Hold(Zone),
}

#[derive(Clone, Debug, Default)]
struct ZoneState {
    first_press: Option<Instant>,
    is_pressed: bool,
}

/// Double-tap versus hold classification on a two-zone touch surface
///
/// The first classification latches until [`TapDetector::on_release`], so
/// one touch produces at most one gesture.
#[derive(Clone, Debug)]
pub struct TapDetector {
    tap_window: Duration,
    left_actions: ZoneActions,
    right_actions: ZoneActions,
    left: ZoneState,
    right: ZoneState,
    action_taken: bool,
    held: Vec<Button>,
}

impl TapDetector {
    pub fn new(settings: &TapSettings) -> Self {
        Self {
            tap_window: Duration::from_millis(settings.tap_window_ms),
            left_actions: settings.left,
            right_actions: settings.right,
            left: ZoneState::default(),
            right: ZoneState::default(),
            action_taken: false,
            held: Vec::new(),
        }
    }

    /// Last classified gesture's buttons that are still held
    pub fn held(&self) -> &[Button] {
        &self.held
    }

    pub fn on_zone_press(&mut self, zone: Zone, now: Instant) -> Option<Command> {
        if self.action_taken {
            return None;
        }
        let tap_window = self.tap_window;
        let (state, actions) = match zone {
            Zone::Left => (&mut self.left, self.left_actions),
            Zone::Right => (&mut self.right, self.right_actions),
        };

        let elapsed = state
            .first_press
            .map(|first| now.saturating_duration_since(first));
        let gesture = if !state.is_pressed {
            match elapsed {
                Some(elapsed) if elapsed < tap_window => Some(TapGesture::DoubleTap(zone)),
                _ => {
                    state.first_press = Some(now);
                    None
                }
            }
        } else {
            match elapsed {
                Some(elapsed) if elapsed > tap_window => Some(TapGesture::Hold(zone)),
                _ => None,
            }
        };
        state.is_pressed = true;

        let button = match gesture? {
            TapGesture::DoubleTap(_) => actions.double_tap,
            TapGesture::Hold(_) => actions.hold,
        };
        debug!("Touch zone {:?} classified, pressing {:?}", zone, button);
        self.action_taken = true;
        self.held.push(button);
        Some(Command::Press(button))
    }

    /// Touch-up: clears both zones and releases what the gesture pressed
    pub fn on_release(&mut self) -> Vec<Command> {
        self.action_taken = false;
        self.left.is_pressed = false;
        self.right.is_pressed = false;
        self.held.drain(..).map(Command::Release).collect()
    }
}
