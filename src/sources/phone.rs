//! Phone readings: orientation, touch pad and accelerometer
//!
//! Two play modes share the phone:
//!
//! ```text
//! Collab:  roll  (±30°)            ──► duty-cycled steering
//!          pitch < -5°             ──► UP held
//! Perf:    yaw   (±20°, inverted)  ──► duty-cycled steering
//!          pad x                   ──► double tap / hold per zone
//!          touch up                ──► release gesture buttons
//!          accelerometer y shake   ──► RESCUE pulse
//! ```
//!
//! Readings for the other mode are ignored.

use crate::command::channel::{emit, CommandSink};
use crate::command::Button;
use crate::controller::control_loop::AnalogAxis;
use crate::controller::pulse::PulseScheduler;
use crate::mapping::duty_cycle::AnalogInput;
use crate::mapping::edge::EdgeTrigger;
use crate::mapping::gesture::{ShakeDetector, ShakeSettings, TapDetector, TapSettings, Zone};
use crate::mapping::normalize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const ROLL_ADDRESS: &str = "/multisense/orientation/roll";
pub const PITCH_ADDRESS: &str = "/multisense/orientation/pitch";
pub const YAW_ADDRESS: &str = "/multisense/orientation/yaw";
pub const PAD_X_ADDRESS: &str = "/multisense/pad/x";
pub const TOUCH_UP_ADDRESS: &str = "/multisense/pad/touchUP";
pub const ACCELEROMETER_Y_ADDRESS: &str = "/multisense/accelerometer/y";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneMode {
    #[default]
    Collab,
    Perf,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneSettings {
    pub mode: PhoneMode,
    /// Roll angle giving full steering in collab mode
    pub roll_limit_deg: f32,
    /// Yaw angle giving full steering in perf mode
    pub yaw_limit_deg: f32,
    /// Pitch below which the kart accelerates
    pub accelerate_pitch_deg: f32,
    /// Normalized steering below which the axis is neutral
    pub steering_dead_zone: f32,
    pub taps: TapSettings,
    pub shake: ShakeSettings,
}

impl Default for PhoneSettings {
    fn default() -> Self {
        Self {
            mode: PhoneMode::Collab,
            roll_limit_deg: 30.0,
            yaw_limit_deg: 20.0,
            accelerate_pitch_deg: -5.0,
            steering_dead_zone: 0.05,
            taps: TapSettings::default(),
            shake: ShakeSettings::default(),
        }
    }
}

/// One decoded OSC message
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PhoneReading {
    Roll(f32),
    Pitch(f32),
    Yaw(f32),
    PadX(f32),
    TouchUp,
    AccelerometerY(f32),
}

impl PhoneReading {
    /// Maps an OSC address and its first argument to a reading
    pub fn from_osc(address: &str, value: f32) -> Option<Self> {
        match address {
            ROLL_ADDRESS => Some(PhoneReading::Roll(value)),
            PITCH_ADDRESS => Some(PhoneReading::Pitch(value)),
            YAW_ADDRESS => Some(PhoneReading::Yaw(value)),
            PAD_X_ADDRESS => Some(PhoneReading::PadX(value)),
            TOUCH_UP_ADDRESS => Some(PhoneReading::TouchUp),
            ACCELEROMETER_Y_ADDRESS => Some(PhoneReading::AccelerometerY(value)),
            _ => None,
        }
    }

    fn value(&self) -> Option<f32> {
        match *self {
            PhoneReading::Roll(v)
            | PhoneReading::Pitch(v)
            | PhoneReading::Yaw(v)
            | PhoneReading::PadX(v)
            | PhoneReading::AccelerometerY(v) => Some(v),
            PhoneReading::TouchUp => None,
        }
    }
}

pub struct PhoneSource {
    settings: PhoneSettings,
    steering: AnalogAxis,
    accelerate: EdgeTrigger,
    taps: TapDetector,
    shake: ShakeDetector,
    pulses: PulseScheduler,
    sink: Arc<dyn CommandSink>,
}

impl PhoneSource {
    pub fn new(
        settings: &PhoneSettings,
        steering: AnalogAxis,
        pulses: PulseScheduler,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        info!("Phone source ready in {:?} mode", settings.mode);
        Self {
            settings: settings.clone(),
            steering,
            accelerate: EdgeTrigger::binary(Button::Up),
            taps: TapDetector::new(&settings.taps),
            shake: ShakeDetector::new(&settings.shake),
            pulses,
            sink,
        }
    }

    pub fn mode(&self) -> PhoneMode {
        self.settings.mode
    }

    pub fn handle(&mut self, reading: PhoneReading) {
        self.handle_at(reading, Instant::now());
    }

    pub fn handle_at(&mut self, reading: PhoneReading, now: Instant) {
        if reading.value().is_some_and(f32::is_nan) {
            debug!("Ignoring NaN phone reading: {:?}", reading);
            return;
        }

        match (self.settings.mode, reading) {
            (PhoneMode::Collab, PhoneReading::Roll(degrees)) => {
                self.steer(normalize(degrees, self.settings.roll_limit_deg));
            }
            (PhoneMode::Collab, PhoneReading::Pitch(degrees)) => {
                let commands = self
                    .accelerate
                    .set_active(degrees < self.settings.accelerate_pitch_deg);
                emit(self.sink.as_ref(), commands);
            }
            (PhoneMode::Perf, PhoneReading::Yaw(degrees)) => {
                self.steer(-normalize(degrees, self.settings.yaw_limit_deg));
            }
            (PhoneMode::Perf, PhoneReading::PadX(x)) => {
                // the pad is mirrored: negative x is the right zone
                let zone = if x < 0.0 { Zone::Right } else { Zone::Left };
                emit(self.sink.as_ref(), self.taps.on_zone_press(zone, now));
            }
            (PhoneMode::Perf, PhoneReading::TouchUp) => {
                emit(self.sink.as_ref(), self.taps.on_release());
            }
            (PhoneMode::Perf, PhoneReading::AccelerometerY(y)) => {
                if self.shake.on_sample(y, now) {
                    self.pulses.fire(Button::Rescue);
                }
            }
            (mode, reading) => {
                debug!("Ignoring {:?} in {:?} mode", reading, mode);
            }
        }
    }

    fn steer(&mut self, value: f32) {
        self.steering
            .set(AnalogInput::from_signed(value, self.settings.steering_dead_zone));
    }

    /// Neutralizes steering and releases everything this source holds
    pub fn reset(&mut self) {
        self.steering.set(AnalogInput::NEUTRAL);
        emit(self.sink.as_ref(), self.accelerate.reset());
        emit(self.sink.as_ref(), self.taps.on_release());
    }
}
