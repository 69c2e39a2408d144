//! Ultrasonic pedals read from the microcontroller's serial lines
//!
//! Each line carries the distance measured under both pedals as
//! `"<accel_cm>#<brake_cm>"`. A pedal counts as pressed when the foot is
//! closer to the sensor than the threshold.

use crate::command::channel::{emit, CommandSink};
use crate::mapping::pedal::{PedalState, PedalStateMachine};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PedalSettings {
    /// Distance under which a pedal counts as pressed
    pub threshold_cm: f32,
}

impl Default for PedalSettings {
    fn default() -> Self {
        Self { threshold_cm: 3.0 }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PedalLineError {
    #[error("Missing '#' separator in pedal line: {0:?}")]
    MissingSeparator(String),

    #[error("Invalid distance {0:?} in pedal line")]
    InvalidDistance(String),
}

/// Distances under both pedals, in centimetres
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PedalReading {
    pub accel_cm: f32,
    pub brake_cm: f32,
}

impl FromStr for PedalReading {
    type Err = PedalLineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (accel, brake) = line
            .split_once('#')
            .ok_or_else(|| PedalLineError::MissingSeparator(line.to_string()))?;

        let distance = |text: &str| {
            text.trim()
                .parse::<f32>()
                .ok()
                .filter(|d| !d.is_nan())
                .ok_or_else(|| PedalLineError::InvalidDistance(text.to_string()))
        };

        Ok(Self {
            accel_cm: distance(accel)?,
            brake_cm: distance(brake)?,
        })
    }
}

pub struct PedalSource {
    threshold_cm: f32,
    pedals: PedalStateMachine,
    sink: Arc<dyn CommandSink>,
}

impl PedalSource {
    pub fn new(settings: &PedalSettings, sink: Arc<dyn CommandSink>) -> Self {
        info!("Pedal source ready, threshold {} cm", settings.threshold_cm);
        Self {
            threshold_cm: settings.threshold_cm,
            pedals: PedalStateMachine::new(),
            sink,
        }
    }

    pub fn state(&self) -> PedalState {
        self.pedals.state()
    }

    /// Feeds one serial line; malformed lines leave the state unchanged
    pub fn on_line(&mut self, line: &str) {
        match line.parse::<PedalReading>() {
            Ok(reading) => self.on_reading(reading),
            Err(e) => warn!("Ignoring pedal line: {}", e),
        }
    }

    pub fn on_reading(&mut self, reading: PedalReading) {
        let commands = self.pedals.process_pedal_data(
            reading.accel_cm < self.threshold_cm,
            reading.brake_cm < self.threshold_cm,
        );
        emit(self.sink.as_ref(), commands);
    }

    /// Lifts both pedals
    pub fn reset(&mut self) {
        let commands = self.pedals.process_pedal_data(false, false);
        emit(self.sink.as_ref(), commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::channel::testing::RecordingSink;
    use crate::command::{Button, Command};

    #[test]
    fn parses_serial_lines() {
        assert_eq!(
            "12#2\r\n".parse(),
            Ok(PedalReading {
                accel_cm: 12.0,
                brake_cm: 2.0
            })
        );
        assert_eq!(
            "1.5 # 40".parse(),
            Ok(PedalReading {
                accel_cm: 1.5,
                brake_cm: 40.0
            })
        );
        assert_eq!(
            "12".parse::<PedalReading>(),
            Err(PedalLineError::MissingSeparator("12".to_string()))
        );
        assert!(matches!(
            "x#3".parse::<PedalReading>(),
            Err(PedalLineError::InvalidDistance(_))
        ));
    }

    #[test]
    fn threshold_decides_pressed() {
        let sink = RecordingSink::new();
        let mut pedals = PedalSource::new(&PedalSettings::default(), sink.clone());

        pedals.on_line("2#10");
        pedals.on_line("3#10");
        assert_eq!(
            sink.take(),
            vec![Command::Press(Button::Up), Command::Release(Button::Up)]
        );
        assert_eq!(pedals.state(), PedalState::Neutral);
    }

    #[test]
    fn garbage_keeps_state() {
        let sink = RecordingSink::new();
        let mut pedals = PedalSource::new(&PedalSettings::default(), sink.clone());

        pedals.on_line("1#1");
        pedals.on_line("garbage");
        pedals.on_line("#");
        assert_eq!(pedals.state(), PedalState::Skid);
        assert_eq!(sink.take(), vec![Command::Press(Button::Skidding)]);

        pedals.reset();
        assert_eq!(
            sink.take(),
            vec![Command::Release(Button::Skidding), Command::Release(Button::Up)]
        );
    }
}
