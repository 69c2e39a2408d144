//! Text relay standing in for the sensing collaborators
//!
//! Each input line is one reading, routed to the matching source adapter:
//!
//! ```text
//! /multisense/orientation/roll 12.5   phone (any OSC address)
//! pedals 2#14                         pedal serial line
//! voice fire now                      recognized speech
//! markers NITRO FIRE                  QR strings decoded in one frame
//! face 1.5 0.0 35.2                   head position in cm, "face" alone = lost
//! ```

use crate::controller::controller_handle::ControllerHandle;
use crate::sources::{
    FaceSource, HeadPosition, MarkerSource, PedalSource, PhoneReading, PhoneSource, VoiceSource,
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("Unknown reading: {0:?}")]
    UnknownReading(String),

    #[error("Invalid value in {0:?}")]
    InvalidValue(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum RelayLine {
    Phone(PhoneReading),
    Pedals(String),
    Voice(String),
    Markers(Vec<String>),
    Face(Option<HeadPosition>),
}

impl RelayLine {
    /// `Ok(None)` for blank lines
    pub fn parse(line: &str) -> Result<Option<Self>, RelayError> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        let invalid = || RelayError::InvalidValue(line.to_string());

        let parsed = match head {
            "" => return Ok(None),
            address if address.starts_with('/') => {
                // touch-up carries no meaningful argument
                let value = if rest.is_empty() {
                    0.0
                } else {
                    rest.parse::<f32>().map_err(|_| invalid())?
                };
                let reading = PhoneReading::from_osc(address, value)
                    .ok_or_else(|| RelayError::UnknownReading(line.to_string()))?;
                RelayLine::Phone(reading)
            }
            "pedals" => RelayLine::Pedals(rest.to_string()),
            "voice" => RelayLine::Voice(rest.to_string()),
            "markers" => RelayLine::Markers(rest.split_whitespace().map(str::to_string).collect()),
            "face" if rest.is_empty() => RelayLine::Face(None),
            "face" => {
                let coords = rest
                    .split_whitespace()
                    .map(str::parse::<f32>)
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(|_| invalid())?;
                match coords.as_slice() {
                    &[x, y, z] => RelayLine::Face(Some(HeadPosition { x, y, z })),
                    _ => return Err(invalid()),
                }
            }
            _ => return Err(RelayError::UnknownReading(line.to_string())),
        };
        Ok(Some(parsed))
    }
}

/// Every source adapter, fed from one stream of lines
pub struct Relay {
    phone: PhoneSource,
    face: FaceSource,
    markers: MarkerSource,
    pedals: PedalSource,
    voice: VoiceSource,
}

impl Relay {
    pub fn new(controller: &mut ControllerHandle) -> Self {
        Self {
            phone: controller.phone(),
            face: controller.face(),
            markers: controller.markers(),
            pedals: controller.pedals(),
            voice: controller.voice(),
        }
    }

    pub fn on_line(&mut self, line: &str) {
        match RelayLine::parse(line) {
            Ok(Some(reading)) => self.dispatch(reading),
            Ok(None) => {}
            Err(e) => warn!("Skipping line: {}", e),
        }
    }

    pub fn dispatch(&mut self, reading: RelayLine) {
        match reading {
            RelayLine::Phone(reading) => self.phone.handle(reading),
            RelayLine::Pedals(line) => self.pedals.on_line(&line),
            RelayLine::Voice(text) => self.voice.on_text(&text, false),
            RelayLine::Markers(decoded) => self.markers.on_frame(&decoded),
            RelayLine::Face(position) => self.face.on_position(position),
        }
    }

    /// Releases everything the adapters hold
    pub fn reset(&mut self) {
        self.phone.reset();
        self.face.reset();
        self.markers.reset();
        self.pedals.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::channel::testing::RecordingSink;
    use crate::command::{Button, Command};
    use crate::config::AppConfig;

    #[test]
    fn parses_lines() {
        assert_eq!(
            RelayLine::parse("/multisense/orientation/pitch -12"),
            Ok(Some(RelayLine::Phone(PhoneReading::Pitch(-12.0))))
        );
        assert_eq!(
            RelayLine::parse("/multisense/pad/touchUP"),
            Ok(Some(RelayLine::Phone(PhoneReading::TouchUp)))
        );
        assert_eq!(
            RelayLine::parse("markers NITRO  FIRE"),
            Ok(Some(RelayLine::Markers(vec![
                "NITRO".to_string(),
                "FIRE".to_string()
            ])))
        );
        assert_eq!(RelayLine::parse("face"), Ok(Some(RelayLine::Face(None))));
        assert_eq!(RelayLine::parse("   "), Ok(None));
        assert!(matches!(
            RelayLine::parse("face 1 2"),
            Err(RelayError::InvalidValue(_))
        ));
        assert!(matches!(
            RelayLine::parse("/multisense/orientation/roll left"),
            Err(RelayError::InvalidValue(_))
        ));
        assert!(matches!(
            RelayLine::parse("gyro 1"),
            Err(RelayError::UnknownReading(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn routes_lines_to_adapters() {
        let sink = RecordingSink::new();
        let mut controller = ControllerHandle::spawn(AppConfig::default(), sink.clone()).unwrap();
        let mut relay = Relay::new(&mut controller);

        relay.on_line("/multisense/orientation/pitch -20");
        relay.on_line("pedals 20#1");
        relay.on_line("face 5 0 35");
        relay.on_line("nonsense");
        assert_eq!(
            sink.take(),
            vec![
                Command::Press(Button::Up),
                Command::Press(Button::Down),
                Command::Press(Button::Right),
            ]
        );

        relay.reset();
        controller.shutdown().await.unwrap();
        let released = sink.take();
        assert!(released.contains(&Command::Release(Button::Up)));
        assert!(released.contains(&Command::Release(Button::Right)));
        assert!(released.contains(&Command::Release(Button::Down)));
        assert!(released.iter().all(|c| c.is_release()));
    }
}
