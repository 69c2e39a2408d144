//! Head-position driving from the two eye positions of a detected face
//!
//! The head is placed in camera space with a pinhole model: the known
//! inter-pupillary distance gives the depth, the midpoint between the eyes
//! gives the lateral offsets.
//!
//! ```text
//! x >  lateral ──► RIGHT      z < near ──► UP   (leaning in)
//! x < -lateral ──► LEFT       z > far  ──► DOWN (leaning back)
//! ```

use crate::command::channel::{emit, CommandSink};
use crate::mapping::edge::{AxisBinding, Direction, EdgeTrigger};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceSettings {
    /// Camera focal length in pixels
    pub focal_px: f32,
    /// Real inter-pupillary distance of the player
    pub ipd_cm: f32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub lateral_threshold_cm: f32,
    pub near_cm: f32,
    pub far_cm: f32,
}

impl Default for FaceSettings {
    fn default() -> Self {
        Self {
            focal_px: 590.0,
            ipd_cm: 6.3,
            frame_width: 640,
            frame_height: 480,
            lateral_threshold_cm: 2.0,
            near_cm: 30.0,
            far_cm: 40.0,
        }
    }
}

/// Pixel coordinates of both eyes in one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyePair {
    pub left: (f32, f32),
    pub right: (f32, f32),
}

/// Head position in centimetres, camera at the origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadPosition {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl HeadPosition {
    /// `None` when the eyes coincide and no depth can be derived
    pub fn from_eyes(eyes: &EyePair, settings: &FaceSettings) -> Option<Self> {
        let dx = eyes.right.0 - eyes.left.0;
        let dy = eyes.right.1 - eyes.left.1;
        let ipd_px = dx.hypot(dy);
        if !ipd_px.is_finite() || ipd_px <= f32::EPSILON {
            return None;
        }

        let z = settings.ipd_cm * settings.focal_px / ipd_px;
        let center_x = (eyes.left.0 + eyes.right.0) / 2.0;
        let center_y = (eyes.left.1 + eyes.right.1) / 2.0;
        let x = (center_x - settings.frame_width as f32 / 2.0) * z / settings.focal_px;
        let y = (center_y - settings.frame_height as f32 / 2.0) * z / settings.focal_px;
        Some(Self { x, y, z })
    }
}

pub struct FaceSource {
    settings: FaceSettings,
    steering: EdgeTrigger,
    throttle: EdgeTrigger,
    sink: Arc<dyn CommandSink>,
}

impl FaceSource {
    pub fn new(settings: &FaceSettings, sink: Arc<dyn CommandSink>) -> Self {
        info!(
            "Face source ready, focal {} px, ipd {} cm",
            settings.focal_px, settings.ipd_cm
        );
        Self {
            settings: settings.clone(),
            steering: EdgeTrigger::new(AxisBinding::steering()),
            throttle: EdgeTrigger::new(AxisBinding::throttle()),
            sink,
        }
    }

    /// Feeds one frame; `None` means no face was detected
    pub fn on_eyes(&mut self, eyes: Option<EyePair>) {
        let position = eyes.and_then(|eyes| HeadPosition::from_eyes(&eyes, &self.settings));
        self.on_position(position);
    }

    pub fn on_position(&mut self, position: Option<HeadPosition>) {
        let (lateral, depth) = match position {
            Some(position) => (
                Direction::from_value(position.x, self.settings.lateral_threshold_cm),
                self.depth_direction(position.z),
            ),
            None => {
                debug!("Face lost, neutralizing");
                (Direction::Neutral, Direction::Neutral)
            }
        };

        emit(self.sink.as_ref(), self.steering.update(lateral));
        emit(self.sink.as_ref(), self.throttle.update(depth));
    }

    fn depth_direction(&self, z: f32) -> Direction {
        if z < self.settings.near_cm {
            Direction::Positive
        } else if z > self.settings.far_cm {
            Direction::Negative
        } else {
            Direction::Neutral
        }
    }

    pub fn reset(&mut self) {
        emit(self.sink.as_ref(), self.steering.reset());
        emit(self.sink.as_ref(), self.throttle.reset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::channel::testing::RecordingSink;
    use crate::command::{Button, Command};

    fn at(x: f32, z: f32) -> Option<HeadPosition> {
        Some(HeadPosition { x, y: 0.0, z })
    }

    #[test]
    fn depth_from_eye_distance() {
        let settings = FaceSettings::default();
        // 6.3 cm * 590 px / 118 px = 31.5 cm, centred
        let eyes = EyePair {
            left: (261.0, 240.0),
            right: (379.0, 240.0),
        };
        let head = HeadPosition::from_eyes(&eyes, &settings).unwrap();
        assert!((head.z - 31.5).abs() < 1e-3);
        assert!(head.x.abs() < 1e-3);
        assert!(head.y.abs() < 1e-3);

        let same = EyePair {
            left: (100.0, 100.0),
            right: (100.0, 100.0),
        };
        assert_eq!(HeadPosition::from_eyes(&same, &settings), None);
    }

    #[test]
    fn lateral_offset_scales_with_depth() {
        let settings = FaceSettings::default();
        let eyes = EyePair {
            left: (400.0, 240.0),
            right: (518.0, 240.0),
        };
        let head = HeadPosition::from_eyes(&eyes, &settings).unwrap();
        // centre at 459 px, 139 px right of the frame centre
        assert!((head.x - 139.0 * head.z / 590.0).abs() < 1e-3);
        assert!(head.x > settings.lateral_threshold_cm);
    }

    #[test]
    fn leaning_drives_edges() {
        let sink = RecordingSink::new();
        let mut face = FaceSource::new(&FaceSettings::default(), sink.clone());

        face.on_position(at(3.0, 25.0));
        face.on_position(at(3.5, 26.0));
        assert_eq!(
            sink.take(),
            vec![Command::Press(Button::Right), Command::Press(Button::Up)]
        );

        face.on_position(at(-3.0, 35.0));
        assert_eq!(
            sink.take(),
            vec![
                Command::Release(Button::Right),
                Command::Press(Button::Left),
                Command::Release(Button::Up)
            ]
        );

        face.on_position(at(0.0, 45.0));
        assert_eq!(
            sink.take(),
            vec![Command::Release(Button::Left), Command::Press(Button::Down)]
        );
    }

    #[test]
    fn lost_face_releases_everything() {
        let sink = RecordingSink::new();
        let mut face = FaceSource::new(&FaceSettings::default(), sink.clone());
        face.on_position(at(-5.0, 50.0));
        sink.take();

        face.on_eyes(None);
        assert_eq!(
            sink.take(),
            vec![Command::Release(Button::Left), Command::Release(Button::Down)]
        );
        face.on_eyes(None);
        assert!(sink.take().is_empty());
    }
}
