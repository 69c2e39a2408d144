//! Source adapters: one struct per sensing collaborator
//!
//! An adapter owns the core components its readings drive and the handles
//! it needs to reach the outside (command sink, pulse scheduler, analog
//! axes). Each adapter has a single producer: methods take `&mut self` and
//! are called from the thread that delivers the reading. They only do
//! arithmetic, never block and never return an error: bad readings are
//! logged and dropped.
//!
//! ```text
//! OSC phone ──► PhoneSource  ──┐
//! camera    ──► FaceSource   ──┤
//! camera    ──► MarkerSource ──┼──► CommandSink ──► UDP
//! serial    ──► PedalSource  ──┤
//! speech    ──► VoiceSource  ──┘
//! ```

pub mod face;
pub mod markers;
pub mod pedals;
pub mod phone;
pub mod voice;

pub use face::{EyePair, FaceSettings, FaceSource, HeadPosition};
pub use markers::{MarkerSettings, MarkerSource};
pub use pedals::{PedalReading, PedalSettings, PedalSource};
pub use phone::{PhoneMode, PhoneReading, PhoneSettings, PhoneSource};
pub use voice::{VoiceSettings, VoiceSource};
