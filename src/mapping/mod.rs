//! Translation of sensor readings into press/release commands
//!
//! Every component in this module is a plain state machine: it takes a
//! reading (and a timestamp where timing matters) and returns the commands
//! to send. None of them touch the network or spawn tasks, which keeps them
//! deterministic and lets each source own its instances outright.
//!
//! ```text
//! reading ──► EdgeTrigger / DutyCycle / TapDetector / ShakeDetector
//!             PedalStateMachine / MarkerTracker ──► Vec<Command> ──► sink
//! ```

pub mod duty_cycle;
pub mod edge;
pub mod gesture;
pub mod marker;
pub mod pedal;

pub use duty_cycle::{AnalogInput, DutyCycle, DutyCycleSettings};
pub use edge::{AxisBinding, Direction, EdgeTrigger};
pub use gesture::{ShakeDetector, ShakeSettings, TapDetector, TapSettings, Zone, ZoneActions};
pub use marker::MarkerTracker;
pub use pedal::{PedalState, PedalStateMachine};

/// Clamps `value` to `[-limit, limit]` and scales it to `[-1, 1]`
///
/// NaN maps to 0, as does any limit that is not a positive number.
pub fn normalize(value: f32, limit: f32) -> f32 {
    if value.is_nan() || limit.is_nan() || limit <= 0.0 {
        return 0.0;
    }
    value.clamp(-limit, limit) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_clamps_to_limit() {
        assert_eq!(normalize(45.0, 30.0), 1.0);
        assert_eq!(normalize(-15.0, 30.0), -0.5);
        assert_eq!(normalize(f32::NAN, 30.0), 0.0);
        assert_eq!(normalize(3.0, 0.0), 0.0);
    }

    #[test]
    fn normalize_survives_unusable_limits() {
        assert_eq!(normalize(10.0, f32::NAN), 0.0);
        assert_eq!(normalize(10.0, -30.0), 0.0);
        assert_eq!(normalize(10.0, f32::INFINITY), 0.0);
    }
}
