//! Runtime side of the controller: tasks and their lifecycles
//!
//! 1. [`control_loop`] - fixed-frequency duty-cycle loop per analog axis
//! 2. [`pulse`] - self-releasing momentary presses
//! 3. [`controller_handle`] - factory for the source adapters and shutdown
//!
//! ```text
//! sensing callback ──► source adapter ──► watch ──► ControlLoop ──► sink
//!                                     └─► PulseScheduler ─────────► sink
//! ```

pub mod control_loop;
pub mod controller_handle;
pub mod pulse;

pub use control_loop::{AnalogAxis, ControlLoopError, ControlLoopHandle, LoopStats};
pub use controller_handle::{ControllerError, ControllerHandle};
pub use pulse::{PulseScheduler, PulseSettings};
