//! Duty-cycle emulation of an analog value on a digital button
//!
//! The downstream target only knows pressed and released. An analog value in
//! `[0, 1]` is reproduced as a time average: the button is held for
//! `value * period` and released for `(1 - value) * period`, where the period
//! spans `cycle_ticks` ticks of the control loop.
//!
//! Time is counted in fixed ticks of length `dt` rather than measured
//! elapsed time. Late ticks therefore stretch the cycle but never amplify
//! jitter; the control loop reports the lag separately.

use crate::command::{Button, Command};
use crate::mapping::edge::{AxisBinding, Direction};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest loop frequency honoured; keeps the tick at 1 ms or longer
pub const MAX_FREQUENCY_HZ: f64 = 1000.0;

/// Timing of the duty-cycle control loops
///
/// One loop runs per analog axis. Every tick reads the latest analog value
/// and advances the press/release cycle by one step.
///
/// # Performance Impact
///
/// - `frequency_hz`: Higher values shorten the cycle and smooth the average,
///   but send more datagrams. Clamped to `[1, 1000]`; NaN falls back to 1.
/// - `cycle_ticks`: Longer cycles give finer resolution (one tick is
///   `1 / cycle_ticks` of the range) at the cost of a slower visible response.
///   Values below 2 are treated as 2.
///
/// # Examples
///
/// ```rust
/// use multisense_kart::mapping::DutyCycleSettings;
/// use std::time::Duration;
///
/// // 60 Hz with 10-tick cycles: about 167 ms per press/release cycle
/// let settings = DutyCycleSettings::default();
/// assert_eq!(settings.cycle_ticks, 10);
///
/// // Unreasonable frequencies are bounded instead of stalling the loop
/// let fast = DutyCycleSettings {
///     frequency_hz: 1e12,
///     cycle_ticks: 10,
/// };
/// assert_eq!(fast.tick_interval(), Duration::from_millis(1));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DutyCycleSettings {
    /// Loop frequency in Hz
    pub frequency_hz: f64,
    /// Length of one press/release cycle in loop ticks
    pub cycle_ticks: u32,
}

impl Default for DutyCycleSettings {
    fn default() -> Self {
        Self {
            frequency_hz: 60.0,
            cycle_ticks: 10,
        }
    }
}

impl DutyCycleSettings {
    /// Tick length in seconds
    pub fn dt(&self) -> f64 {
        1.0 / self.frequency_hz.max(1.0).min(MAX_FREQUENCY_HZ)
    }

    /// Cycle length in seconds, never shorter than two ticks
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.dt() * f64::from(self.cycle_ticks.max(2)))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.dt())
    }
}

/// Analog request for one axis
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct AnalogInput {
    pub value: f32,
    pub direction: Direction,
}

impl AnalogInput {
    pub const NEUTRAL: AnalogInput = AnalogInput {
        value: 0.0,
        direction: Direction::Neutral,
    };

    /// Splits a signed value in `[-1, 1]` into magnitude and direction
    pub fn from_signed(value: f32, dead_zone: f32) -> Self {
        let direction = Direction::from_value(value, dead_zone);
        Self {
            value: if direction.is_neutral() {
                0.0
            } else {
                value.abs()
            },
            direction,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Released,
    Pressed(Button),
}

/// Pure duty-cycle state machine, advanced once per loop tick
///
/// Phase lengths are whole ticks. The rounding error of each cycle's pressed
/// share is carried into the next cycle, so the long-run pressed fraction
/// converges to the requested value.
#[derive(Clone, Debug)]
pub struct DutyCycle {
    binding: AxisBinding,
    cycle_ticks: u32,
    phase: Phase,
    /// Ticks left in the current phase
    timer: u32,
    /// Length of the released phase following the current pressed phase
    off_ticks: u32,
    carry: f64,
}

impl DutyCycle {
    pub fn new(binding: AxisBinding, settings: &DutyCycleSettings) -> Self {
        Self {
            binding,
            cycle_ticks: settings.cycle_ticks.max(2),
            phase: Phase::Released,
            timer: 0,
            off_ticks: 0,
            carry: 0.0,
        }
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self.phase, Phase::Pressed(_))
    }

    pub fn pressed_button(&self) -> Option<Button> {
        match self.phase {
            Phase::Pressed(button) => Some(button),
            Phase::Released => None,
        }
    }

    pub fn tick(&mut self, input: AnalogInput) -> Vec<Command> {
        let value = clamp_unit(input.value);
        let mut commands = Vec::new();

        let button = match self.binding.button(input.direction) {
            Some(button) if value > 0.0 => button,
            _ => {
                commands.extend(self.release());
                return commands;
            }
        };

        if let Phase::Pressed(old) = self.phase {
            if old != button {
                commands.extend(self.release());
            }
        }

        if self.timer == 0 {
            match self.phase {
                Phase::Pressed(held) if self.off_ticks > 0 => {
                    commands.push(Command::Release(held));
                    self.phase = Phase::Released;
                    self.timer = self.off_ticks;
                    self.off_ticks = 0;
                }
                _ => self.start_cycle(value, button, &mut commands),
            }
        }
        self.timer = self.timer.saturating_sub(1);

        commands
    }

    fn start_cycle(&mut self, value: f64, button: Button, commands: &mut Vec<Command>) {
        let cycle = f64::from(self.cycle_ticks);
        let exact = value * cycle + self.carry;
        let on = exact.round().clamp(0.0, cycle);
        self.carry = exact - on;
        // bounded by cycle_ticks
        let on_ticks = on as u32;

        if on_ticks == 0 {
            if let Phase::Pressed(held) = self.phase {
                commands.push(Command::Release(held));
            }
            self.phase = Phase::Released;
            self.timer = self.cycle_ticks;
            self.off_ticks = 0;
        } else {
            if self.phase == Phase::Released {
                commands.push(Command::Press(button));
            }
            self.phase = Phase::Pressed(button);
            self.timer = on_ticks;
            self.off_ticks = self.cycle_ticks - on_ticks;
        }
    }

    /// Releases the held button and goes idle
    pub fn release(&mut self) -> Option<Command> {
        let command = match self.phase {
            Phase::Pressed(button) => Some(Command::Release(button)),
            Phase::Released => None,
        };
        self.phase = Phase::Released;
        self.timer = 0;
        self.off_ticks = 0;
        self.carry = 0.0;
        command
    }
}

fn clamp_unit(value: f32) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        f64::from(value.clamp(0.0, 1.0))
    }
}
