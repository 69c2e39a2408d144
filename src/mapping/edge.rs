//! Edge-triggered translation of discrete axis state into press/release commands

use crate::command::{Button, Command};
use tracing::debug;

/// Three-valued state of a two-sided axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    Negative,
    #[default]
    Neutral,
    Positive,
}

impl Direction {
    /// Classifies a signed value, anything within `dead_zone` of zero is neutral
    pub fn from_value(value: f32, dead_zone: f32) -> Self {
        if value.is_nan() {
            Direction::Neutral
        } else if value > dead_zone {
            Direction::Positive
        } else if value < -dead_zone {
            Direction::Negative
        } else {
            Direction::Neutral
        }
    }

    pub fn from_active(active: bool) -> Self {
        if active {
            Direction::Positive
        } else {
            Direction::Neutral
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Direction::Neutral
    }
}

/// Buttons bound to the two sides of an axis
///
/// A binary control (nitro, lookback ...) has no negative side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisBinding {
    pub negative: Option<Button>,
    pub positive: Option<Button>,
}

impl AxisBinding {
    pub const fn axis(negative: Button, positive: Button) -> Self {
        Self {
            negative: Some(negative),
            positive: Some(positive),
        }
    }

    pub const fn binary(button: Button) -> Self {
        Self {
            negative: None,
            positive: Some(button),
        }
    }

    /// Steering: negative is left, positive is right
    pub const fn steering() -> Self {
        Self::axis(Button::Left, Button::Right)
    }

    /// Throttle: negative is brake, positive is accelerate
    pub const fn throttle() -> Self {
        Self::axis(Button::Down, Button::Up)
    }

    pub fn button(&self, direction: Direction) -> Option<Button> {
        match direction {
            Direction::Negative => self.negative,
            Direction::Neutral => None,
            Direction::Positive => self.positive,
        }
    }
}

/// Emits a press on the rising edge and a release on the falling edge of an axis
///
/// Holding the same side emits nothing. Flipping sides without passing
/// through neutral releases the old side and presses the new one in the same
/// update, in that order.
#[derive(Clone, Debug)]
pub struct EdgeTrigger {
    binding: AxisBinding,
    current: Direction,
}

impl EdgeTrigger {
    pub fn new(binding: AxisBinding) -> Self {
        Self {
            binding,
            current: Direction::Neutral,
        }
    }

    pub fn binary(button: Button) -> Self {
        Self::new(AxisBinding::binary(button))
    }

    pub fn current(&self) -> Direction {
        self.current
    }

    pub fn binding(&self) -> AxisBinding {
        self.binding
    }

    pub fn update(&mut self, direction: Direction) -> Vec<Command> {
        // a side without a button behaves like neutral
        let direction = match self.binding.button(direction) {
            Some(_) => direction,
            None => Direction::Neutral,
        };
        if direction == self.current {
            return Vec::new();
        }

        let mut commands = Vec::with_capacity(2);
        if let Some(old) = self.binding.button(self.current) {
            commands.push(Command::Release(old));
        }
        if let Some(new) = self.binding.button(direction) {
            commands.push(Command::Press(new));
        }
        debug!(
            "Axis edge {:?} -> {:?}: {:?}",
            self.current, direction, commands
        );
        self.current = direction;
        commands
    }

    /// Convenience for binary controls
    pub fn set_active(&mut self, active: bool) -> Vec<Command> {
        self.update(Direction::from_active(active))
    }

    /// Releases whatever is held
    pub fn reset(&mut self) -> Vec<Command> {
        self.update(Direction::Neutral)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn presses_once_while_held() {
        let mut trigger = EdgeTrigger::new(AxisBinding::steering());
        assert_eq!(
            trigger.update(Direction::Positive),
            vec![Command::Press(Button::Right)]
        );
        for _ in 0..10 {
            assert!(trigger.update(Direction::Positive).is_empty());
        }
        assert_eq!(
            trigger.update(Direction::Neutral),
            vec![Command::Release(Button::Right)]
        );
        assert!(trigger.update(Direction::Neutral).is_empty());
    }

    #[test]
    fn flip_releases_before_pressing() {
        let mut trigger = EdgeTrigger::new(AxisBinding::steering());
        trigger.update(Direction::Negative);
        assert_eq!(
            trigger.update(Direction::Positive),
            vec![Command::Release(Button::Left), Command::Press(Button::Right)]
        );
        assert_eq!(trigger.current(), Direction::Positive);
    }

    #[test]
    fn binary_control_ignores_negative_side() {
        let mut trigger = EdgeTrigger::binary(Button::Nitro);
        assert!(trigger.update(Direction::Negative).is_empty());
        assert_eq!(trigger.set_active(true), vec![Command::Press(Button::Nitro)]);
        assert_eq!(
            trigger.update(Direction::Negative),
            vec![Command::Release(Button::Nitro)]
        );
    }

    #[test]
    fn presses_and_releases_pair_up() {
        let inputs = [
            Direction::Positive,
            Direction::Positive,
            Direction::Negative,
            Direction::Neutral,
            Direction::Negative,
            Direction::Negative,
            Direction::Positive,
            Direction::Neutral,
        ];
        let mut trigger = EdgeTrigger::new(AxisBinding::throttle());
        let mut held: HashMap<Button, i32> = HashMap::new();
        for input in inputs {
            for command in trigger.update(input) {
                match command {
                    Command::Press(b) => *held.entry(b).or_default() += 1,
                    Command::Release(b) => *held.entry(b).or_default() -= 1,
                    Command::Tap(_) => unreachable!(),
                }
                // never both sides at once
                assert!(held.values().filter(|v| **v > 0).count() <= 1);
            }
        }
        assert!(held.values().all(|v| *v == 0));
    }

    #[test]
    fn direction_from_value_uses_dead_zone() {
        assert_eq!(Direction::from_value(0.05, 0.1), Direction::Neutral);
        assert_eq!(Direction::from_value(-0.5, 0.1), Direction::Negative);
        assert_eq!(Direction::from_value(0.5, 0.1), Direction::Positive);
        assert_eq!(Direction::from_value(f32::NAN, 0.1), Direction::Neutral);
    }
}
