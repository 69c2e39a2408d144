//! Two-pedal state machine: accelerator, brake, and both together for skidding

use crate::command::{Button, Command};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PedalState {
    #[default]
    Neutral,
    Accel,
    Brake,
    Skid,
}

impl PedalState {
    pub const ALL: [PedalState; 4] = [
        PedalState::Neutral,
        PedalState::Accel,
        PedalState::Brake,
        PedalState::Skid,
    ];

    /// State implied by the two pedals
    pub fn target(accel_pressed: bool, brake_pressed: bool) -> Self {
        match (accel_pressed, brake_pressed) {
            (true, true) => PedalState::Skid,
            (true, false) => PedalState::Accel,
            (false, true) => PedalState::Brake,
            (false, false) => PedalState::Neutral,
        }
    }
}

/// Pure transition function: next state and the commands to send on the way
pub fn next(
    accel_pressed: bool,
    brake_pressed: bool,
    current: PedalState,
) -> (PedalState, Vec<Command>) {
    let target = PedalState::target(accel_pressed, brake_pressed);
    if target == current {
        return (current, Vec::new());
    }

    let mut commands = Vec::new();
    match target {
        PedalState::Skid => {
            // skidding keeps the accelerator held
            if current == PedalState::Brake {
                commands.push(Command::Release(Button::Down));
            }
            commands.push(Command::Press(Button::Skidding));
        }
        PedalState::Accel => {
            commands.extend(release_partial(current));
            commands.push(Command::Press(Button::Up));
        }
        PedalState::Brake => {
            commands.extend(release_partial(current));
            commands.push(Command::Press(Button::Down));
        }
        PedalState::Neutral => commands.extend(release_partial(current)),
    }
    (target, commands)
}

/// Releases for everything `current` holds; SKID holds the accelerator too
fn release_partial(current: PedalState) -> Vec<Command> {
    match current {
        PedalState::Accel => vec![Command::Release(Button::Up)],
        PedalState::Brake => vec![Command::Release(Button::Down)],
        PedalState::Skid => vec![
            Command::Release(Button::Skidding),
            Command::Release(Button::Up),
        ],
        PedalState::Neutral => vec![],
    }
}

/// Pedal state owned by the pedal reader
#[derive(Clone, Debug, Default)]
pub struct PedalStateMachine {
    state: PedalState,
}

impl PedalStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PedalState {
        self.state
    }

    pub fn process_pedal_data(&mut self, accel_pressed: bool, brake_pressed: bool) -> Vec<Command> {
        let (state, commands) = next(accel_pressed, brake_pressed, self.state);
        if state != self.state {
            debug!("Pedal state {:?} -> {:?}: {:?}", self.state, state, commands);
        }
        self.state = state;
        commands
    }
}
