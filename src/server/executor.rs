//! Executor side of the command vocabulary: what each token does to the game
//!
//! Key injection itself belongs to the platform; the keyboard executor
//! resolves commands to key actions, tracks which keys are down, and logs
//! what it would inject.

use crate::command::{Button, Command, Tap};
use std::collections::BTreeSet;
use std::sync::Mutex;
use tracing::{error, info};

/// Consumer of commands received by the input server
pub trait CommandExecutor: Send + Sync + 'static {
    fn execute(&self, command: Command);

    /// Called once when the server stops
    fn shutdown(&self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Space,
    N,
    V,
    B,
    Backspace,
    Escape,
    Enter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Press,
    Release,
    PressAndRelease,
}

fn button_key(button: Button) -> Key {
    match button {
        Button::Up => Key::Up,
        Button::Down => Key::Down,
        Button::Left => Key::Left,
        Button::Right => Key::Right,
        Button::Nitro => Key::N,
        Button::Skidding => Key::V,
        Button::Lookback => Key::B,
        Button::Fire => Key::Space,
        Button::Rescue => Key::Backspace,
    }
}

fn tap_key(tap: Tap) -> Key {
    match tap {
        Tap::Fire => Key::Space,
        Tap::Nitro => Key::N,
        Tap::Rescue | Tap::Back | Tap::Cancel => Key::Backspace,
        Tap::Pause => Key::Escape,
        Tap::Select => Key::Enter,
    }
}

/// Key and action bound to a command
pub fn key_binding(command: Command) -> (Key, KeyAction) {
    match command {
        Command::Press(button) => (button_key(button), KeyAction::Press),
        Command::Release(button) => (button_key(button), KeyAction::Release),
        Command::Tap(tap) => (tap_key(tap), KeyAction::PressAndRelease),
    }
}

/// Keyboard executor bookkeeping pressed keys
#[derive(Debug, Default)]
pub struct KeyboardExecutor {
    held: Mutex<BTreeSet<Key>>,
}

impl KeyboardExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn held_keys(&self) -> Vec<Key> {
        self.held
            .lock()
            .map(|held| held.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl CommandExecutor for KeyboardExecutor {
    fn execute(&self, command: Command) {
        let (key, action) = key_binding(command);
        let mut held = match self.held.lock() {
            Ok(held) => held,
            Err(e) => {
                error!("Key table poisoned, dropping {}: {}", command, e);
                return;
            }
        };

        match action {
            KeyAction::Press => {
                held.insert(key);
            }
            KeyAction::Release => {
                held.remove(&key);
            }
            KeyAction::PressAndRelease => {}
        }
        info!("{} -> {:?} {:?}", command, action, key);
    }

    fn shutdown(&self) {
        if let Ok(mut held) = self.held.lock() {
            for key in std::mem::take(&mut *held) {
                info!("Releasing {:?} on shutdown", key);
            }
        }
    }
}
