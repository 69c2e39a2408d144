//! Command vocabulary shared by every signal source
//!
//! Every command that leaves the process is one of a small, closed set of
//! ASCII tokens. Sources never build tokens by hand: they produce a [`Command`]
//! and the wire token is looked up in a single table.
//!
//! ```text
//! Command::Press(Button::Nitro)   ──► "P_NITRO"
//! Command::Release(Button::Nitro) ──► "R_NITRO"
//! Command::Tap(Tap::Pause)        ──► "PAUSE"
//! ```

pub mod channel;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use channel::{ChannelError, CommandSink, UdpCommandChannel};

/// Control message understood by the input server, not part of the command set
pub const STOP_SERVER_TOKEN: &str = "STOPSERVEUR";

/// Buttons that can be held: each one has a `P_` and an `R_` token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Button {
    Up,
    Down,
    Left,
    Right,
    Nitro,
    Skidding,
    Lookback,
    Fire,
    Rescue,
}

impl Button {
    pub const ALL: [Button; 9] = [
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Nitro,
        Button::Skidding,
        Button::Lookback,
        Button::Fire,
        Button::Rescue,
    ];

    pub fn press(self) -> Command {
        Command::Press(self)
    }

    pub fn release(self) -> Command {
        Command::Release(self)
    }
}

/// Single-shot commands, the executor presses and releases on its own
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tap {
    Fire,
    Nitro,
    Rescue,
    Pause,
    Back,
    Select,
    Cancel,
}

impl Tap {
    pub const ALL: [Tap; 7] = [
        Tap::Fire,
        Tap::Nitro,
        Tap::Rescue,
        Tap::Pause,
        Tap::Back,
        Tap::Select,
        Tap::Cancel,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Press(Button),
    Release(Button),
    Tap(Tap),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// The token is not part of the vocabulary
    #[error("Unknown command token: {0:?}")]
    UnknownToken(String),
}

impl Command {
    /// Wire token of this command
    pub fn token(&self) -> &'static str {
        match self {
            Command::Press(button) => match button {
                Button::Up => "P_UP",
                Button::Down => "P_DOWN",
                Button::Left => "P_LEFT",
                Button::Right => "P_RIGHT",
                Button::Nitro => "P_NITRO",
                Button::Skidding => "P_SKIDDING",
                Button::Lookback => "P_LOOKBACK",
                Button::Fire => "P_FIRE",
                Button::Rescue => "P_RESCUE",
            },
            Command::Release(button) => match button {
                Button::Up => "R_UP",
                Button::Down => "R_DOWN",
                Button::Left => "R_LEFT",
                Button::Right => "R_RIGHT",
                Button::Nitro => "R_NITRO",
                Button::Skidding => "R_SKIDDING",
                Button::Lookback => "R_LOOKBACK",
                Button::Fire => "R_FIRE",
                Button::Rescue => "R_RESCUE",
            },
            Command::Tap(tap) => match tap {
                Tap::Fire => "FIRE",
                Tap::Nitro => "NITRO",
                Tap::Rescue => "RESCUE",
                Tap::Pause => "PAUSE",
                Tap::Back => "BACK",
                Tap::Select => "SELECT",
                Tap::Cancel => "CANCEL",
            },
        }
    }

    /// Every command of the vocabulary
    pub fn all() -> impl Iterator<Item = Command> {
        Button::ALL
            .into_iter()
            .flat_map(|button| [Command::Press(button), Command::Release(button)])
            .chain(Tap::ALL.into_iter().map(Command::Tap))
    }

    pub fn is_press(&self) -> bool {
        matches!(self, Command::Press(_))
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Command::Release(_))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Command::all()
            .find(|command| command.token() == token)
            .ok_or_else(|| CommandError::UnknownToken(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tokens_are_unique() {
        let tokens: HashSet<&str> = Command::all().map(|c| c.token()).collect();
        assert_eq!(tokens.len(), Command::all().count());
        assert_eq!(tokens.len(), 25);
    }

    #[test]
    fn parses_every_token() {
        for command in Command::all() {
            assert_eq!(command.token().parse::<Command>(), Ok(command));
        }
    }

    #[test]
    fn parse_trims_whitespace() {
        assert_eq!(" P_NITRO\n".parse(), Ok(Command::Press(Button::Nitro)));
    }

    #[test]
    fn unknown_tokens_are_rejected() {
        assert_eq!(
            "P_JUMP".parse::<Command>(),
            Err(CommandError::UnknownToken("P_JUMP".to_string()))
        );
        assert!(STOP_SERVER_TOKEN.parse::<Command>().is_err());
    }
}
