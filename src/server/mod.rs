//! Receiving end of the command protocol
//!
//! Stands in for the controller emulation process: it binds the input
//! ports, decodes tokens and drives a [`CommandExecutor`].

pub mod executor;
pub mod input_server;

pub use executor::{key_binding, CommandExecutor, Key, KeyAction, KeyboardExecutor};
pub use input_server::{decode, Datagram, InputServer, InputServerSettings, ServerError, ServerStats};
