//! Multisense kart controller
//!
//! Translates readings from several sensing sources into press/release
//! commands for a single emulated game controller.
//!
//! ```text
//! sources ──► mapping (pure state machines) ──► command sink ──► UDP
//!    │                                               ▲
//!    └──► controller (control loops, pulses) ────────┘
//!
//! UDP ──► server ──► CommandExecutor
//! ```

pub mod command;
pub mod config;
pub mod controller;
pub mod mapping;
pub mod relay;
pub mod server;
pub mod sources;
