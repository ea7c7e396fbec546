//! Link core for a Bluetooth serial port toy car.
//!
//! This crate provides:
//! - A fixed arena carved into chunk pools ([`mem`])
//! - The session table and inquiry cache ([`session`], [`discovery`])
//! - The connection state machine driven by engine events ([`lifecycle`])
//! - Event decoding and routing plus the control task ([`event`], [`dispatch`], [`control`])
//! - Interrupt-side flags for the indicator, buttons and idle timeout ([`advisory`])
//!
//! The radio's protocol engine and the board (sensor, motors, LEDs) are
//! reached through the [`ProtocolEngine`] and [`Application`] traits.

#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible everywhere
mod fmt;

pub mod advisory;
pub mod bd_addr;
pub mod config;
pub mod control;
pub mod discovery;
pub mod dispatch;
pub mod drive;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod mem;
pub mod naming;
pub mod sdp;
pub mod session;
pub mod storage;

#[cfg(test)]
mod testutil;

pub use advisory::{Advisory, Button};
pub use bd_addr::BdAddr;
pub use config::Config;
pub use control::{control_task, timer_task, EventChannel, InputChannel, UserInput};
pub use engine::ProtocolEngine;
pub use event::{Event, EventKind};
pub use lifecycle::{Application, ConnectionManager, Indication};
