//! Host- and target-agnostic logic on top of the NXT codec
//!
//! - Exchange state machine enforcing one request in flight
//! - [`Connection`]: send/receive over any [`brickline_hal::Stream`]
//! - Routines built from commands (battery, motors, sensors)
//! - Locator that probes candidate streams for a brick
//! - Configuration type definitions

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod config;
pub mod link;
pub mod locator;
pub mod routine;
pub mod state;

pub use config::{ConfigError, LinkConfig};
pub use link::{Connection, LinkError};
pub use locator::find_brick;
pub use state::{ExchangeEvent, ExchangeState};
