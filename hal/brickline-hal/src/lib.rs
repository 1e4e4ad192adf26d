//! Brickline Transport Abstraction Layer
//!
//! This crate defines the byte-stream traits the protocol codec is written
//! against. The NXT brick is reachable over a serial line or a Bluetooth
//! RFCOMM channel; both look like a plain blocking byte stream once opened,
//! so the codec never needs to know which one it is talking to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  brickline-core (connection, routines)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  brickline-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │   IoStream    │       │ EmbeddedStream│
//! │  (std::io)    │       │ (embedded-io) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`stream::StreamTx`], [`stream::StreamRx`] - Blocking byte transport

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

pub mod adapter;
pub mod memory;
pub mod stream;

// Re-export key traits at crate root for convenience
pub use adapter::EmbeddedStream;
#[cfg(feature = "std")]
pub use adapter::IoStream;
pub use memory::MemoryStream;
pub use stream::{Stream, StreamConfig, StreamError, StreamRx, StreamTx};
