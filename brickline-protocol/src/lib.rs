//! NXT Direct Command Protocol
//!
//! This crate defines the binary protocol spoken by a LEGO NXT brick over
//! serial or Bluetooth RFCOMM: how outbound commands are laid out on the
//! wire, and how inbound frames are classified and decoded into typed
//! replies.
//!
//! # Protocol Overview
//!
//! Every message travels in a length-prefixed frame:
//! ```text
//! ┌────────────┬───────────┬──────┬─────────────────┐
//! │ LENGTH     │ TYPE      │ CODE │ TELEGRAM        │
//! │ 2B (LE)    │ 1B        │ 1B   │ 0–62B           │
//! └────────────┴───────────┴──────┴─────────────────┘
//!              └──────────── payload (≤ 64B) ────────┘
//! ```
//!
//! `TYPE` is `direct` (0x00), `system` (0x01) or `reply` (0x02), with bit 7
//! set when the sender does not want a reply. `CODE` identifies the command;
//! replies echo the code of the command they answer.
//!
//! The codec is strict on send (every field is validated before a byte
//! leaves) and lenient on receive (unknown or malformed replies become a
//! generic [`Message`] carrying the raw bytes and the decode error).

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

/// Invoke `$callback!` with every message type, commands first
///
/// Both the kind enum and the decoded body enum are generated from this one
/// list so the two can never drift apart.
macro_rules! message_catalog {
    ($callback:ident) => {
        $callback! {
            commands {
                StartProgram,
                PlaySoundFile,
                PlayTone,
                SetOutputState,
                SetInputMode,
                GetOutputState,
                GetInputValues,
                ResetInputScaledValue,
                MessageWrite,
                ResetMotorPosition,
                GetBatteryLevel,
                StopSoundPlayback,
                KeepAlive,
                LsGetStatus,
                LsWrite,
                LsRead,
                GetCurrentProgramName,
                MessageRead,
                GetVersion,
                GetInfo,
            }
            replies {
                OutputState,
                InputValues,
                BatteryResponse,
                SleepTimeout,
                LsStatus,
                LsReadResponse,
                CurrentProgramName,
                MessageReadResponse,
            }
        }
    };
}

pub mod command;
pub mod commands;
pub mod error;
pub mod fields;
pub mod frame;
pub mod layout;
pub mod message;
pub mod registry;
pub mod replies;

pub use command::{Command, Reply, Telegram};
pub use error::{DecodeError, ProtocolError};
pub use fields::{
    CommandType, InputPort, Mailbox, ModeByte, OutputMode, OutputPort, RegulationMode, Reported,
    RunState, SensorMode, SensorType,
};
pub use frame::{Frame, FrameError, FrameParser, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};
pub use layout::Payload;
pub use message::{Body, Header, Message};
pub use registry::{resolve, ExpectedReply, MessageKind, Registry, REGISTRY};
pub use replies::Status;
