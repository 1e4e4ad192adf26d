//! Protocol error types
//!
//! Errors split along the send/receive asymmetry:
//! - [`ProtocolError`] is returned while building or sending a message and
//!   aborts that send.
//! - [`DecodeError`] is never returned from a read. It is recorded on the
//!   resulting [`Message`](crate::Message) so one bad reply cannot take down
//!   the read loop.

use crate::frame::FrameError;

/// Failure to build or frame an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// A field value is outside its legal domain
    ///
    /// For text and byte-string fields `value` is the length in bytes.
    InvalidField {
        field: &'static str,
        value: i64,
        reason: &'static str,
    },
    /// Assembled payload exceeds the device's 64-byte receive buffer
    PayloadTooLarge,
    /// Framing or transport failure
    Frame(FrameError),
}

impl ProtocolError {
    pub(crate) const fn invalid(field: &'static str, value: i64, reason: &'static str) -> Self {
        ProtocolError::InvalidField {
            field,
            value,
            reason,
        }
    }
}

impl From<FrameError> for ProtocolError {
    fn from(e: FrameError) -> Self {
        ProtocolError::Frame(e)
    }
}

impl core::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProtocolError::InvalidField {
                field,
                value,
                reason,
            } => write!(f, "invalid {} {}: {}", field, value, reason),
            ProtocolError::PayloadTooLarge => f.write_str("payload exceeds 64 bytes"),
            ProtocolError::Frame(e) => write!(f, "{}", e),
        }
    }
}

/// Why an inbound payload could not be decoded into typed fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Payload is shorter than the 2-byte type/code header
    MissingHeader { len: usize },
    /// No message kind is registered for this command code
    UnrecognizedCommand(u8),
    /// Telegram byte count does not match the layout
    MalformedPayload { expected: usize, actual: usize },
    /// A decoded field is outside its domain
    InvalidField { field: &'static str, value: i64 },
    /// A string field is unterminated or not ASCII
    InvalidText { field: &'static str },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::MissingHeader { len } => {
                write!(f, "payload of {} bytes has no header", len)
            }
            DecodeError::UnrecognizedCommand(code) => {
                write!(f, "unrecognized command {:#04x}", code)
            }
            DecodeError::MalformedPayload { expected, actual } => {
                write!(f, "telegram is {} bytes, layout needs {}", actual, expected)
            }
            DecodeError::InvalidField { field, value } => {
                write!(f, "{} has out-of-domain value {}", field, value)
            }
            DecodeError::InvalidText { field } => write!(f, "{} is not valid ASCIIZ text", field),
        }
    }
}
