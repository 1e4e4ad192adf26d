//! Message traits
//!
//! - [`Telegram`]: a typed message body with an explicit binary layout.
//! - [`Command`]: a telegram that can be sent. Carries its code, type and
//!   the reply it solicits, and validates its fields before serializing.
//! - [`Reply`]: a telegram the device sends back in answer to a command.

use crate::error::{DecodeError, ProtocolError};
use crate::fields::CommandType;
use crate::frame::{self, Frame};
use crate::layout::{Payload, Reader, Writer};
use crate::message::Header;
use crate::registry::{ExpectedReply, MessageKind};
use crate::replies::Status;

/// Typed message body
///
/// `encode` and `decode` describe the same field sequence; the header is
/// handled by the caller.
pub trait Telegram: Sized {
    /// Registry identity of this message type
    const KIND: MessageKind;

    /// Pack fields in layout order
    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError>;

    /// Unpack fields in layout order
    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError>;

    /// Decode a complete telegram, rejecting leftover bytes
    fn from_telegram(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);
        let value = Self::decode(&mut r)?;
        r.finish()?;
        Ok(value)
    }
}

/// A message that can be sent to the brick
///
/// Commands are plain values: serializing is a pure function of their
/// fields, and a command may be modified (through [`Command::update`]) and
/// sent again.
pub trait Command: Telegram + Clone {
    /// Command byte code
    const CODE: u8;

    /// Direct or system command
    const COMMAND_TYPE: CommandType = CommandType::Direct;

    /// Reply the device sends for this command
    const EXPECTED_REPLY: ExpectedReply = ExpectedReply::None;

    /// Check every field against its domain and cross-field rules
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Whether the header asks the device to stay quiet
    fn suppress_reply() -> bool {
        Self::EXPECTED_REPLY.is_none()
    }

    /// Type/code header for this command
    fn header(&self) -> Header {
        Header::new(Self::COMMAND_TYPE, Self::suppress_reply(), Self::CODE)
    }

    /// Validate and serialize to a payload (header + telegram)
    fn render(&self) -> Result<Payload, ProtocolError> {
        self.validate()?;
        let mut w = Writer::new();
        w.header(self.header())?;
        self.encode(&mut w)?;
        Ok(w.finish())
    }

    /// Validate, serialize and add the length prefix
    fn to_frame(&self) -> Result<Frame, ProtocolError> {
        let payload = self.render()?;
        Ok(frame::encode(&payload)?)
    }

    /// Apply a mutation, keeping it only if the result still validates
    fn update<F>(&mut self, mutate: F) -> Result<(), ProtocolError>
    where
        F: FnOnce(&mut Self),
    {
        let mut next = self.clone();
        mutate(&mut next);
        next.validate()?;
        *self = next;
        Ok(())
    }
}

/// A message the brick sends in answer to a command
pub trait Reply: Telegram {
    /// Code of the command this reply answers
    const REQUEST_CODE: u8;

    /// Status byte reported by the device
    fn status(&self) -> Status;

    /// Serialize with a reply header, as the device would
    fn render(&self) -> Result<Payload, ProtocolError> {
        let mut w = Writer::new();
        w.header(Header::new(CommandType::Reply, false, Self::REQUEST_CODE))?;
        self.encode(&mut w)?;
        Ok(w.finish())
    }
}
