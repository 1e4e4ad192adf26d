//! Message model
//!
//! A [`Message`] is one received (or captured) payload: the raw bytes, the
//! kind the dispatcher resolved from its header, and, when the telegram
//! matched that kind's layout, the decoded [`Body`].

use brickline_hal::StreamRx;

use crate::command::{Command, Reply, Telegram};
use crate::commands;
use crate::error::{DecodeError, ProtocolError};
use crate::fields::{CommandType, SUPPRESS_REPLY};
use crate::frame::{self, Frame, FrameError};
use crate::layout::Payload;
use crate::registry::{MessageKind, REGISTRY};
use crate::replies::{self, Status};

/// Two-byte payload header: type byte then command code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    type_byte: u8,
    code: u8,
}

impl Header {
    /// Header size in bytes
    pub const SIZE: usize = 2;

    pub const fn new(command_type: CommandType, suppress_reply: bool, code: u8) -> Self {
        let suppress = if suppress_reply { SUPPRESS_REPLY } else { 0 };
        Header {
            type_byte: suppress | command_type.as_u8(),
            code,
        }
    }

    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Header {
            type_byte: bytes[0],
            code: bytes[1],
        }
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        [self.type_byte, self.code]
    }

    /// Raw type byte, suppress bit included
    pub const fn type_byte(self) -> u8 {
        self.type_byte
    }

    pub const fn code(self) -> u8 {
        self.code
    }

    pub const fn suppress_reply(self) -> bool {
        self.type_byte & SUPPRESS_REPLY != 0
    }

    /// Command type with the suppress bit masked off; `None` if unknown
    pub const fn command_type(self) -> Option<CommandType> {
        CommandType::from_u8(self.type_byte & !SUPPRESS_REPLY)
    }

    pub const fn is_reply(self) -> bool {
        self.type_byte & !SUPPRESS_REPLY == CommandType::Reply.as_u8()
    }
}

macro_rules! message_bodies {
    (
        commands { $($cmd:ident),+ $(,)? }
        replies { $($reply:ident),+ $(,)? }
    ) => {
        /// Decoded telegram of a known message kind
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Body {
            $($cmd(commands::$cmd),)+
            $($reply(replies::$reply),)+
        }

        impl Body {
            pub fn kind(&self) -> MessageKind {
                match self {
                    $(Body::$cmd(_) => MessageKind::$cmd,)+
                    $(Body::$reply(_) => MessageKind::$reply,)+
                }
            }

            /// Decode `telegram` with the layout of `kind`
            ///
            /// The generic kind has no layout and yields `None`.
            pub fn decode(kind: MessageKind, telegram: &[u8]) -> Result<Option<Body>, DecodeError> {
                let body = match kind {
                    MessageKind::Generic => return Ok(None),
                    $(MessageKind::$cmd => Body::$cmd(commands::$cmd::from_telegram(telegram)?),)+
                    $(MessageKind::$reply => Body::$reply(replies::$reply::from_telegram(telegram)?),)+
                };
                Ok(Some(body))
            }

            /// Serialize back to a payload, header included
            pub fn render(&self) -> Result<Payload, ProtocolError> {
                match self {
                    $(Body::$cmd(m) => Command::render(m),)+
                    $(Body::$reply(m) => Reply::render(m),)+
                }
            }

            /// Device status, for replies
            pub fn status(&self) -> Option<Status> {
                match self {
                    $(Body::$reply(m) => Some(m.status()),)+
                    _ => None,
                }
            }
        }

        $(
            impl From<commands::$cmd> for Body {
                fn from(m: commands::$cmd) -> Body {
                    Body::$cmd(m)
                }
            }
        )+

        $(
            impl From<replies::$reply> for Body {
                fn from(m: replies::$reply) -> Body {
                    Body::$reply(m)
                }
            }

            impl TryFrom<Body> for replies::$reply {
                type Error = Body;

                fn try_from(body: Body) -> Result<Self, Body> {
                    match body {
                        Body::$reply(m) => Ok(m),
                        other => Err(other),
                    }
                }
            }
        )+
    };
}

message_catalog!(message_bodies);

/// A payload with its resolved kind and, if it decoded, its fields
///
/// Decoding is lenient: a payload that does not match its layout still
/// produces a message, with `body` unset and the reason in `error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    payload: Payload,
    kind: MessageKind,
    body: Option<Body>,
    error: Option<DecodeError>,
}

impl Message {
    /// Classify a payload by its header and decode it
    ///
    /// Only a payload longer than a frame can carry is rejected; every
    /// other failure is recorded on the message.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let payload = Payload::from_slice(payload).map_err(|_| ProtocolError::PayloadTooLarge)?;

        let Some(header) = header_of(&payload) else {
            warn!("payload of {} bytes has no header", payload.len());
            let error = DecodeError::MissingHeader { len: payload.len() };
            return Ok(Self {
                payload,
                kind: MessageKind::Generic,
                body: None,
                error: Some(error),
            });
        };

        let kind = REGISTRY.resolve(header.type_byte(), header.code());
        let mut msg = Self::decode(payload, kind);
        if REGISTRY.lookup(header.code()).is_none() {
            msg.error = Some(DecodeError::UnrecognizedCommand(header.code()));
        }
        Ok(msg)
    }

    /// Decode a payload as `kind`, ignoring what its header says
    pub fn parse_as(kind: MessageKind, payload: &[u8]) -> Result<Self, ProtocolError> {
        let payload = Payload::from_slice(payload).map_err(|_| ProtocolError::PayloadTooLarge)?;
        if payload.len() < Header::SIZE {
            let error = DecodeError::MissingHeader { len: payload.len() };
            warn!("{} payload has no header", kind.name());
            return Ok(Self {
                payload,
                kind,
                body: None,
                error: Some(error),
            });
        }
        Ok(Self::decode(payload, kind))
    }

    /// Read one frame from `stream` and decode it
    pub fn read<S: StreamRx + ?Sized>(stream: &mut S) -> Result<Self, FrameError> {
        let payload = frame::read_payload(stream)?;
        // The frame reader already bounds the payload
        Self::from_payload(&payload).map_err(|_| FrameError::FrameTooLarge)
    }

    fn decode(payload: Payload, kind: MessageKind) -> Self {
        let (body, error) = match Body::decode(kind, &payload[Header::SIZE..]) {
            Ok(body) => (body, None),
            Err(e) => {
                warn!("malformed {} payload: {:?}", kind.name(), e);
                debug!("payload: {:?}", &payload[..]);
                (None, Some(e))
            }
        };
        Self {
            payload,
            kind,
            body,
            error,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Decoded fields, if the payload matched its layout
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn into_body(self) -> Option<Body> {
        self.body
    }

    /// Why decoding failed or fell back to the generic kind
    pub fn error(&self) -> Option<DecodeError> {
        self.error
    }

    /// Raw payload, header included
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload without the header
    pub fn telegram(&self) -> &[u8] {
        self.payload.get(Header::SIZE..).unwrap_or(&[])
    }

    pub fn header(&self) -> Option<Header> {
        header_of(&self.payload)
    }

    pub fn is_reply(&self) -> bool {
        self.header().is_some_and(Header::is_reply)
    }

    /// Device status of a reply
    ///
    /// Read from the decoded body when there is one, else from the first
    /// telegram byte of any reply frame.
    pub fn status(&self) -> Option<Status> {
        match &self.body {
            Some(body) => body.status(),
            None if self.is_reply() => self.telegram().first().map(|&b| Status(b)),
            None => None,
        }
    }

    /// Payload bytes as they would be sent
    ///
    /// A decoded message re-serializes from its fields; anything else
    /// echoes the raw bytes it was built from.
    pub fn render(&self) -> Result<Payload, ProtocolError> {
        match &self.body {
            Some(body) => body.render(),
            None => Ok(self.payload.clone()),
        }
    }

    pub fn to_frame(&self) -> Result<Frame, ProtocolError> {
        Ok(frame::encode(&self.render()?)?)
    }
}

fn header_of(payload: &[u8]) -> Option<Header> {
    match payload {
        [type_byte, code, ..] => Some(Header::from_bytes([*type_byte, *code])),
        _ => None,
    }
}
