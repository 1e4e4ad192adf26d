//! Connection to a brick
//!
//! Wraps a byte stream and drives the exchange state machine: commands go
//! out framed, replies come back as [`Message`]s, and a second send while a
//! reply is still owed is refused.

use brickline_hal::{Stream, StreamError};
use brickline_protocol::frame;
use brickline_protocol::{
    Body, Command, DecodeError, FrameError, Message, MessageKind, ProtocolError, Reply, Status,
};

use crate::state::{ExchangeEvent, ExchangeState};

/// Errors from talking to a brick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Command failed validation or could not be framed
    Protocol(ProtocolError),
    /// Transport failure while reading or writing a frame
    Frame(FrameError),
    /// A reply to the previous command has not been read yet
    ReplyPending,
    /// The frame read back is not the reply the command asked for
    UnexpectedReply {
        expected: MessageKind,
        actual: MessageKind,
    },
    /// The reply arrived but did not match its layout
    Decode(DecodeError),
    /// The brick answered with a non-zero status
    DeviceStatus(Status),
    /// No candidate answered the probe
    DeviceNotFound,
}

impl From<ProtocolError> for LinkError {
    fn from(e: ProtocolError) -> Self {
        LinkError::Protocol(e)
    }
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        LinkError::Frame(e)
    }
}

impl From<StreamError> for LinkError {
    fn from(e: StreamError) -> Self {
        LinkError::Frame(e.into())
    }
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkError::Protocol(e) => write!(f, "{}", e),
            LinkError::Frame(e) => write!(f, "{}", e),
            LinkError::ReplyPending => f.write_str("a reply is still pending"),
            LinkError::UnexpectedReply { expected, actual } => {
                write!(f, "expected {} reply, got {}", expected.name(), actual.name())
            }
            LinkError::Decode(e) => write!(f, "malformed reply: {}", e),
            LinkError::DeviceStatus(status) => write!(f, "brick reported {}", status),
            LinkError::DeviceNotFound => f.write_str("no brick found"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LinkError {}

/// A half-duplex connection to one brick
pub struct Connection<S> {
    stream: S,
    state: ExchangeState,
    pending: Option<MessageKind>,
}

impl<S: Stream> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            state: ExchangeState::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Command whose reply is owed, if any
    pub fn pending(&self) -> Option<MessageKind> {
        self.pending
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn apply(&mut self, event: ExchangeEvent) {
        self.state = self.state.transition(event);
    }

    /// Validate, frame and write a command
    ///
    /// Fails with [`LinkError::ReplyPending`] if the previous command's
    /// reply has not been received.
    pub fn send<C: Command>(&mut self, command: &C) -> Result<(), LinkError> {
        if !self.state.can_send() {
            return Err(LinkError::ReplyPending);
        }
        let payload = command.render()?;
        let expects_reply = !C::suppress_reply();

        self.apply(ExchangeEvent::Send { expects_reply });
        if let Err(e) = frame::write_payload(&mut self.stream, &payload) {
            self.apply(ExchangeEvent::StreamFailed);
            return Err(e.into());
        }
        self.apply(ExchangeEvent::Written);
        self.pending = expects_reply.then_some(C::KIND);
        debug!("sent {}", C::KIND.name());
        Ok(())
    }

    /// Read and decode one frame
    pub fn receive(&mut self) -> Result<Message, LinkError> {
        match Message::read(&mut self.stream) {
            Ok(msg) => {
                self.apply(ExchangeEvent::ReplyReceived);
                self.pending = None;
                debug!("received {}", msg.kind().name());
                Ok(msg)
            }
            Err(e) => {
                self.apply(ExchangeEvent::StreamFailed);
                self.pending = None;
                Err(e.into())
            }
        }
    }

    /// Send a command and, if it asks for one, read the reply
    pub fn request<C: Command>(&mut self, command: &C) -> Result<Option<Message>, LinkError> {
        self.send(command)?;
        if C::suppress_reply() {
            return Ok(None);
        }
        self.receive().map(Some)
    }

    /// Send a command and decode its typed reply
    ///
    /// A reply with a non-zero status fails with
    /// [`LinkError::DeviceStatus`].
    pub fn query<C, R>(&mut self, command: &C) -> Result<R, LinkError>
    where
        C: Command,
        R: Reply + TryFrom<Body>,
    {
        self.send(command)?;
        let msg = self.receive()?;
        if msg.kind() != R::KIND {
            return Err(LinkError::UnexpectedReply {
                expected: R::KIND,
                actual: msg.kind(),
            });
        }
        // A failed request may pad the rest of the telegram with garbage
        let status = msg.status();
        let body = match (msg.error(), msg.into_body()) {
            (_, Some(body)) => body,
            (Some(e), None) => {
                return Err(match status {
                    Some(status) if !status.is_success() => LinkError::DeviceStatus(status),
                    _ => LinkError::Decode(e),
                })
            }
            (None, None) => {
                return Err(LinkError::UnexpectedReply {
                    expected: R::KIND,
                    actual: MessageKind::Generic,
                })
            }
        };
        let actual = body.kind();
        let reply = R::try_from(body).map_err(|_| LinkError::UnexpectedReply {
            expected: R::KIND,
            actual,
        })?;
        if !reply.status().is_success() {
            warn!("{} failed: {:?}", C::KIND.name(), reply.status());
            return Err(LinkError::DeviceStatus(reply.status()));
        }
        Ok(reply)
    }

    /// Flush and release the stream
    pub fn close(self) -> Result<(), LinkError> {
        self.stream.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brickline_hal::MemoryStream;
    use brickline_protocol::commands::{
        GetBatteryLevel, GetCurrentProgramName, KeepAlive, PlayTone, SetOutputState,
    };
    use brickline_protocol::replies::{BatteryResponse, CurrentProgramName, SleepTimeout};
    use brickline_protocol::OutputPort;

    type TestStream = MemoryStream<128>;

    const BATTERY_REPLY: [u8; 7] = [0x05, 0x00, 0x02, 0x0B, 0x00, 0x50, 0x00];

    #[test]
    fn test_send_writes_frame() {
        let mut conn = Connection::new(TestStream::new());
        conn.send(&GetBatteryLevel).unwrap();
        assert_eq!(conn.stream().written(), &[0x02, 0x00, 0x00, 0x0B]);
        assert_eq!(conn.state(), ExchangeState::AwaitingReply);
        assert_eq!(conn.pending(), Some(MessageKind::GetBatteryLevel));
    }

    #[test]
    fn test_send_while_awaiting_reply() {
        let mut conn = Connection::new(TestStream::new());
        conn.send(&GetBatteryLevel).unwrap();
        assert_eq!(conn.send(&KeepAlive), Err(LinkError::ReplyPending));
        // Nothing else went out
        assert_eq!(conn.stream().written().len(), 4);
    }

    #[test]
    fn test_suppressed_command_returns_to_idle() {
        let mut conn = Connection::new(TestStream::new());
        conn.send(&PlayTone::new(440, 100).unwrap()).unwrap();
        assert_eq!(conn.state(), ExchangeState::Idle);
        assert_eq!(conn.pending(), None);
        conn.send(&SetOutputState::idle(OutputPort::A)).unwrap();
    }

    #[test]
    fn test_invalid_command_sends_nothing() {
        let mut conn = Connection::new(TestStream::new());
        let mut cmd = SetOutputState::idle(OutputPort::B);
        cmd.set_power = 127;
        assert!(matches!(
            conn.send(&cmd),
            Err(LinkError::Protocol(ProtocolError::InvalidField { .. }))
        ));
        assert!(conn.stream().written().is_empty());
        assert_eq!(conn.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_receive_clears_pending() {
        let mut conn = Connection::new(TestStream::with_rx(&BATTERY_REPLY).unwrap());
        conn.send(&GetBatteryLevel).unwrap();
        let msg = conn.receive().unwrap();
        assert_eq!(msg.kind(), MessageKind::BatteryResponse);
        assert_eq!(conn.state(), ExchangeState::Idle);
        conn.send(&KeepAlive).unwrap();
    }

    #[test]
    fn test_query_typed_reply() {
        let mut conn = Connection::new(TestStream::with_rx(&BATTERY_REPLY).unwrap());
        let reply: BatteryResponse = conn.query(&GetBatteryLevel).unwrap();
        assert_eq!(reply.millivolts, 80);
    }

    #[test]
    fn test_query_wrong_reply() {
        let mut conn = Connection::new(TestStream::with_rx(&BATTERY_REPLY).unwrap());
        let result: Result<SleepTimeout, _> = conn.query(&KeepAlive);
        assert_eq!(
            result,
            Err(LinkError::UnexpectedReply {
                expected: MessageKind::SleepTimeout,
                actual: MessageKind::BatteryResponse,
            })
        );
        assert_eq!(conn.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_query_device_status() {
        let reply = [0x07, 0x00, 0x02, 0x0D, 0xEC, 0x00, 0x00, 0x00, 0x00];
        let mut conn = Connection::new(TestStream::with_rx(&reply).unwrap());
        let result: Result<SleepTimeout, _> = conn.query(&KeepAlive);
        assert_eq!(result, Err(LinkError::DeviceStatus(Status::NO_ACTIVE_PROGRAM)));
    }

    #[test]
    fn test_query_malformed_reply() {
        let reply = [0x04, 0x00, 0x02, 0x0B, 0x00, 0x50];
        let mut conn = Connection::new(TestStream::with_rx(&reply).unwrap());
        let result: Result<BatteryResponse, _> = conn.query(&GetBatteryLevel);
        assert_eq!(
            result,
            Err(LinkError::Decode(DecodeError::MalformedPayload {
                expected: 3,
                actual: 2
            }))
        );
    }

    #[test]
    fn test_query_failed_status_with_malformed_body() {
        let reply = [0x03, 0x00, 0x02, 0x11, 0xEC];
        let mut conn = Connection::new(TestStream::with_rx(&reply).unwrap());
        let result: Result<CurrentProgramName, _> = conn.query(&GetCurrentProgramName);
        assert_eq!(result, Err(LinkError::DeviceStatus(Status::NO_ACTIVE_PROGRAM)));
    }

    #[test]
    fn test_short_read_resets_state() {
        let mut conn = Connection::new(TestStream::with_rx(&[0x05, 0x00, 0x02]).unwrap());
        conn.send(&GetBatteryLevel).unwrap();
        assert_eq!(conn.receive(), Err(LinkError::Frame(FrameError::ShortRead)));
        assert_eq!(conn.state(), ExchangeState::Idle);
    }

    #[test]
    fn test_request_fire_and_forget() {
        let mut conn = Connection::new(TestStream::new());
        let reply = conn.request(&SetOutputState::idle(OutputPort::All)).unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn test_close_stream() {
        let conn = Connection::new(TestStream::new());
        assert_eq!(conn.close(), Ok(()));
    }
}
