//! Reply catalog
//!
//! Every reply telegram starts with a status byte. Replies never register
//! in the dispatch table; they are reached through the command they answer.

use heapless::{String, Vec};

use crate::command::{Reply, Telegram};
use crate::error::{DecodeError, ProtocolError};
use crate::fields::{
    InputPort, Mailbox, ModeByte, OutputPort, RegulationMode, Reported, RunState, SensorMode,
    SensorType,
};
use crate::layout::{decoded_text, Reader, Writer};
use crate::registry::MessageKind;

/// Width of the program name field in [`CurrentProgramName`]
pub const PROGRAM_NAME_WIDTH: usize = 20;

/// Width of the length-prefixed data field in [`LsReadResponse`]
pub const LS_DATA_WIDTH: usize = 17;

/// Width of the length-prefixed message field in [`MessageReadResponse`]
pub const MAILBOX_MESSAGE_WIDTH: usize = 60;

/// Device status byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    pub const PENDING: Status = Status(0x20);
    pub const MAILBOX_EMPTY: Status = Status(0x40);
    pub const REQUEST_FAILED: Status = Status(0xBD);
    pub const UNKNOWN_OPCODE: Status = Status(0xBE);
    pub const INSANE_PACKET: Status = Status(0xBF);
    pub const OUT_OF_RANGE: Status = Status(0xC0);
    pub const BUS_ERROR: Status = Status(0xDD);
    pub const BUFFER_FULL: Status = Status(0xDE);
    pub const INVALID_CHANNEL: Status = Status(0xDF);
    pub const CHANNEL_BUSY: Status = Status(0xE0);
    pub const NO_ACTIVE_PROGRAM: Status = Status(0xEC);
    pub const ILLEGAL_SIZE: Status = Status(0xED);
    pub const ILLEGAL_MAILBOX: Status = Status(0xEE);
    pub const INVALID_FIELD: Status = Status(0xEF);
    pub const BAD_IO: Status = Status(0xF0);
    pub const OUT_OF_MEMORY: Status = Status(0xFB);
    pub const BAD_ARGUMENTS: Status = Status(0xFF);

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Human-readable meaning, if the code is documented
    pub const fn description(self) -> Option<&'static str> {
        Some(match self.0 {
            0x00 => "success",
            0x20 => "pending communication transaction in progress",
            0x40 => "specified mailbox queue is empty",
            0xBD => "request failed (e.g. file not found)",
            0xBE => "unknown command opcode",
            0xBF => "insane packet",
            0xC0 => "data contains out-of-range values",
            0xDD => "communication bus error",
            0xDE => "no free memory in communication buffer",
            0xDF => "specified channel or connection is not valid",
            0xE0 => "specified channel or connection not configured or busy",
            0xEC => "no active program",
            0xED => "illegal size specified",
            0xEE => "illegal mailbox queue id specified",
            0xEF => "attempted to access invalid field of a structure",
            0xF0 => "bad input or output specified",
            0xFB => "insufficient memory available",
            0xFF => "bad arguments",
            _ => return None,
        })
    }
}

impl core::fmt::Debug for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Status({:#04x})", self.0)
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.description() {
            Some(text) => write!(f, "{} ({:#04x})", text, self.0),
            None => write!(f, "unknown status {:#04x}", self.0),
        }
    }
}

fn decode_status(r: &mut Reader<'_>) -> Result<Status, DecodeError> {
    Ok(Status(r.u8()?))
}

/// Answer to `GetOutputState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputState {
    pub status: Status,
    pub port: OutputPort,
    pub power_set: i8,
    pub mode: ModeByte,
    pub regulation_mode: Reported<RegulationMode>,
    pub turn_ratio: i8,
    pub run_state: Reported<RunState>,
    pub tacho_limit: u32,
    /// Count since the last motor command
    pub tacho_count: i32,
    /// Count relative to the last programmed movement
    pub block_tacho_count: i32,
    /// Count since the last reset of the rotation sensor
    pub rotation_count: i32,
}

impl OutputState {
    pub fn motor_on(&self) -> bool {
        self.mode.motor_on()
    }

    pub fn use_brake(&self) -> bool {
        self.mode.use_brake()
    }

    pub fn use_regulation(&self) -> bool {
        self.mode.use_regulation()
    }
}

impl Telegram for OutputState {
    const KIND: MessageKind = MessageKind::OutputState;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.u8(self.port.as_u8())?;
        w.i8(self.power_set)?;
        w.u8(self.mode.bits())?;
        w.u8(self.regulation_mode.as_u8())?;
        w.i8(self.turn_ratio)?;
        w.u8(self.run_state.as_u8())?;
        w.u32(self.tacho_limit)?;
        w.i32(self.tacho_count)?;
        w.i32(self.block_tacho_count)?;
        w.i32(self.rotation_count)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: decode_status(r)?,
            port: r.field("port")?,
            power_set: r.i8()?,
            mode: ModeByte::from_bits(r.u8()?),
            regulation_mode: r.reported()?,
            turn_ratio: r.i8()?,
            run_state: r.reported()?,
            tacho_limit: r.u32()?,
            tacho_count: r.i32()?,
            block_tacho_count: r.i32()?,
            rotation_count: r.i32()?,
        })
    }
}

impl Reply for OutputState {
    const REQUEST_CODE: u8 = 0x06;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `GetInputValues`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputValues {
    pub status: Status,
    pub port: InputPort,
    pub valid: bool,
    pub calibrated: bool,
    pub sensor_type: Reported<SensorType>,
    /// Reported mode byte: mode in the high bits, slope in the low bits
    pub mode: u8,
    pub raw_value: u16,
    pub normalized_value: u16,
    pub scaled_value: i16,
    pub calibrated_value: i16,
}

impl InputValues {
    pub fn sensor_mode(&self) -> SensorMode {
        SensorMode::from_reported(self.mode)
    }

    pub fn slope(&self) -> u8 {
        self.mode & SensorMode::SLOPE_MASK
    }
}

impl Telegram for InputValues {
    const KIND: MessageKind = MessageKind::InputValues;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.u8(self.port.wire())?;
        w.bool(self.valid)?;
        w.bool(self.calibrated)?;
        w.u8(self.sensor_type.as_u8())?;
        w.u8(self.mode)?;
        w.u16(self.raw_value)?;
        w.u16(self.normalized_value)?;
        w.i16(self.scaled_value)?;
        w.i16(self.calibrated_value)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let status = decode_status(r)?;
        let raw_port = r.u8()?;
        let port = InputPort::from_wire(raw_port).map_err(|_| DecodeError::InvalidField {
            field: "port",
            value: raw_port as i64,
        })?;
        Ok(Self {
            status,
            port,
            valid: r.bool()?,
            calibrated: r.bool()?,
            sensor_type: r.reported()?,
            mode: r.u8()?,
            raw_value: r.u16()?,
            normalized_value: r.u16()?,
            scaled_value: r.i16()?,
            calibrated_value: r.i16()?,
        })
    }
}

impl Reply for InputValues {
    const REQUEST_CODE: u8 = 0x07;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `GetBatteryLevel`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryResponse {
    pub status: Status,
    pub millivolts: u16,
}

impl BatteryResponse {
    /// Battery voltage in volts
    pub fn voltage(&self) -> f32 {
        self.millivolts as f32 / 1000.0
    }
}

impl Telegram for BatteryResponse {
    const KIND: MessageKind = MessageKind::BatteryResponse;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.u16(self.millivolts)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: decode_status(r)?,
            millivolts: r.u16()?,
        })
    }
}

impl Reply for BatteryResponse {
    const REQUEST_CODE: u8 = 0x0B;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `KeepAlive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepTimeout {
    pub status: Status,
    /// Current sleep time limit in milliseconds
    pub timeout_ms: u32,
}

impl Telegram for SleepTimeout {
    const KIND: MessageKind = MessageKind::SleepTimeout;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.u32(self.timeout_ms)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: decode_status(r)?,
            timeout_ms: r.u32()?,
        })
    }
}

impl Reply for SleepTimeout {
    const REQUEST_CODE: u8 = 0x0D;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `LsGetStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LsStatus {
    pub status: Status,
    pub bytes_ready: u8,
}

impl Telegram for LsStatus {
    const KIND: MessageKind = MessageKind::LsStatus;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.u8(self.bytes_ready)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: decode_status(r)?,
            bytes_ready: r.u8()?,
        })
    }
}

impl Reply for LsStatus {
    const REQUEST_CODE: u8 = 0x0E;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `LsRead`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsReadResponse {
    pub status: Status,
    pub data: Vec<u8, { LS_DATA_WIDTH - 1 }>,
}

impl Telegram for LsReadResponse {
    const KIND: MessageKind = MessageKind::LsReadResponse;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.pascal(&self.data, LS_DATA_WIDTH)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let status = decode_status(r)?;
        let raw = r.pascal("data", LS_DATA_WIDTH)?;
        let mut data = Vec::new();
        data.extend_from_slice(raw)
            .map_err(|_| DecodeError::InvalidField {
                field: "data",
                value: raw.len() as i64,
            })?;
        Ok(Self { status, data })
    }
}

impl Reply for LsReadResponse {
    const REQUEST_CODE: u8 = 0x10;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `GetCurrentProgramName`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentProgramName {
    pub status: Status,
    pub filename: String<{ PROGRAM_NAME_WIDTH - 1 }>,
}

impl Telegram for CurrentProgramName {
    const KIND: MessageKind = MessageKind::CurrentProgramName;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.status.0)?;
        w.fixed_asciiz(&self.filename, PROGRAM_NAME_WIDTH)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: decode_status(r)?,
            filename: decoded_text(r.fixed_asciiz("filename", PROGRAM_NAME_WIDTH)?, "filename")?,
        })
    }
}

impl Reply for CurrentProgramName {
    const REQUEST_CODE: u8 = 0x11;

    fn status(&self) -> Status {
        self.status
    }
}

/// Answer to `MessageRead`
///
/// The device pads the message field and counts the terminator in the
/// length byte; trailing NULs are stripped on decode and added back on
/// encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageReadResponse {
    pub status: Status,
    pub mailbox: Mailbox,
    pub message: String<{ MAILBOX_MESSAGE_WIDTH - 2 }>,
}

impl Telegram for MessageReadResponse {
    const KIND: MessageKind = MessageKind::MessageReadResponse;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        let mut data: Vec<u8, { MAILBOX_MESSAGE_WIDTH - 1 }> = Vec::new();
        data.extend_from_slice(self.message.as_bytes())
            .map_err(|_| ProtocolError::PayloadTooLarge)?;
        data.push(0).map_err(|_| ProtocolError::PayloadTooLarge)?;
        w.u8(self.status.0)?;
        w.u8(self.mailbox.wire())?;
        w.pascal(&data, MAILBOX_MESSAGE_WIDTH)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let status = decode_status(r)?;
        let raw_box = r.u8()?;
        let mailbox = Mailbox::from_wire(raw_box).map_err(|_| DecodeError::InvalidField {
            field: "mailbox",
            value: raw_box as i64,
        })?;
        let raw = r.pascal("message", MAILBOX_MESSAGE_WIDTH)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let text = &raw[..end];
        if !text.is_ascii() {
            return Err(DecodeError::InvalidText { field: "message" });
        }
        let text =
            core::str::from_utf8(text).map_err(|_| DecodeError::InvalidText { field: "message" })?;
        Ok(Self {
            status,
            mailbox,
            message: decoded_text(text, "message")?,
        })
    }
}

impl Reply for MessageReadResponse {
    const REQUEST_CODE: u8 = 0x13;

    fn status(&self) -> Status {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Body, Message};
    use proptest::prelude::*;

    fn parse(bytes: &[u8]) -> Message {
        Message::from_payload(bytes).unwrap()
    }

    #[test]
    fn test_battery_response() {
        let msg = parse(&[0x02, 0x0B, 0x00, 0x50, 0x00]);
        assert_eq!(msg.kind(), MessageKind::BatteryResponse);
        let Some(Body::BatteryResponse(reply)) = msg.body() else {
            panic!("expected battery response, got {:?}", msg.body());
        };
        assert_eq!(reply.millivolts, 80);
        assert!((reply.voltage() - 0.08).abs() < 1e-6);
        assert!(reply.status().is_success());
    }

    #[test]
    fn test_output_state_flags() {
        let reply = OutputState {
            status: Status::SUCCESS,
            port: OutputPort::B,
            power_set: 75,
            mode: ModeByte::from_bits(0x03),
            regulation_mode: RegulationMode::Idle.into(),
            turn_ratio: 0,
            run_state: RunState::Running.into(),
            tacho_limit: 0,
            tacho_count: -720,
            block_tacho_count: 10,
            rotation_count: 1080,
        };
        assert!(reply.motor_on());
        assert!(reply.use_brake());
        assert!(!reply.use_regulation());

        let payload = reply.render().unwrap();
        assert_eq!(payload.len(), 25);
        assert_eq!(&payload[..4], &[0x02, 0x06, 0x00, 0x01]);
        let msg = parse(&payload);
        assert_eq!(msg.body(), Some(&Body::OutputState(reply)));
    }

    #[test]
    fn test_input_values_layout() {
        let bytes = [
            0x02, 0x07, 0x00, // header, status
            0x02, 0x01, 0x00, // port 3, valid, not calibrated
            0x01, 0x25, // switch, boolean mode with slope 5
            0xFF, 0x03, 0x00, 0x00, 0x01, 0x00, 0xFF, 0xFF,
        ];
        let msg = parse(&bytes);
        let Some(Body::InputValues(reply)) = msg.body() else {
            panic!("expected input values, got {:?}", msg.error());
        };
        assert_eq!(reply.port.label(), 3);
        assert!(reply.valid);
        assert_eq!(reply.sensor_type.known(), Some(SensorType::Switch));
        assert_eq!(reply.sensor_mode(), SensorMode::Boolean);
        assert_eq!(reply.slope(), 5);
        assert_eq!(reply.raw_value, 1023);
        assert_eq!(reply.scaled_value, 1);
        assert_eq!(reply.calibrated_value, -1);
    }

    #[test]
    fn test_input_values_colour_sensor() {
        let bytes = [
            0x02, 0x07, 0x00, // header, status
            0x00, 0x01, 0x00, // port 1, valid, not calibrated
            0x0D, 0x20, // colour sensor, boolean mode
            0x00, 0x02, 0x00, 0x02, 0x06, 0x00, 0x06, 0x00,
        ];
        let msg = parse(&bytes);
        assert_eq!(msg.error(), None);
        let Some(Body::InputValues(reply)) = msg.body() else {
            panic!("expected input values, got {:?}", msg.error());
        };
        assert_eq!(reply.sensor_type, Reported::Unknown(0x0D));
        assert_eq!(reply.sensor_type.known(), None);
        assert_eq!(reply.scaled_value, 6);
        assert_eq!(reply.render().unwrap().as_slice(), &bytes[..]);
    }

    #[test]
    fn test_output_state_unknown_run_state() {
        let mut bytes = std::vec![
            0x02, 0x06, 0x00, // header, status
            0x00, 0x32, 0x01, // port A, power 50, motor on
            0x07, 0x00, 0x30, // regulation and run state outside the known sets
        ];
        bytes.resize(25, 0);
        let msg = parse(&bytes);
        let Some(Body::OutputState(reply)) = msg.body() else {
            panic!("expected output state, got {:?}", msg.error());
        };
        assert_eq!(reply.regulation_mode, Reported::Unknown(0x07));
        assert_eq!(reply.run_state, Reported::Unknown(0x30));
        assert_eq!(reply.power_set, 50);
        assert!(reply.motor_on());
    }

    #[test]
    fn test_current_program_name() {
        let mut bytes = std::vec![0x02, 0x11, 0xEC];
        bytes.extend_from_slice(b"drive.rxe");
        bytes.resize(3 + PROGRAM_NAME_WIDTH, 0);
        let msg = parse(&bytes);
        let Some(Body::CurrentProgramName(reply)) = msg.body() else {
            panic!("expected program name, got {:?}", msg.error());
        };
        assert_eq!(reply.filename.as_str(), "drive.rxe");
        assert_eq!(reply.status, Status::NO_ACTIVE_PROGRAM);
        assert!(!reply.status().is_success());
    }

    #[test]
    fn test_message_read_strips_terminator() {
        let mut bytes = std::vec![0x02, 0x13, 0x00, 0x01, 0x03, b'h', b'i', 0x00];
        bytes.resize(4 + MAILBOX_MESSAGE_WIDTH, 0);
        let msg = parse(&bytes);
        let Some(Body::MessageReadResponse(reply)) = msg.body() else {
            panic!("expected mailbox message, got {:?}", msg.error());
        };
        assert_eq!(reply.mailbox.label(), 2);
        assert_eq!(reply.message.as_str(), "hi");
        assert_eq!(reply.render().unwrap()[..], bytes[..]);
    }

    #[test]
    fn test_ls_read_response() {
        let mut bytes = std::vec![0x02, 0x10, 0x00, 0x02, 0x4C, 0x45];
        bytes.resize(3 + LS_DATA_WIDTH, 0);
        let msg = parse(&bytes);
        let Some(Body::LsReadResponse(reply)) = msg.body() else {
            panic!("expected ls data, got {:?}", msg.error());
        };
        assert_eq!(&reply.data[..], b"LE");
    }

    #[test]
    fn test_short_reply_is_malformed() {
        let msg = parse(&[0x02, 0x0B, 0x00, 0x50]);
        assert_eq!(msg.kind(), MessageKind::BatteryResponse);
        assert!(msg.body().is_none());
        assert_eq!(
            msg.error(),
            Some(DecodeError::MalformedPayload {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(msg.payload(), &[0x02, 0x0B, 0x00, 0x50]);
    }

    #[test]
    fn test_status_descriptions() {
        assert_eq!(Status(0x40).description(), Some("specified mailbox queue is empty"));
        assert_eq!(Status(0x12).description(), None);
        assert_eq!(format!("{:?}", Status(0xEC)), "Status(0xec)");
    }

    proptest! {
        #[test]
        fn prop_sleep_timeout_roundtrip(status in any::<u8>(), timeout_ms in any::<u32>()) {
            let reply = SleepTimeout { status: Status(status), timeout_ms };
            let msg = parse(&reply.render().unwrap());
            prop_assert_eq!(msg.body(), Some(&Body::SleepTimeout(reply)));
        }

        #[test]
        fn prop_message_read_response_roundtrip(label in 1u8..=10, text in "[ -~]{0,58}") {
            let reply = MessageReadResponse {
                status: Status::SUCCESS,
                mailbox: Mailbox::new(label).unwrap(),
                message: crate::layout::bounded_text(&text, "message").unwrap(),
            };
            let msg = parse(&reply.render().unwrap());
            prop_assert_eq!(msg.body(), Some(&Body::MessageReadResponse(reply.clone())));
        }
    }
}
