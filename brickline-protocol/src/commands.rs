//! Command catalog
//!
//! One struct per command the brick understands. Constructors validate;
//! [`Command::render`] validates again so a command edited in place can
//! never reach the wire in an illegal state.

use heapless::{String, Vec};

use crate::command::{Command, Telegram};
use crate::error::{DecodeError, ProtocolError};
use crate::fields::{
    CommandType, InputPort, Mailbox, ModeByte, OutputPort, RegulationMode, RunState, SensorMode,
    SensorType,
};
use crate::layout::{bounded_text, decoded_text, validate_text, Reader, Writer};
use crate::registry::{ExpectedReply, MessageKind};

/// Longest program or sound filename: 15 name characters, a dot, 3 extension characters
pub const MAX_FILENAME_LEN: usize = 19;

/// Longest mailbox message text (the brick's queue slot holds 59 bytes with the NUL)
pub const MAX_MESSAGE_LEN: usize = 58;

/// Longest low-speed (I2C) transfer in either direction
pub const MAX_LS_DATA_LEN: usize = 16;

/// Lowest playable tone in Hz
pub const MIN_TONE_HZ: u16 = 200;

/// Highest playable tone in Hz
pub const MAX_TONE_HZ: u16 = 3000;

/// Filename on the brick's flash
pub type Filename = String<MAX_FILENAME_LEN>;

/// Mailbox message text
pub type MessageText = String<MAX_MESSAGE_LEN>;

/// Low-speed transfer bytes
pub type LsData = Vec<u8, MAX_LS_DATA_LEN>;

fn is_word(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Check a `name.ext` filename: 1-15 word characters, optionally a dot and
/// up to 3 more
pub fn validate_filename(filename: &str) -> Result<(), ProtocolError> {
    let invalid = |reason| ProtocolError::invalid("filename", filename.len() as i64, reason);

    let (name, ext) = match filename.split_once('.') {
        Some((name, ext)) => (name, ext),
        None => (filename, ""),
    };
    if name.is_empty() || name.len() > 15 {
        return Err(invalid("name must be 1 to 15 characters"));
    }
    if ext.len() > 3 {
        return Err(invalid("extension must be at most 3 characters"));
    }
    if !name.bytes().chain(ext.bytes()).all(is_word) {
        return Err(invalid("only letters, digits and underscores are allowed"));
    }
    Ok(())
}

fn filename(text: &str) -> Result<Filename, ProtocolError> {
    validate_filename(text)?;
    bounded_text(text, "filename")
}

fn decode_input_port(r: &mut Reader<'_>) -> Result<InputPort, DecodeError> {
    let raw = r.u8()?;
    InputPort::from_wire(raw).map_err(|_| DecodeError::InvalidField {
        field: "port",
        value: raw as i64,
    })
}

fn decode_mailbox(r: &mut Reader<'_>, field: &'static str) -> Result<Mailbox, DecodeError> {
    let raw = r.u8()?;
    Mailbox::from_wire(raw).map_err(|_| DecodeError::InvalidField {
        field,
        value: raw as i64,
    })
}

/// Declare a command with no telegram
macro_rules! bare_command {
    ($(#[$meta:meta])* $name:ident, $kind:ident, $code:expr, $ty:expr, $reply:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name;

        impl Telegram for $name {
            const KIND: MessageKind = MessageKind::$kind;

            fn encode(&self, _w: &mut Writer) -> Result<(), ProtocolError> {
                Ok(())
            }

            fn decode(_r: &mut Reader<'_>) -> Result<Self, DecodeError> {
                Ok($name)
            }
        }

        impl Command for $name {
            const CODE: u8 = $code;
            const COMMAND_TYPE: CommandType = $ty;
            const EXPECTED_REPLY: ExpectedReply = $reply;
        }
    };
}

/// Start a program stored on the brick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartProgram {
    pub filename: Filename,
}

impl StartProgram {
    pub fn new(filename: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            filename: self::filename(filename)?,
        })
    }
}

impl Telegram for StartProgram {
    const KIND: MessageKind = MessageKind::StartProgram;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.asciiz(&self.filename)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            filename: decoded_text(r.asciiz("filename")?, "filename")?,
        })
    }
}

impl Command for StartProgram {
    const CODE: u8 = 0x00;

    fn validate(&self) -> Result<(), ProtocolError> {
        validate_filename(&self.filename)
    }
}

/// Play a sound file stored on the brick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaySoundFile {
    pub looped: bool,
    pub filename: Filename,
}

impl PlaySoundFile {
    pub fn new(filename: &str, looped: bool) -> Result<Self, ProtocolError> {
        Ok(Self {
            looped,
            filename: self::filename(filename)?,
        })
    }
}

impl Telegram for PlaySoundFile {
    const KIND: MessageKind = MessageKind::PlaySoundFile;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.bool(self.looped)?;
        w.asciiz(&self.filename)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            looped: r.bool()?,
            filename: decoded_text(r.asciiz("filename")?, "filename")?,
        })
    }
}

impl Command for PlaySoundFile {
    const CODE: u8 = 0x02;

    fn validate(&self) -> Result<(), ProtocolError> {
        validate_filename(&self.filename)
    }
}

/// Play a tone on the brick's speaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlayTone {
    /// Frequency in Hz (200-3000)
    pub frequency: u16,
    /// Duration in milliseconds
    pub duration_ms: u16,
}

impl PlayTone {
    /// Duration used when none is given
    pub const DEFAULT_DURATION_MS: u16 = 100;

    pub fn new(frequency: u16, duration_ms: u16) -> Result<Self, ProtocolError> {
        let tone = Self {
            frequency,
            duration_ms,
        };
        tone.validate()?;
        Ok(tone)
    }
}

impl Telegram for PlayTone {
    const KIND: MessageKind = MessageKind::PlayTone;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u16(self.frequency)?;
        w.u16(self.duration_ms)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            frequency: r.u16()?,
            duration_ms: r.u16()?,
        })
    }
}

impl Command for PlayTone {
    const CODE: u8 = 0x03;

    fn validate(&self) -> Result<(), ProtocolError> {
        if !(MIN_TONE_HZ..=MAX_TONE_HZ).contains(&self.frequency) {
            return Err(ProtocolError::invalid(
                "frequency",
                self.frequency as i64,
                "must be between 200 and 3000 Hz",
            ));
        }
        Ok(())
    }
}

/// Drive a motor output
///
/// The three mode flags are kept separately and packed into the mode byte
/// only when the command is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetOutputState {
    pub port: OutputPort,
    /// Power set point, -100 to 100
    pub set_power: i8,
    pub motor_on: bool,
    pub use_brake: bool,
    pub use_regulation: bool,
    pub regulation_mode: RegulationMode,
    /// Steering ratio for synchronised motors, -100 to 100
    pub turn_ratio: i8,
    pub run_state: RunState,
    /// Rotation limit in degrees; 0 runs forever
    pub tacho_limit: u32,
}

impl SetOutputState {
    /// All flags off, idle: stops (coasts) the motor
    pub fn idle(port: OutputPort) -> Self {
        Self {
            port,
            set_power: 0,
            motor_on: false,
            use_brake: false,
            use_regulation: false,
            regulation_mode: RegulationMode::Idle,
            turn_ratio: 0,
            run_state: RunState::Idle,
            tacho_limit: 0,
        }
    }

    /// Motor on at `power`, running unregulated
    pub fn running(port: OutputPort, power: i8) -> Result<Self, ProtocolError> {
        Self {
            set_power: power,
            motor_on: true,
            run_state: RunState::Running,
            ..Self::idle(port)
        }
        .validated()
    }

    /// Validate a struct built with field-update syntax
    pub fn validated(self) -> Result<Self, ProtocolError> {
        self.validate()?;
        Ok(self)
    }

    /// Mode byte assembled from the flags that are set
    pub fn mode_byte(&self) -> ModeByte {
        ModeByte::from_flags(self.motor_on, self.use_brake, self.use_regulation)
    }
}

impl Telegram for SetOutputState {
    const KIND: MessageKind = MessageKind::SetOutputState;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.port.as_u8())?;
        w.i8(self.set_power)?;
        w.u8(self.mode_byte().bits())?;
        w.u8(self.regulation_mode.as_u8())?;
        w.i8(self.turn_ratio)?;
        w.u8(self.run_state.as_u8())?;
        w.u32(self.tacho_limit)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let port = r.field("port")?;
        let set_power = r.i8()?;
        let mode = ModeByte::from_bits(r.u8()?);
        Ok(Self {
            port,
            set_power,
            motor_on: mode.motor_on(),
            use_brake: mode.use_brake(),
            use_regulation: mode.use_regulation(),
            regulation_mode: r.field("regulation_mode")?,
            turn_ratio: r.i8()?,
            run_state: r.field("run_state")?,
            tacho_limit: r.u32()?,
        })
    }
}

impl Command for SetOutputState {
    const CODE: u8 = 0x04;

    fn validate(&self) -> Result<(), ProtocolError> {
        if !(-100..=100).contains(&self.set_power) {
            return Err(ProtocolError::invalid(
                "set_power",
                self.set_power as i64,
                "must be between -100 and 100",
            ));
        }
        if !(-100..=100).contains(&self.turn_ratio) {
            return Err(ProtocolError::invalid(
                "turn_ratio",
                self.turn_ratio as i64,
                "must be between -100 and 100",
            ));
        }
        if self.turn_ratio != 0 && self.regulation_mode != RegulationMode::MotorSync {
            return Err(ProtocolError::invalid(
                "turn_ratio",
                self.turn_ratio as i64,
                "only valid when regulation mode is motor_sync",
            ));
        }
        if self.turn_ratio != 0 && self.port == OutputPort::All {
            return Err(ProtocolError::invalid(
                "turn_ratio",
                self.turn_ratio as i64,
                "not valid for the 'all' output port",
            ));
        }
        Ok(())
    }
}

/// Configure the sensor attached to an input port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetInputMode {
    pub port: InputPort,
    pub sensor_type: SensorType,
    pub sensor_mode: SensorMode,
}

impl SetInputMode {
    pub fn new(port: InputPort, sensor_type: SensorType, sensor_mode: SensorMode) -> Self {
        Self {
            port,
            sensor_type,
            sensor_mode,
        }
    }
}

impl Telegram for SetInputMode {
    const KIND: MessageKind = MessageKind::SetInputMode;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.port.wire())?;
        w.u8(self.sensor_type.as_u8())?;
        w.u8(self.sensor_mode.as_u8())
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            port: decode_input_port(r)?,
            sensor_type: r.field("sensor_type")?,
            sensor_mode: r.field("sensor_mode")?,
        })
    }
}

impl Command for SetInputMode {
    const CODE: u8 = 0x05;
}

/// Query a motor output's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetOutputState {
    pub port: OutputPort,
}

impl GetOutputState {
    pub fn new(port: OutputPort) -> Self {
        Self { port }
    }
}

impl Telegram for GetOutputState {
    const KIND: MessageKind = MessageKind::GetOutputState;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.port.as_u8())
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            port: r.field("port")?,
        })
    }
}

impl Command for GetOutputState {
    const CODE: u8 = 0x06;
    const EXPECTED_REPLY: ExpectedReply = ExpectedReply::Typed(MessageKind::OutputState);
}

/// Declare a command whose telegram is a single input port
macro_rules! input_port_command {
    ($(#[$meta:meta])* $name:ident, $code:expr, $reply:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name {
            pub port: InputPort,
        }

        impl $name {
            pub fn new(port: InputPort) -> Self {
                Self { port }
            }
        }

        impl Telegram for $name {
            const KIND: MessageKind = MessageKind::$name;

            fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
                w.u8(self.port.wire())
            }

            fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
                Ok(Self {
                    port: decode_input_port(r)?,
                })
            }
        }

        impl Command for $name {
            const CODE: u8 = $code;
            const EXPECTED_REPLY: ExpectedReply = $reply;
        }
    };
}

input_port_command! {
    /// Read a sensor
    GetInputValues, 0x07, ExpectedReply::Typed(MessageKind::InputValues)
}

input_port_command! {
    /// Zero a sensor's scaled value
    ResetInputScaledValue, 0x08, ExpectedReply::None
}

/// Post a text message into one of the brick's mailboxes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageWrite {
    pub mailbox: Mailbox,
    pub message: MessageText,
}

impl MessageWrite {
    pub fn new(mailbox: Mailbox, message: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            mailbox,
            message: bounded_text(message, "message")?,
        })
    }

    /// Size byte: message length including the terminator
    pub fn message_size(&self) -> u8 {
        self.message.len() as u8 + 1
    }
}

impl Telegram for MessageWrite {
    const KIND: MessageKind = MessageKind::MessageWrite;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.mailbox.wire())?;
        w.u8(self.message_size())?;
        w.asciiz(&self.message)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mailbox = decode_mailbox(r, "mailbox")?;
        let size = r.u8()? as usize;
        if size == 0 {
            return Err(DecodeError::InvalidField {
                field: "message_size",
                value: 0,
            });
        }
        let raw = r.take(size)?;
        let text = match raw.split_last() {
            Some((&0, text)) if text.is_ascii() => {
                core::str::from_utf8(text).map_err(|_| DecodeError::InvalidText { field: "message" })?
            }
            _ => return Err(DecodeError::InvalidText { field: "message" }),
        };
        Ok(Self {
            mailbox,
            message: decoded_text(text, "message")?,
        })
    }
}

impl Command for MessageWrite {
    const CODE: u8 = 0x09;

    fn validate(&self) -> Result<(), ProtocolError> {
        validate_text(&self.message, "message")
    }
}

/// Reset a motor's position counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetMotorPosition {
    pub port: OutputPort,
    /// Reset relative to the last movement rather than the absolute count
    pub relative: bool,
}

impl ResetMotorPosition {
    pub fn new(port: OutputPort, relative: bool) -> Self {
        Self { port, relative }
    }
}

impl Telegram for ResetMotorPosition {
    const KIND: MessageKind = MessageKind::ResetMotorPosition;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.port.as_u8())?;
        w.bool(self.relative)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            port: r.field("port")?,
            relative: r.bool()?,
        })
    }
}

impl Command for ResetMotorPosition {
    const CODE: u8 = 0x0A;
}

bare_command! {
    /// Query the battery voltage
    GetBatteryLevel, GetBatteryLevel, 0x0B, CommandType::Direct,
    ExpectedReply::Typed(MessageKind::BatteryResponse)
}

bare_command! {
    /// Stop whatever sound is playing
    StopSoundPlayback, StopSoundPlayback, 0x0C, CommandType::Direct, ExpectedReply::None
}

bare_command! {
    /// Reset the brick's sleep timer
    KeepAlive, KeepAlive, 0x0D, CommandType::Direct,
    ExpectedReply::Typed(MessageKind::SleepTimeout)
}

input_port_command! {
    /// Ask how many bytes a low-speed sensor has ready
    LsGetStatus, 0x0E, ExpectedReply::Typed(MessageKind::LsStatus)
}

/// Write to a low-speed (I2C) sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsWrite {
    pub port: InputPort,
    /// Number of bytes expected back
    pub response_len: u8,
    pub data: LsData,
}

impl LsWrite {
    pub fn new(port: InputPort, data: &[u8], response_len: u8) -> Result<Self, ProtocolError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(data).map_err(|_| {
            ProtocolError::invalid("data", data.len() as i64, "at most 16 bytes per transfer")
        })?;
        let cmd = Self {
            port,
            response_len,
            data: buf,
        };
        cmd.validate()?;
        Ok(cmd)
    }
}

impl Telegram for LsWrite {
    const KIND: MessageKind = MessageKind::LsWrite;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.port.wire())?;
        w.u8(self.data.len() as u8)?;
        w.u8(self.response_len)?;
        w.bytes(&self.data)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let port = decode_input_port(r)?;
        let tx_len = r.u8()? as usize;
        let response_len = r.u8()?;
        let raw = r.take(tx_len)?;
        let mut data = Vec::new();
        data.extend_from_slice(raw)
            .map_err(|_| DecodeError::InvalidField {
                field: "data",
                value: tx_len as i64,
            })?;
        Ok(Self {
            port,
            response_len,
            data,
        })
    }
}

impl Command for LsWrite {
    const CODE: u8 = 0x0F;

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.response_len as usize > MAX_LS_DATA_LEN {
            return Err(ProtocolError::invalid(
                "response_len",
                self.response_len as i64,
                "at most 16 bytes per transfer",
            ));
        }
        Ok(())
    }
}

input_port_command! {
    /// Read data a low-speed sensor has ready
    LsRead, 0x10, ExpectedReply::Typed(MessageKind::LsReadResponse)
}

bare_command! {
    /// Ask which program is running
    GetCurrentProgramName, GetCurrentProgramName, 0x11, CommandType::Direct,
    ExpectedReply::Typed(MessageKind::CurrentProgramName)
}

/// Read a message from one of the brick's mailboxes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageRead {
    pub mailbox: Mailbox,
    /// Remove the message from the queue once read
    pub remove: bool,
}

impl MessageRead {
    pub fn new(mailbox: Mailbox, remove: bool) -> Self {
        Self { mailbox, remove }
    }
}

impl Telegram for MessageRead {
    const KIND: MessageKind = MessageKind::MessageRead;

    fn encode(&self, w: &mut Writer) -> Result<(), ProtocolError> {
        w.u8(self.mailbox.remote())?;
        w.u8(self.mailbox.wire())?;
        w.bool(self.remove)
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let remote = r.u8()?;
        let mailbox = decode_mailbox(r, "local_box")?;
        if remote != mailbox.remote() {
            return Err(DecodeError::InvalidField {
                field: "remote_box",
                value: remote as i64,
            });
        }
        Ok(Self {
            mailbox,
            remove: r.bool()?,
        })
    }
}

impl Command for MessageRead {
    const CODE: u8 = 0x13;
    const EXPECTED_REPLY: ExpectedReply = ExpectedReply::Typed(MessageKind::MessageReadResponse);
}

bare_command! {
    /// Query firmware and protocol versions
    GetVersion, GetVersion, 0x88, CommandType::System, ExpectedReply::Generic
}

bare_command! {
    /// Query device name, Bluetooth address and free flash
    GetInfo, GetInfo, 0x9B, CommandType::System, ExpectedReply::Generic
}
