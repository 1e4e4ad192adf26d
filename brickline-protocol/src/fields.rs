//! Field enumerations
//!
//! Every enumerated field on the wire is a closed set of byte values. Each
//! domain is a Rust enum; converting a raw byte checks membership and fails
//! with [`ProtocolError::InvalidField`] for anything outside the set.
//! Fields the device reports back are wrapped in [`Reported`] instead, so
//! firmware with a larger set still decodes.

use crate::error::ProtocolError;

/// Declare a byte-valued wire enumeration
///
/// Generates the enum plus `VALUES`, `as_u8`, `from_u8` and the
/// `u8` conversions in both directions.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Every member of the domain, in declaration order
            pub const VALUES: &'static [$name] = &[$($name::$variant),+];

            /// Wire value
            pub const fn as_u8(self) -> u8 {
                self as u8
            }

            /// Look up a member by wire value
            pub const fn from_u8(value: u8) -> Option<Self> {
                $(
                    if value == $value {
                        return Some($name::$variant);
                    }
                )+
                None
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                Self::from_u8(value).ok_or(ProtocolError::invalid(
                    stringify!($name),
                    value as i64,
                    "not a member of the domain",
                ))
            }
        }
    };
}

wire_enum! {
    /// Low seven bits of the header type byte
    CommandType {
        Direct = 0x00,
        System = 0x01,
        Reply = 0x02,
    }
}

/// Header bit asking the device not to reply
pub const SUPPRESS_REPLY: u8 = 0x80;

wire_enum! {
    /// Motor output port
    OutputPort {
        A = 0x00,
        B = 0x01,
        C = 0x02,
        /// Broadcast to every output port
        All = 0xFF,
    }
}

wire_enum! {
    /// Bits of the output mode byte
    OutputMode {
        MotorOn = 0x01,
        Brake = 0x02,
        Regulated = 0x04,
    }
}

wire_enum! {
    /// Motor regulation mode
    RegulationMode {
        Idle = 0x00,
        MotorSpeed = 0x01,
        MotorSync = 0x02,
    }
}

wire_enum! {
    /// Motor run state
    RunState {
        Idle = 0x00,
        RampUp = 0x10,
        Running = 0x20,
        RampDown = 0x40,
    }
}

wire_enum! {
    /// Sensor type attached to an input port
    SensorType {
        NoSensor = 0x00,
        Switch = 0x01,
        Temperature = 0x02,
        Reflection = 0x03,
        Angle = 0x04,
        LightActive = 0x05,
        LightInactive = 0x06,
        SoundDb = 0x07,
        SoundDba = 0x08,
        Custom = 0x09,
        LowSpeed = 0x0A,
        LowSpeed9v = 0x0B,
        NoOfSensorTypes = 0x0C,
    }
}

wire_enum! {
    /// Sensor value translation mode
    SensorMode {
        Raw = 0x00,
        Boolean = 0x20,
        TransitionCount = 0x40,
        PeriodCounter = 0x60,
        PctFullScale = 0x80,
        Celsius = 0xA0,
        Fahrenheit = 0xC0,
        AngleSteps = 0xE0,
    }
}

impl SensorMode {
    /// Low bits of a reported mode byte carry the slope
    pub const SLOPE_MASK: u8 = 0x1F;
    /// High bits of a reported mode byte carry the mode
    pub const MODE_MASK: u8 = 0xE0;

    /// Extract the mode from a reported mode byte, ignoring the slope bits
    pub const fn from_reported(byte: u8) -> Self {
        match Self::from_u8(byte & Self::MODE_MASK) {
            Some(mode) => mode,
            // Every value of the top three bits is a member
            None => SensorMode::Raw,
        }
    }
}

/// Bit-packed output mode byte
///
/// Assembled from independent flags; only flags that are set contribute
/// their bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeByte(u8);

impl ModeByte {
    /// Pack the three motor flags
    pub fn from_flags(motor_on: bool, use_brake: bool, use_regulation: bool) -> Self {
        let bits = [
            (motor_on, OutputMode::MotorOn),
            (use_brake, OutputMode::Brake),
            (use_regulation, OutputMode::Regulated),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(0u8, |acc, (_, flag)| acc | flag.as_u8());
        ModeByte(bits)
    }

    /// Wrap a raw byte as reported by the device
    pub const fn from_bits(bits: u8) -> Self {
        ModeByte(bits)
    }

    /// Raw byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether `flag` is set
    pub const fn contains(self, flag: OutputMode) -> bool {
        self.0 & flag.as_u8() != 0
    }

    pub const fn motor_on(self) -> bool {
        self.contains(OutputMode::MotorOn)
    }

    pub const fn use_brake(self) -> bool {
        self.contains(OutputMode::Brake)
    }

    pub const fn use_regulation(self) -> bool {
        self.contains(OutputMode::Regulated)
    }
}

/// Enumerated byte as reported by the device
///
/// Newer firmware reports values the host does not know about, such as the
/// colour sensor types. Those decode as `Unknown` and re-encode unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reported<T> {
    Known(T),
    Unknown(u8),
}

impl<T: Copy + Into<u8> + TryFrom<u8>> Reported<T> {
    pub fn from_u8(value: u8) -> Self {
        match T::try_from(value) {
            Ok(known) => Reported::Known(known),
            Err(_) => Reported::Unknown(value),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Reported::Known(known) => known.into(),
            Reported::Unknown(value) => value,
        }
    }

    /// The member, if the byte belongs to the domain
    pub fn known(self) -> Option<T> {
        match self {
            Reported::Known(known) => Some(known),
            Reported::Unknown(_) => None,
        }
    }
}

impl<T> From<T> for Reported<T> {
    fn from(value: T) -> Self {
        Reported::Known(value)
    }
}

/// Sensor input port
///
/// Ports are labelled 1 to 4 on the brick but numbered 0 to 3 on the wire.
/// Construction takes the label; the wire value is derived.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputPort(u8);

impl InputPort {
    /// Number of input ports on the brick
    pub const COUNT: u8 = 4;

    /// Port from its 1-based label
    pub const fn new(label: u8) -> Result<Self, ProtocolError> {
        match label.checked_sub(1) {
            Some(wire) => Self::from_wire(wire),
            None => Err(ProtocolError::invalid(
                "InputPort",
                label as i64,
                "input ports are numbered 1 to 4",
            )),
        }
    }

    /// Port from its 0-based wire value
    pub const fn from_wire(wire: u8) -> Result<Self, ProtocolError> {
        if wire < Self::COUNT {
            Ok(InputPort(wire))
        } else {
            Err(ProtocolError::invalid(
                "InputPort",
                wire as i64 + 1,
                "input ports are numbered 1 to 4",
            ))
        }
    }

    /// 0-based wire value
    pub const fn wire(self) -> u8 {
        self.0
    }

    /// 1-based label
    pub const fn label(self) -> u8 {
        self.0 + 1
    }
}

impl TryFrom<u8> for InputPort {
    type Error = ProtocolError;

    /// Takes the 1-based label
    fn try_from(label: u8) -> Result<Self, Self::Error> {
        InputPort::new(label)
    }
}

impl core::fmt::Debug for InputPort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "InputPort({})", self.label())
    }
}

/// Mailbox (message queue) on the brick
///
/// Labelled 1 to 10, numbered 0 to 9 on the wire. Reads address the
/// matching remote queue at `wire + 10`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mailbox(u8);

impl Mailbox {
    /// Number of local mailboxes
    pub const COUNT: u8 = 10;

    /// Mailbox from its 1-based label
    pub const fn new(label: u8) -> Result<Self, ProtocolError> {
        match label.checked_sub(1) {
            Some(wire) => Self::from_wire(wire),
            None => Err(ProtocolError::invalid(
                "Mailbox",
                label as i64,
                "mailboxes are numbered 1 to 10",
            )),
        }
    }

    /// Mailbox from its 0-based wire value
    pub const fn from_wire(wire: u8) -> Result<Self, ProtocolError> {
        if wire < Self::COUNT {
            Ok(Mailbox(wire))
        } else {
            Err(ProtocolError::invalid(
                "Mailbox",
                wire as i64 + 1,
                "mailboxes are numbered 1 to 10",
            ))
        }
    }

    /// 0-based wire value
    pub const fn wire(self) -> u8 {
        self.0
    }

    /// 1-based label
    pub const fn label(self) -> u8 {
        self.0 + 1
    }

    /// Remote queue paired with this mailbox
    pub const fn remote(self) -> u8 {
        self.0 + Self::COUNT
    }
}

impl core::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Mailbox({})", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_output_port_values() {
        assert_eq!(OutputPort::A.as_u8(), 0);
        assert_eq!(OutputPort::All.as_u8(), 0xFF);
        assert_eq!(OutputPort::VALUES.len(), 4);
        assert_eq!(OutputPort::try_from(2), Ok(OutputPort::C));
    }

    #[test]
    fn test_output_port_rejects_non_member() {
        let err = OutputPort::try_from(3).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidField {
                field: "OutputPort",
                value: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_run_state_sparse_domain() {
        assert_eq!(RunState::from_u8(0x20), Some(RunState::Running));
        assert_eq!(RunState::from_u8(0x01), None);
    }

    #[test]
    fn test_reported_keeps_unknown_byte() {
        let colour = Reported::<SensorType>::from_u8(0x0D);
        assert_eq!(colour, Reported::Unknown(0x0D));
        assert_eq!(colour.known(), None);
        assert_eq!(colour.as_u8(), 0x0D);

        let switch = Reported::<SensorType>::from_u8(0x01);
        assert_eq!(switch, Reported::Known(SensorType::Switch));
        assert_eq!(switch.as_u8(), 0x01);
        assert_eq!(Reported::from(RunState::Running).as_u8(), 0x20);
    }

    #[test]
    fn test_mode_byte_or_of_true_flags() {
        let mode = ModeByte::from_flags(true, false, true);
        assert_eq!(mode.bits(), 5);
        assert_eq!(
            mode.bits(),
            OutputMode::MotorOn.as_u8() | OutputMode::Regulated.as_u8()
        );
        assert!(mode.motor_on());
        assert!(!mode.use_brake());
        assert!(mode.use_regulation());
    }

    #[test]
    fn test_mode_byte_no_flags() {
        assert_eq!(ModeByte::from_flags(false, false, false).bits(), 0);
        assert_eq!(ModeByte::from_flags(true, true, true).bits(), 7);
    }

    #[test]
    fn test_input_port_label_translation() {
        let port1 = InputPort::new(1).unwrap();
        assert_eq!(port1.wire(), 0);
        assert_eq!(port1.label(), 1);
        assert_eq!(InputPort::new(4).unwrap().wire(), 3);
    }

    #[test]
    fn test_input_port_out_of_range() {
        assert!(matches!(
            InputPort::new(5),
            Err(ProtocolError::InvalidField {
                field: "InputPort",
                ..
            })
        ));
        assert!(InputPort::new(0).is_err());
        assert!(InputPort::from_wire(4).is_err());
    }

    #[test]
    fn test_input_port_rewrap_is_idempotent() {
        let port = InputPort::new(3).unwrap();
        let rewrapped = InputPort::from(port);
        assert_eq!(rewrapped, port);
        assert_eq!(InputPort::from_wire(port.wire()).unwrap(), port);
    }

    #[test]
    fn test_input_port_debug_shows_label() {
        assert_eq!(format!("{:?}", InputPort::new(1).unwrap()), "InputPort(1)");
    }

    #[test]
    fn test_mailbox_remote() {
        let mailbox = Mailbox::new(1).unwrap();
        assert_eq!(mailbox.wire(), 0);
        assert_eq!(mailbox.remote(), 10);
        assert!(Mailbox::new(11).is_err());
    }

    #[test]
    fn test_sensor_mode_from_reported() {
        assert_eq!(SensorMode::from_reported(0x20 | 0x05), SensorMode::Boolean);
        assert_eq!(SensorMode::from_reported(0xE0), SensorMode::AngleSteps);
    }

    proptest! {
        #[test]
        fn prop_enum_membership(value in any::<u8>()) {
            let members = SensorType::VALUES.iter().any(|m| m.as_u8() == value);
            prop_assert_eq!(SensorType::try_from(value).is_ok(), members);

            let members = RegulationMode::VALUES.iter().any(|m| m.as_u8() == value);
            prop_assert_eq!(RegulationMode::try_from(value).is_ok(), members);
        }

        #[test]
        fn prop_input_port_domain(label in any::<u8>()) {
            prop_assert_eq!(InputPort::new(label).is_ok(), (1..=4).contains(&label));
        }
    }
}
