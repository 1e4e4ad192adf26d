//! Reply registry and dispatcher
//!
//! A single table maps each command code to its message kind. The table is
//! built at compile time from the command list, so it is immutable and
//! needs no locking; a duplicate code fails the build.

use crate::command::{Command, Reply};
use crate::commands;
use crate::fields::{CommandType, SUPPRESS_REPLY};
use crate::replies;

/// Reply a command solicits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExpectedReply {
    /// Fire and forget; the header sets the suppress bit
    None,
    /// The device answers, but with an untyped body
    Generic,
    /// The device answers with this reply kind
    Typed(MessageKind),
}

impl ExpectedReply {
    pub const fn is_none(self) -> bool {
        matches!(self, ExpectedReply::None)
    }
}

macro_rules! message_kinds {
    (
        commands { $($cmd:ident),+ $(,)? }
        replies { $($reply:ident),+ $(,)? }
    ) => {
        /// Identity of every message type in the catalog
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub enum MessageKind {
            /// Untyped payload: unknown code, generic reply or missing header
            Generic,
            $($cmd,)+
            $($reply,)+
        }

        impl MessageKind {
            /// Every command kind; these populate the registry
            pub const COMMANDS: &'static [MessageKind] = &[$(MessageKind::$cmd),+];

            /// Every reply kind
            pub const REPLIES: &'static [MessageKind] = &[$(MessageKind::$reply),+];

            pub const fn name(self) -> &'static str {
                match self {
                    MessageKind::Generic => "Generic",
                    $(MessageKind::$cmd => stringify!($cmd),)+
                    $(MessageKind::$reply => stringify!($reply),)+
                }
            }

            /// Command code; for a reply, the code of the command it answers
            pub const fn code(self) -> Option<u8> {
                match self {
                    MessageKind::Generic => None,
                    $(MessageKind::$cmd => Some(<commands::$cmd as Command>::CODE),)+
                    $(MessageKind::$reply => Some(<replies::$reply as Reply>::REQUEST_CODE),)+
                }
            }

            pub const fn command_type(self) -> Option<CommandType> {
                match self {
                    MessageKind::Generic => None,
                    $(MessageKind::$cmd => Some(<commands::$cmd as Command>::COMMAND_TYPE),)+
                    $(MessageKind::$reply => Some(CommandType::Reply),)+
                }
            }

            pub const fn expected_reply(self) -> ExpectedReply {
                match self {
                    $(MessageKind::$cmd => <commands::$cmd as Command>::EXPECTED_REPLY,)+
                    _ => ExpectedReply::None,
                }
            }

            pub const fn is_reply(self) -> bool {
                matches!(self, $(MessageKind::$reply)|+)
            }
        }
    };
}

message_catalog!(message_kinds);

/// Command code to message kind table
pub struct Registry {
    by_code: [Option<MessageKind>; 256],
}

impl Registry {
    /// Build the table from a list of command kinds
    ///
    /// Panics (at compile time when used in a `const` or `static`) on a
    /// duplicate code, a reply kind, or [`MessageKind::Generic`].
    pub const fn build(kinds: &[MessageKind]) -> Self {
        let mut by_code = [None; 256];
        let mut i = 0;
        while i < kinds.len() {
            let kind = kinds[i];
            if kind.is_reply() {
                panic!("reply kinds are not registered");
            }
            let code = match kind.code() {
                Some(code) => code as usize,
                None => panic!("the generic kind has no code"),
            };
            if by_code[code].is_some() {
                panic!("duplicate command code");
            }
            by_code[code] = Some(kind);
            i += 1;
        }
        Registry { by_code }
    }

    /// Kind registered for `code`, if any
    pub const fn lookup(&self, code: u8) -> Option<MessageKind> {
        self.by_code[code as usize]
    }

    /// Message kind for a payload with this header
    ///
    /// Never fails: an unknown code resolves to [`MessageKind::Generic`].
    /// A reply frame resolves to the reply the command declares.
    pub fn resolve(&self, type_byte: u8, code: u8) -> MessageKind {
        let Some(kind) = self.lookup(code) else {
            error!("unrecognized command code {:#x}", code);
            return MessageKind::Generic;
        };

        if type_byte & !SUPPRESS_REPLY != CommandType::Reply.as_u8() {
            return kind;
        }
        match kind.expected_reply() {
            ExpectedReply::Typed(reply) => reply,
            ExpectedReply::Generic => MessageKind::Generic,
            ExpectedReply::None => kind,
        }
    }

    /// Number of registered codes
    pub fn len(&self) -> usize {
        self.by_code.iter().filter(|k| k.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide registry of every command kind
pub static REGISTRY: Registry = Registry::build(MessageKind::COMMANDS);

/// Resolve a header against [`REGISTRY`]
pub fn resolve(type_byte: u8, code: u8) -> MessageKind {
    REGISTRY.resolve(type_byte, code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_registered() {
        assert_eq!(REGISTRY.len(), MessageKind::COMMANDS.len());
        for &kind in MessageKind::COMMANDS {
            assert_eq!(REGISTRY.lookup(kind.code().unwrap()), Some(kind));
        }
    }

    #[test]
    fn test_replies_never_registered() {
        for &kind in MessageKind::REPLIES {
            assert_ne!(REGISTRY.lookup(kind.code().unwrap()), Some(kind));
        }
    }

    #[test]
    fn test_resolve_battery_reply() {
        assert_eq!(resolve(0x02, 0x0B), MessageKind::BatteryResponse);
        assert_eq!(resolve(0x00, 0x0B), MessageKind::GetBatteryLevel);
    }

    #[test]
    fn test_resolve_masks_suppress_bit() {
        assert_eq!(resolve(0x82, 0x0D), MessageKind::SleepTimeout);
        assert_eq!(resolve(0x80, 0x0D), MessageKind::KeepAlive);
    }

    #[test]
    fn test_resolve_unknown_code() {
        assert_eq!(resolve(0x02, 0x12), MessageKind::Generic);
        assert_eq!(resolve(0x00, 0xFE), MessageKind::Generic);
    }

    #[test]
    fn test_resolve_generic_reply() {
        assert_eq!(resolve(0x01, 0x88), MessageKind::GetVersion);
        assert_eq!(resolve(0x02, 0x88), MessageKind::Generic);
    }

    #[test]
    fn test_reply_for_fire_and_forget_keeps_command_kind() {
        assert_eq!(resolve(0x02, 0x04), MessageKind::SetOutputState);
    }

    #[test]
    fn test_expected_reply_codes_match() {
        for &kind in MessageKind::COMMANDS {
            if let ExpectedReply::Typed(reply) = kind.expected_reply() {
                assert!(reply.is_reply(), "{} expects a non-reply", kind.name());
                assert_eq!(reply.code(), kind.code(), "{}", kind.name());
            }
        }
    }

    #[test]
    fn test_command_types() {
        assert_eq!(MessageKind::GetVersion.command_type(), Some(CommandType::System));
        assert_eq!(MessageKind::PlayTone.command_type(), Some(CommandType::Direct));
        assert_eq!(MessageKind::LsStatus.command_type(), Some(CommandType::Reply));
        assert_eq!(MessageKind::Generic.command_type(), None);
    }
}
