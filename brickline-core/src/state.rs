//! Exchange state machine
//!
//! The brick handles one request at a time. A connection moves through
//! these states for every command it sends; the state alone decides whether
//! another send is allowed.

/// Where a connection is in the current request/reply exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExchangeState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Command is being written
    Sent {
        /// Whether the command asked for a reply
        expects_reply: bool,
    },
    /// Command written, reply not yet read
    AwaitingReply,
}

/// Things that happen to an exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExchangeEvent {
    /// A command is about to be written
    Send { expects_reply: bool },
    /// The command frame was flushed to the stream
    Written,
    /// A frame was read back
    ReplyReceived,
    /// The stream failed; whatever was in flight is lost
    StreamFailed,
}

impl ExchangeState {
    /// Whether a new command may be sent
    pub fn can_send(&self) -> bool {
        matches!(self, ExchangeState::Idle)
    }

    pub fn is_awaiting_reply(&self) -> bool {
        matches!(self, ExchangeState::AwaitingReply)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: ExchangeEvent) -> Self {
        use ExchangeEvent::*;
        use ExchangeState::*;

        match (self, event) {
            (Idle, Send { expects_reply }) => Sent { expects_reply },

            (Sent { expects_reply: true }, Written) => AwaitingReply,
            (Sent { expects_reply: false }, Written) => Idle,

            (AwaitingReply, ReplyReceived) => Idle,

            (_, StreamFailed) => Idle,

            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_flow() {
        let state = ExchangeState::Idle;
        let sent = state.transition(ExchangeEvent::Send {
            expects_reply: true,
        });
        assert_eq!(
            sent,
            ExchangeState::Sent {
                expects_reply: true
            }
        );

        let awaiting = sent.transition(ExchangeEvent::Written);
        assert_eq!(awaiting, ExchangeState::AwaitingReply);
        assert!(!awaiting.can_send());

        let idle = awaiting.transition(ExchangeEvent::ReplyReceived);
        assert_eq!(idle, ExchangeState::Idle);
    }

    #[test]
    fn test_suppressed_flow() {
        let idle = ExchangeState::Idle
            .transition(ExchangeEvent::Send {
                expects_reply: false,
            })
            .transition(ExchangeEvent::Written);
        assert_eq!(idle, ExchangeState::Idle);
        assert!(idle.can_send());
    }

    #[test]
    fn test_send_while_awaiting_is_ignored() {
        let state = ExchangeState::AwaitingReply;
        let next = state.transition(ExchangeEvent::Send {
            expects_reply: false,
        });
        assert_eq!(next, ExchangeState::AwaitingReply);
    }

    #[test]
    fn test_stream_failure_from_any_state() {
        let states = [
            ExchangeState::Idle,
            ExchangeState::Sent {
                expects_reply: true,
            },
            ExchangeState::AwaitingReply,
        ];

        for state in states {
            let next = state.transition(ExchangeEvent::StreamFailed);
            assert_eq!(next, ExchangeState::Idle);
        }
    }

    #[test]
    fn test_unsolicited_frame_keeps_idle() {
        let next = ExchangeState::Idle.transition(ExchangeEvent::ReplyReceived);
        assert_eq!(next, ExchangeState::Idle);
    }

    fn event() -> impl proptest::strategy::Strategy<Value = ExchangeEvent> {
        use proptest::prelude::*;
        prop_oneof![
            any::<bool>().prop_map(|expects_reply| ExchangeEvent::Send { expects_reply }),
            Just(ExchangeEvent::Written),
            Just(ExchangeEvent::ReplyReceived),
            Just(ExchangeEvent::StreamFailed),
        ]
    }

    proptest::proptest! {
        #[test]
        fn test_awaiting_only_after_reply_command(events in proptest::collection::vec(event(), 0..32)) {
            let mut state = ExchangeState::Idle;
            let mut last_send = None;
            for event in events {
                if let (ExchangeState::Idle, ExchangeEvent::Send { expects_reply }) = (state, event) {
                    last_send = Some(expects_reply);
                }
                state = state.transition(event);
                if state.is_awaiting_reply() {
                    proptest::prop_assert_eq!(last_send, Some(true));
                }
            }
        }
    }
}
