//! Incremental `<channel>(payload)` message tokenizer.

use crate::transport::Transport;
use crate::types::{
    Channel, Message, CHANNEL_END, CHANNEL_START, MAX_CHANNEL_LENGTH, PAYLOAD_END, PAYLOAD_START,
};
use crate::value_parser::{IntegerParser, StringParser, ValueParser};

/// Macro-state of the message tokenizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageState {
    #[default]
    AwaitingChannel,
    ParsingChannel,
    AwaitingPayload,
    ParsingPayload,
    ParsedMessage,
}

/// Character-driven parser composing a channel field and a payload field.
///
/// At most one message completes per [`MessageParser::update`]: once
/// [`MessageState::ParsedMessage`] is entered the parser stops consuming
/// bytes, leaving the rest buffered in the transport for the next tick.
///
/// A channel followed by a line terminator or by the start of another message
/// is a complete query without payload, so both `<e>()` and `<e>` are
/// accepted and report no payload, while `<e>(0)` reports a payload of `0`.
#[derive(Debug, Clone)]
pub struct MessageParser {
    state: MessageState,
    channel_parser: StringParser<MAX_CHANNEL_LENGTH>,
    payload_parser: IntegerParser,
    message: Message,
    resume_channel: bool,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: MessageState::AwaitingChannel,
            channel_parser: StringParser::new(CHANNEL_START, CHANNEL_END),
            payload_parser: IntegerParser::new(PAYLOAD_START, PAYLOAD_END),
            message: Message {
                channel: Channel::new(),
                payload: None,
            },
            resume_channel: false,
        }
    }

    /// Re-arm after a completed message, then consume available bytes until
    /// the transport runs dry or a message completes.
    pub fn update<T: Transport + ?Sized>(&mut self, transport: &mut T) {
        if self.state == MessageState::ParsedMessage {
            if core::mem::take(&mut self.resume_channel) {
                self.channel_parser.reset();
                self.state = MessageState::ParsingChannel;
            } else {
                self.state = MessageState::AwaitingChannel;
            }
        }

        while transport.available() {
            let Some(byte) = transport.read() else {
                break;
            };
            if !self.on_char(byte) {
                break;
            }
        }
    }

    /// Feed one byte. Returns `false` once a message has completed and no
    /// more bytes should be consumed this tick.
    pub fn on_char(&mut self, byte: u8) -> bool {
        match self.state {
            MessageState::AwaitingChannel => {
                if byte == CHANNEL_START {
                    self.start_channel();
                }
            }
            MessageState::ParsingChannel => {
                if byte == CHANNEL_START {
                    warn!(
                        "channel '{}' interrupted by a new channel start, restarting",
                        self.channel_parser.partial()
                    );
                    self.start_channel();
                } else if !self.channel_parser.on_char(byte) {
                    self.state = MessageState::AwaitingPayload;
                }
            }
            MessageState::AwaitingPayload => match byte {
                PAYLOAD_START => {
                    self.payload_parser.reset();
                    self.state = MessageState::ParsingPayload;
                }
                b'\n' | b'\r' => return self.complete(None),
                CHANNEL_START => {
                    self.resume_channel = true;
                    return self.complete(None);
                }
                _ => {}
            },
            MessageState::ParsingPayload => {
                if byte == CHANNEL_START {
                    warn!(
                        "payload for '{}' interrupted by a new channel start, discarding message",
                        self.channel_parser.received().as_str()
                    );
                    self.start_channel();
                } else if !self.payload_parser.on_char(byte) {
                    let payload = *self.payload_parser.received();
                    return self.complete(payload);
                }
            }
            MessageState::ParsedMessage => return false,
        }
        true
    }

    fn start_channel(&mut self) {
        self.channel_parser.reset();
        self.state = MessageState::ParsingChannel;
    }

    fn complete(&mut self, payload: Option<i32>) -> bool {
        self.message.channel.clone_from(self.channel_parser.received());
        self.message.payload = payload;
        self.state = MessageState::ParsedMessage;
        trace!("received message on channel '{}'", self.message.channel.as_str());
        false
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> MessageState {
        self.state
    }

    /// Whether a message completed during the latest update.
    #[inline]
    #[must_use]
    pub fn just_received(&self) -> bool {
        self.state == MessageState::ParsedMessage
    }

    /// Whether a message for exactly `channel` completed during the latest
    /// update.
    #[must_use]
    pub fn just_received_channel(&self, channel: &str) -> bool {
        self.just_received() && self.is_channel(channel)
    }

    /// Whether the most recent message was addressed to exactly `channel`.
    #[must_use]
    pub fn is_channel(&self, channel: &str) -> bool {
        self.message.channel.as_str() == channel
    }

    /// Whether the most recent message carried a payload.
    #[inline]
    #[must_use]
    pub fn received_payload(&self) -> bool {
        self.message.payload.is_some()
    }

    #[inline]
    #[must_use]
    pub fn channel(&self) -> &str {
        self.message.channel.as_str()
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> Option<i32> {
        self.message.payload
    }

    /// The most recent complete message.
    #[inline]
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::transport::mock::MockStream;
    use crate::transport::AsciiTransport;

    fn transport(bytes: &[u8]) -> AsciiTransport<MockStream> {
        AsciiTransport::new(MockStream::with_input(bytes))
    }

    #[test]
    fn test_parses_command() {
        let mut t = transport(b"<pf>(500)\n");
        let mut parser = MessageParser::new();
        parser.update(&mut t);
        assert!(parser.just_received());
        assert!(parser.just_received_channel("pf"));
        assert!(!parser.just_received_channel("p"));
        assert_eq!(parser.channel(), "pf");
        assert_eq!(parser.payload(), Some(500));
    }

    #[test]
    fn test_interrupted_channel_restarts() {
        let mut t = transport(b"<ab<cd>(1)");
        let mut parser = MessageParser::new();
        parser.update(&mut t);
        assert!(parser.just_received());
        assert_eq!(parser.channel(), "cd");
    }

    #[test]
    fn test_interrupted_channel_keeps_partial_until_restart() {
        let mut parser = MessageParser::new();
        for &byte in b"<v>\n<ab" {
            parser.on_char(byte);
            if parser.just_received() {
                parser.update(&mut transport(b""));
            }
        }
        assert_eq!(parser.state(), MessageState::ParsingChannel);
        assert_eq!(parser.channel_parser.partial(), "ab");
        assert_eq!(parser.channel_parser.received().as_str(), "v");

        parser.on_char(b'<');
        assert_eq!(parser.channel_parser.partial(), "");
        assert_eq!(parser.state(), MessageState::ParsingChannel);
    }

    #[test]
    fn test_one_message_per_update() {
        let mut t = transport(b"<a>(1)<b>(2)");
        let mut parser = MessageParser::new();

        parser.update(&mut t);
        assert!(parser.just_received_channel("a"));
        assert_eq!(parser.payload(), Some(1));

        parser.update(&mut t);
        assert!(parser.just_received_channel("b"));
        assert_eq!(parser.payload(), Some(2));

        parser.update(&mut t);
        assert!(!parser.just_received());
        // The last message stays readable after the pulse has passed.
        assert_eq!(parser.channel(), "b");
    }

    #[test]
    fn test_query_and_command_distinction() {
        let mut parser = MessageParser::new();

        let mut t = transport(b"<e>()");
        parser.update(&mut t);
        assert!(parser.just_received_channel("e"));
        assert!(!parser.received_payload());

        let mut t = transport(b"<e>\n");
        parser.update(&mut t);
        assert!(parser.just_received_channel("e"));
        assert!(!parser.received_payload());

        let mut t = transport(b"<e>(0)");
        parser.update(&mut t);
        assert!(parser.just_received_channel("e"));
        assert!(parser.received_payload());
        assert_eq!(parser.payload(), Some(0));
    }

    #[test]
    fn test_bare_query_followed_by_message() {
        let mut t = transport(b"<v><e>(3)");
        let mut parser = MessageParser::new();

        parser.update(&mut t);
        assert!(parser.just_received_channel("v"));
        assert!(!parser.received_payload());

        parser.update(&mut t);
        assert!(parser.just_received_channel("e"));
        assert_eq!(parser.payload(), Some(3));
    }

    #[test]
    fn test_partial_message_across_updates() {
        let mut parser = MessageParser::new();
        let mut t = transport(b"<pf");
        parser.update(&mut t);
        assert!(!parser.just_received());
        assert_eq!(parser.state(), MessageState::ParsingChannel);

        t.inner_mut().rx.extend(b">(-12)".iter().copied());
        parser.update(&mut t);
        assert!(parser.just_received_channel("pf"));
        assert_eq!(parser.payload(), Some(-12));
    }

    #[test]
    fn test_noise_before_channel_ignored() {
        let mut t = transport(b"~\nxyz<l>(1)");
        let mut parser = MessageParser::new();
        parser.update(&mut t);
        assert!(parser.just_received_channel("l"));
        assert_eq!(parser.payload(), Some(1));
    }

    #[test]
    fn test_interrupted_payload_discards_message() {
        let mut t = transport(b"<a>(12<b>(3)");
        let mut parser = MessageParser::new();
        parser.update(&mut t);
        assert!(parser.just_received_channel("b"));
        assert_eq!(parser.payload(), Some(3));
    }
}
