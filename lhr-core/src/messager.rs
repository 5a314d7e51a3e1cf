//! Messager: one transport shared by a parser and a sender.

use lhr_proto::{Message, MessageParser, MessageSender, Transport};

/// Pairs a [`MessageParser`] and the sending side of one transport.
///
/// The scheduler owns the messager and lends it to each protocol handler in
/// turn, so every handler sees the same received message during a tick.
pub struct Messager<T> {
    parser: MessageParser,
    transport: T,
}

impl<T: Transport> Messager<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            parser: MessageParser::new(),
            transport,
        }
    }

    /// Parse at most one message from the transport.
    pub fn update(&mut self) {
        self.parser.update(&mut self.transport);
    }

    #[inline]
    pub fn parser(&self) -> &MessageParser {
        &self.parser
    }

    /// The message completed during the latest update, if any.
    pub fn received(&self) -> Option<&Message> {
        if self.parser.just_received() {
            Some(self.parser.message())
        } else {
            None
        }
    }

    pub fn sender(&mut self) -> MessageSender<'_, T> {
        MessageSender::new(&mut self.transport)
    }

    /// Reply on the channel of the most recently received message.
    pub fn send_response(&mut self, payload: i32) {
        MessageSender::new(&mut self.transport).send_message(self.parser.channel(), payload);
    }

    pub fn send_message(&mut self, channel: &str, payload: i32) {
        self.sender().send_message(channel, payload);
    }

    /// Send a bare `<channel>`.
    pub fn send_channel(&mut self, channel: &str) {
        self.sender().send_channel(channel);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}


#[cfg(test)]
mod tests {
    extern crate std;

    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_send_response_uses_received_channel() {
        let mut messager = Messager::new(MockTransport::default());
        messager.transport_mut().push("<pfc>\n");
        messager.update();
        assert_eq!(messager.received().map(|m| m.channel()), Some("pfc"));

        messager.send_response(150);
        assert_eq!(messager.transport_mut().take_lines(), ["<pfc>(150)"]);
    }

    #[test]
    fn test_received_is_a_pulse() {
        let mut messager = Messager::new(MockTransport::default());
        messager.transport_mut().push("<e>(4)");
        messager.update();
        assert!(messager.received().is_some());
        messager.update();
        assert!(messager.received().is_none());
    }

    #[test]
    fn test_send_message_and_channel() {
        let mut messager = Messager::new(MockTransport::default());
        messager.send_message("pp", 512);
        messager.send_channel("v");
        assert_eq!(messager.transport_mut().take_lines(), ["<pp>(512)", "<v>"]);
    }
}
