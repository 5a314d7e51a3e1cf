//! Write-only framer mirroring the parser's wire syntax.
//!
//! A sender borrows its transport for as long as it is in use, so it is
//! usually created on demand from the owning messager:
//!
//! ```text
//! messager.sender().send_message("pf", 500);   // <pf>(500)
//! messager.sender().send_channel("v");         // <v>
//! ```
//!
//! Write failures are logged and otherwise ignored: a dropped reply must
//! never stall the control loop.

use crate::fmt::{write_i32, MAX_PAYLOAD_DIGITS};
use crate::transport::Transport;
use crate::types::{CHANNEL_END, CHANNEL_START, PAYLOAD_END, PAYLOAD_START};

/// Stateless message writer over a borrowed transport.
pub struct MessageSender<'a, T: ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> MessageSender<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self { transport }
    }

    /// Send `<channel>(payload)` as one frame.
    pub fn send_message(&mut self, channel: &str, payload: i32) {
        self.begin();
        self.send_channel_name(channel);
        self.send_payload(payload);
        self.end();
    }

    /// Send a bare `<channel>` as one frame.
    pub fn send_channel(&mut self, channel: &str) {
        self.begin();
        self.send_channel_name(channel);
        self.end();
    }

    /// Send a frame containing `bytes` verbatim, outside the message syntax.
    pub fn send_frame(&mut self, bytes: &[u8]) {
        self.begin();
        self.put(bytes);
        self.end();
    }

    /// Send a frame with no content.
    pub fn send_empty_frame(&mut self) {
        self.begin();
        self.end();
    }

    /// Write `<channel>` without opening or closing a frame.
    pub fn send_channel_name(&mut self, channel: &str) {
        self.send_channel_start();
        self.put(channel.as_bytes());
        self.send_channel_end();
    }

    pub fn send_channel_start(&mut self) {
        self.put(&[CHANNEL_START]);
    }

    pub fn send_channel_char(&mut self, c: u8) {
        self.put(&[c]);
    }

    pub fn send_channel_end(&mut self) {
        self.put(&[CHANNEL_END]);
    }

    /// Write `(payload)` without opening or closing a frame.
    pub fn send_payload(&mut self, payload: i32) {
        let mut buf = [0u8; MAX_PAYLOAD_DIGITS];
        let len = write_i32(&mut buf, payload);
        self.send_payload_start();
        self.put(&buf[..len]);
        self.send_payload_end();
    }

    pub fn send_payload_start(&mut self) {
        self.put(&[PAYLOAD_START]);
    }

    pub fn send_payload_end(&mut self) {
        self.put(&[PAYLOAD_END]);
    }

    /// Open a frame on the underlying transport.
    pub fn begin(&mut self) {
        if let Err(e) = self.transport.begin_frame() {
            error!("failed to open outgoing frame: {}", e);
        }
    }

    /// Close a frame on the underlying transport.
    pub fn end(&mut self) {
        if let Err(e) = self.transport.end_frame() {
            error!("failed to close outgoing frame: {}", e);
        }
    }

    fn put(&mut self, bytes: &[u8]) {
        if let Err(e) = self.transport.write(bytes) {
            error!("failed to write {} bytes: {}", bytes.len(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::parser::MessageParser;
    use crate::transport::mock::MockStream;
    use crate::transport::{AsciiTransport, SysexTransport};
    use std::vec::Vec;

    #[test]
    fn test_send_message_ascii() {
        let mut t = AsciiTransport::new(MockStream::default());
        MessageSender::new(&mut t).send_message("pflpl", -20);
        MessageSender::new(&mut t).send_channel("v");
        assert_eq!(t.inner().tx, b"<pflpl>(-20)\n<v>\n");
    }

    #[test]
    fn test_send_composed_pieces() {
        let mut t = AsciiTransport::new(MockStream::default());
        let mut sender = MessageSender::new(&mut t);
        sender.begin();
        sender.send_channel_start();
        sender.send_channel_char(b'i');
        sender.send_channel_char(b'a');
        sender.send_channel_char(b'1');
        sender.send_channel_end();
        sender.send_payload(1023);
        sender.end();
        assert_eq!(t.inner().tx, b"<ia1>(1023)\n");
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let mut stream = MockStream::default();
        stream.fail_writes = true;
        let mut t = AsciiTransport::new(stream);
        MessageSender::new(&mut t).send_message("e", 1);
        assert!(t.inner().tx.is_empty());
    }

    #[test]
    fn test_round_trip_ascii() {
        let cases: &[(&str, i32)] = &[
            ("e", 0),
            ("p", -1),
            ("pfpp", 4000),
            ("abcdefgh", i32::MAX),
            ("Z9", i32::MIN),
        ];
        for &(channel, payload) in cases {
            let mut t = AsciiTransport::new(MockStream::default());
            MessageSender::new(&mut t).send_message(channel, payload);

            let sent: Vec<u8> = t.inner().tx.clone();
            let mut rx = AsciiTransport::new(MockStream::with_input(&sent));
            let mut parser = MessageParser::new();
            parser.update(&mut rx);
            assert!(parser.just_received_channel(channel), "channel {}", channel);
            assert_eq!(parser.payload(), Some(payload));
        }
    }

    #[test]
    fn test_round_trip_sysex() {
        let mut t = SysexTransport::new(MockStream::default());
        MessageSender::new(&mut t).send_message("zmt", 3000);
        MessageSender::new(&mut t).send_channel("zm");

        let sent: Vec<u8> = t.inner().tx.clone();
        let mut rx = SysexTransport::new(MockStream::with_input(&sent));
        let mut parser = MessageParser::new();

        parser.update(&mut rx);
        assert!(parser.just_received_channel("zmt"));
        assert_eq!(parser.payload(), Some(3000));

        parser.update(&mut rx);
        assert!(parser.just_received_channel("zm"));
        assert!(!parser.received_payload());
    }
}
