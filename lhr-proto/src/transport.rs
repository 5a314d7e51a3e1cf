//! Byte-stream transports carrying protocol messages.
//!
//! The parser and sender only need the [`Transport`] contract. Two strategies
//! are provided over any `embedded-io` stream:
//!
//! - [`AsciiTransport`]: plain text, one message per line.
//! - [`SysexTransport`]: each message wrapped in a MIDI system-exclusive
//!   frame `F0 0F <ascii message> F7`, so the protocol can share a link with
//!   other sysex traffic.

use core::fmt;

use embedded_io::{Error as _, ErrorKind, Read, ReadReady, Write};

use crate::types::LINE_END;

/// Start of a sysex frame.
pub const SYSEX_START: u8 = 0xF0;
/// End of a sysex frame.
pub const SYSEX_END: u8 = 0xF7;
/// Sysex command byte reserved for protocol messages.
pub const MESSAGE_SYSEX_COMMAND: u8 = 0x0F;

/// Errors that can occur when writing to a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The peer is gone or the stream refused to accept more bytes.
    Closed,
    /// The operation was interrupted before completing.
    Interrupted,
    /// Any other stream failure.
    Other,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "transport closed"),
            Self::Interrupted => write!(f, "transport interrupted"),
            Self::Other => write!(f, "transport failure"),
        }
    }
}

impl From<ErrorKind> for TransportError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::WriteZero
            | ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted => Self::Closed,
            ErrorKind::Interrupted | ErrorKind::TimedOut => Self::Interrupted,
            _ => Self::Other,
        }
    }
}

/// Byte-stream contract consumed by the message parser and sender.
///
/// Reads never block: [`Transport::available`] reports whether a byte can be
/// taken right now, and bytes left unread stay buffered for the next tick.
pub trait Transport {
    /// Whether at least one message byte can be read without blocking.
    fn available(&mut self) -> bool;

    /// Take the next message byte, if any.
    fn read(&mut self) -> Option<u8>;

    /// Write raw message bytes.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Open an outgoing message frame.
    fn begin_frame(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Close an outgoing message frame.
    fn end_frame(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn available(&mut self) -> bool {
        (**self).available()
    }

    fn read(&mut self) -> Option<u8> {
        (**self).read()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn begin_frame(&mut self) -> Result<(), TransportError> {
        (**self).begin_frame()
    }

    fn end_frame(&mut self) -> Result<(), TransportError> {
        (**self).end_frame()
    }
}

fn stream_ready<S: ReadReady>(stream: &mut S) -> bool {
    match stream.read_ready() {
        Ok(ready) => ready,
        Err(e) => {
            warn!("transport readiness check failed: {}", TransportError::from(e.kind()));
            false
        }
    }
}

fn stream_read_byte<S: Read>(stream: &mut S) -> Option<u8> {
    let mut byte = [0u8; 1];
    match stream.read(&mut byte) {
        Ok(1) => Some(byte[0]),
        Ok(_) => None,
        Err(e) => {
            warn!("transport read failed: {}", TransportError::from(e.kind()));
            None
        }
    }
}

fn stream_write<S: Write>(stream: &mut S, bytes: &[u8]) -> Result<(), TransportError> {
    stream
        .write_all(bytes)
        .map_err(|e| TransportError::from(e.kind()))
}

/// Plain-text transport: messages are written as `<channel>(payload)\n`.
pub struct AsciiTransport<S> {
    stream: S,
}

impl<S> AsciiTransport<S> {
    pub const fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn inner(&self) -> &S {
        &self.stream
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + ReadReady + Write> Transport for AsciiTransport<S> {
    fn available(&mut self) -> bool {
        stream_ready(&mut self.stream)
    }

    fn read(&mut self) -> Option<u8> {
        stream_read_byte(&mut self.stream)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        stream_write(&mut self.stream, bytes)
    }

    fn end_frame(&mut self) -> Result<(), TransportError> {
        stream_write(&mut self.stream, &[LINE_END])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SysexState {
    /// Between frames.
    Outside,
    /// Saw `F0`, expecting the command byte.
    Command,
    /// Inside a protocol message frame.
    Inside,
    /// Inside a frame addressed to some other command.
    Skipping,
}

/// Sysex-framed transport.
///
/// Only frames carrying [`MESSAGE_SYSEX_COMMAND`] reach the parser; all other
/// traffic is discarded. The end of every accepted frame is delivered to the
/// parser as a line terminator, so an empty frame reads as a blank line.
pub struct SysexTransport<S> {
    stream: S,
    state: SysexState,
    pending: Option<u8>,
}

impl<S> SysexTransport<S> {
    pub const fn new(stream: S) -> Self {
        Self {
            stream,
            state: SysexState::Outside,
            pending: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.stream
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Run one raw byte through the frame filter, returning the message byte
    /// it carries, if any.
    fn filter(&mut self, byte: u8) -> Option<u8> {
        if byte == SYSEX_START {
            if self.state == SysexState::Inside {
                warn!("sysex frame interrupted by a new frame start");
            }
            self.state = SysexState::Command;
            return None;
        }

        match self.state {
            SysexState::Outside => None,
            SysexState::Command => {
                self.state = match byte {
                    MESSAGE_SYSEX_COMMAND => SysexState::Inside,
                    SYSEX_END => SysexState::Outside,
                    _ => SysexState::Skipping,
                };
                None
            }
            SysexState::Inside => {
                if byte == SYSEX_END {
                    self.state = SysexState::Outside;
                    Some(LINE_END)
                } else if byte & 0x80 != 0 {
                    warn!("dropping sysex frame on status byte {}", byte);
                    self.state = SysexState::Outside;
                    None
                } else {
                    Some(byte)
                }
            }
            SysexState::Skipping => {
                if byte == SYSEX_END {
                    self.state = SysexState::Outside;
                }
                None
            }
        }
    }
}

impl<S: Read + ReadReady + Write> Transport for SysexTransport<S> {
    fn available(&mut self) -> bool {
        while self.pending.is_none() && stream_ready(&mut self.stream) {
            let Some(raw) = stream_read_byte(&mut self.stream) else {
                break;
            };
            self.pending = self.filter(raw);
        }
        self.pending.is_some()
    }

    fn read(&mut self) -> Option<u8> {
        if self.pending.is_none() {
            self.available();
        }
        self.pending.take()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        stream_write(&mut self.stream, bytes)
    }

    fn begin_frame(&mut self) -> Result<(), TransportError> {
        stream_write(&mut self.stream, &[SYSEX_START, MESSAGE_SYSEX_COMMAND])
    }

    fn end_frame(&mut self) -> Result<(), TransportError> {
        stream_write(&mut self.stream, &[SYSEX_END])
    }
}


#[cfg(test)]
mod tests {
    extern crate std;

    use super::mock::MockStream;
    use super::*;
    use std::vec::Vec;

    fn drain<T: Transport>(transport: &mut T) -> Vec<u8> {
        let mut out = Vec::new();
        while transport.available() {
            match transport.read() {
                Some(b) => out.push(b),
                None => break,
            }
        }
        out
    }

    #[test]
    fn test_ascii_passes_bytes_through() {
        let mut transport = AsciiTransport::new(MockStream::with_input(b"<e>(1)\n"));
        assert_eq!(drain(&mut transport), b"<e>(1)\n");
        assert!(!transport.available());
        assert_eq!(transport.read(), None);
    }

    #[test]
    fn test_ascii_frames_end_with_newline() {
        let mut transport = AsciiTransport::new(MockStream::default());
        transport.begin_frame().unwrap();
        transport.write(b"<v0>(1)").unwrap();
        transport.end_frame().unwrap();
        assert_eq!(transport.inner().tx, b"<v0>(1)\n");
    }

    #[test]
    fn test_write_error_maps_kind() {
        let mut stream = MockStream::default();
        stream.fail_writes = true;
        let mut transport = AsciiTransport::new(stream);
        assert_eq!(transport.write(b"<e>"), Err(TransportError::Closed));
    }

    #[test]
    fn test_sysex_unwraps_message_frames() {
        let mut input = Vec::new();
        input.extend_from_slice(&[SYSEX_START, MESSAGE_SYSEX_COMMAND]);
        input.extend_from_slice(b"<pf>(500)");
        input.push(SYSEX_END);
        let mut transport = SysexTransport::new(MockStream::with_input(&input));
        assert_eq!(drain(&mut transport), b"<pf>(500)\n");
    }

    #[test]
    fn test_sysex_discards_other_traffic() {
        let mut input = Vec::new();
        // Noise outside any frame
        input.extend_from_slice(b"junk");
        // A frame for a different sysex command
        input.extend_from_slice(&[SYSEX_START, 0x79, b'<', b'x', b'>', SYSEX_END]);
        // Protocol frame
        input.extend_from_slice(&[SYSEX_START, MESSAGE_SYSEX_COMMAND, b'<', b'e', b'>', SYSEX_END]);
        let mut transport = SysexTransport::new(MockStream::with_input(&input));
        assert_eq!(drain(&mut transport), b"<e>\n");
    }

    #[test]
    fn test_sysex_empty_frame_reads_as_blank_line() {
        let input = [SYSEX_START, MESSAGE_SYSEX_COMMAND, SYSEX_END];
        let mut transport = SysexTransport::new(MockStream::with_input(&input));
        assert_eq!(drain(&mut transport), b"\n");
    }

    #[test]
    fn test_sysex_status_byte_aborts_frame() {
        let input = [
            SYSEX_START,
            MESSAGE_SYSEX_COMMAND,
            b'<',
            0x90,
            b'a',
            SYSEX_END,
            SYSEX_START,
            MESSAGE_SYSEX_COMMAND,
            b'b',
            SYSEX_END,
        ];
        let mut transport = SysexTransport::new(MockStream::with_input(&input));
        assert_eq!(drain(&mut transport), b"<b\n");
    }

    #[test]
    fn test_sysex_frames_outgoing_messages() {
        let mut transport = SysexTransport::new(MockStream::default());
        transport.begin_frame().unwrap();
        transport.write(b"<r>(1)").unwrap();
        transport.end_frame().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&[SYSEX_START, MESSAGE_SYSEX_COMMAND]);
        expected.extend_from_slice(b"<r>(1)");
        expected.push(SYSEX_END);
        assert_eq!(transport.inner().tx, expected);
    }
}
