//! Non-blocking byte stream over the UART pump buffers.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::{Pipe, TryReadError, TryWriteError};
use lhr_proto::embedded_io::{self, ErrorKind, ErrorType, Read, ReadReady, Write};

/// Bytes buffered from the host between ticks.
pub const RX_BUFFER_SIZE: usize = 256;
/// Bytes buffered towards the host; sized for a burst of notifications.
pub const TX_BUFFER_SIZE: usize = 1024;

pub type RxPipe = Pipe<CriticalSectionRawMutex, RX_BUFFER_SIZE>;
pub type TxPipe = Pipe<CriticalSectionRawMutex, TX_BUFFER_SIZE>;

/// Error returned when the outgoing buffer cannot take more bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum PipeStreamError {
    Full,
}

impl embedded_io::Error for PipeStreamError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Full => ErrorKind::OutOfMemory,
        }
    }
}

/// Control-loop side of the UART buffers.
///
/// Reads never wait: callers check [`ReadReady::read_ready`] first, and a
/// read on an empty buffer returns zero bytes.
pub struct PipeStream {
    rx: &'static RxPipe,
    tx: &'static TxPipe,
}

impl PipeStream {
    pub const fn new(rx: &'static RxPipe, tx: &'static TxPipe) -> Self {
        Self { rx, tx }
    }

    /// Bytes still waiting to be sent to the host.
    #[inline]
    pub fn pending_output(&self) -> usize {
        self.tx.len()
    }
}

impl ErrorType for PipeStream {
    type Error = PipeStreamError;
}

impl Read for PipeStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.rx.try_read(buf) {
            Ok(n) => Ok(n),
            Err(TryReadError::Empty) => Ok(0),
        }
    }
}

impl ReadReady for PipeStream {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.rx.len() > 0)
    }
}

impl Write for PipeStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.tx.try_write(buf) {
            Ok(n) => Ok(n),
            Err(TryWriteError::Full) => Err(PipeStreamError::Full),
        }
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
