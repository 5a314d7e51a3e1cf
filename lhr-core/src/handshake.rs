//! Startup connection handshake.
//!
//! The device announces itself by repeatedly sending a frame holding the
//! handshake character. Once the host answers with any line, the device
//! sends an empty frame and waits a little before normal traffic starts.

use embedded_hal::delay::DelayNs;
use lhr_proto::types::LINE_END;
use lhr_proto::{MessageSender, Transport};

/// Handshake timing and marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandshakeConfig {
    pub handshake_char: u8,
    /// Delay between announcements.
    pub attempt_interval_ms: u32,
    /// Delay after the host has answered.
    pub settle_delay_ms: u32,
}

impl HandshakeConfig {
    pub const DEFAULT: Self = Self {
        handshake_char: b'~',
        attempt_interval_ms: 200,
        settle_delay_ms: 200,
    };
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Block until the host sends a line terminator. Returns the number of
/// announcements sent.
pub fn establish_connection<T, D>(transport: &mut T, delay: &mut D, config: &HandshakeConfig) -> u32
where
    T: Transport + ?Sized,
    D: DelayNs,
{
    let mut attempts = 0u32;
    'wait: loop {
        while transport.available() {
            if transport.read() == Some(LINE_END) {
                break 'wait;
            }
        }
        MessageSender::new(transport).send_frame(&[config.handshake_char]);
        attempts = attempts.wrapping_add(1);
        delay.delay_ms(config.attempt_interval_ms);
    }

    info!("host connected after {} handshake attempts", attempts);
    MessageSender::new(transport).send_empty_frame();
    delay.delay_ms(config.settle_delay_ms);
    attempts
}
