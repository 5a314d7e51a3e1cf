//! Message types and wire delimiters.

/// Opens a channel name.
pub const CHANNEL_START: u8 = b'<';
/// Closes a channel name.
pub const CHANNEL_END: u8 = b'>';
/// Opens a payload.
pub const PAYLOAD_START: u8 = b'(';
/// Closes a payload.
pub const PAYLOAD_END: u8 = b')';
/// Terminates a line on the ASCII transport.
pub const LINE_END: u8 = b'\n';

/// Maximum number of characters in a channel name.
pub const MAX_CHANNEL_LENGTH: usize = 8;

/// Bounded channel name.
pub type Channel = heapless::String<MAX_CHANNEL_LENGTH>;

/// A complete protocol message: a channel name and an optional payload.
///
/// A message without a payload is a query; a message with a payload is a
/// command. A payload of `0` is a value like any other, distinct from `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub channel: Channel,
    pub payload: Option<i32>,
}

impl Message {
    /// Build a message, returning `None` if the channel is empty, too long,
    /// or contains non-alphanumeric characters.
    #[must_use]
    pub fn new(channel: &str, payload: Option<i32>) -> Option<Self> {
        if channel.is_empty() || !channel.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let channel = Channel::try_from(channel).ok()?;
        Some(Self { channel, payload })
    }

    /// The channel name as a string slice.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &str {
        self.channel.as_str()
    }

    /// Channel character at `depth`, if the channel is that long.
    #[inline]
    #[must_use]
    pub fn key(&self, depth: usize) -> Option<u8> {
        self.channel.as_bytes().get(depth).copied()
    }

    /// Whether the message carried a payload.
    #[inline]
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Message {
    fn format(&self, f: defmt::Formatter) {
        match self.payload {
            Some(payload) => defmt::write!(f, "<{=str}>({=i32})", self.channel.as_str(), payload),
            None => defmt::write!(f, "<{=str}>", self.channel.as_str()),
        }
    }
}
