//! Single-field incremental parsers.
//!
//! A field is delimited by a start/end character pair and parsed one byte at a
//! time. The owner of a parser consumes the start delimiter itself, calls
//! [`ValueParser::reset`], and then feeds every following byte to
//! [`ValueParser::on_char`] until it returns `false`.

use heapless::String;

/// Progress of a single field.
///
/// `Parsed` is a pulse: it holds only until the owner resets the parser for
/// the next field, so the received value must be sampled (or copied out)
/// before then.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParserState {
    #[default]
    Ready,
    Parsing,
    Parsed,
}

/// Incremental parser for one delimited field.
pub trait ValueParser {
    /// Value produced when the field completes.
    type Value;

    /// Consume one byte. Returns `false` once the end delimiter has been
    /// consumed and the field is complete.
    fn on_char(&mut self, byte: u8) -> bool;

    /// Clear all scratch state and return to [`ParserState::Ready`].
    fn reset(&mut self);

    fn state(&self) -> ParserState;

    /// Value of the most recently completed field.
    fn received(&self) -> &Self::Value;

    /// Byte which opens this field.
    fn start_delimiter(&self) -> u8;

    /// Byte which closes this field.
    fn end_delimiter(&self) -> u8;

    #[inline]
    fn just_parsed(&self) -> bool {
        self.state() == ParserState::Parsed
    }
}

/// Parser for a bounded alphanumeric string field.
///
/// Characters beyond the capacity `N` are dropped. Control characters are
/// skipped silently; any other non-alphanumeric character is logged and
/// skipped without aborting the field.
#[derive(Debug, Clone)]
pub struct StringParser<const N: usize> {
    start: u8,
    end: u8,
    state: ParserState,
    buffer: String<N>,
    received: String<N>,
}

impl<const N: usize> StringParser<N> {
    #[must_use]
    pub const fn new(start: u8, end: u8) -> Self {
        Self {
            start,
            end,
            state: ParserState::Ready,
            buffer: String::new(),
            received: String::new(),
        }
    }

    /// Characters collected so far for a field still being parsed.
    #[inline]
    #[must_use]
    pub fn partial(&self) -> &str {
        self.buffer.as_str()
    }
}

impl<const N: usize> ValueParser for StringParser<N> {
    type Value = String<N>;

    fn on_char(&mut self, byte: u8) -> bool {
        if byte == self.end {
            self.received = self.buffer.clone();
            self.state = ParserState::Parsed;
            return false;
        }

        self.state = ParserState::Parsing;
        if byte.is_ascii_alphanumeric() {
            if self.buffer.push(byte as char).is_err() {
                warn!(
                    "field longer than {} characters, dropping '{}'",
                    N,
                    byte as char
                );
            }
        } else if !byte.is_ascii_control() {
            warn!("ignoring unexpected byte {} in string field", byte);
        }
        true
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.state = ParserState::Ready;
    }

    #[inline]
    fn state(&self) -> ParserState {
        self.state
    }

    #[inline]
    fn received(&self) -> &String<N> {
        &self.received
    }

    #[inline]
    fn start_delimiter(&self) -> u8 {
        self.start
    }

    #[inline]
    fn end_delimiter(&self) -> u8 {
        self.end
    }
}

/// Parser for a signed decimal integer field.
///
/// A leading `-` is honored only as the first character of the field. The
/// received value is `None` when the field held no digits, so an empty field
/// is distinguishable from an explicit `0`.
///
/// Values which do not fit in an `i32` are logged and wrap around.
#[derive(Debug, Clone)]
pub struct IntegerParser {
    start: u8,
    end: u8,
    state: ParserState,
    value: i32,
    negative: bool,
    started: bool,
    digits: usize,
    received: Option<i32>,
}

impl IntegerParser {
    #[must_use]
    pub const fn new(start: u8, end: u8) -> Self {
        Self {
            start,
            end,
            state: ParserState::Ready,
            value: 0,
            negative: false,
            started: false,
            digits: 0,
            received: None,
        }
    }

    fn push_digit(&mut self, digit: i32) {
        // Accumulate towards the sign so that i32::MIN is representable.
        let next = if self.negative {
            self.value.checked_mul(10).and_then(|v| v.checked_sub(digit))
        } else {
            self.value.checked_mul(10).and_then(|v| v.checked_add(digit))
        };
        self.value = match next {
            Some(value) => value,
            None => {
                warn!("payload overflows i32, value will wrap");
                let scaled = self.value.wrapping_mul(10);
                if self.negative {
                    scaled.wrapping_sub(digit)
                } else {
                    scaled.wrapping_add(digit)
                }
            }
        };
        self.digits += 1;
    }
}

impl ValueParser for IntegerParser {
    type Value = Option<i32>;

    fn on_char(&mut self, byte: u8) -> bool {
        if byte == self.end {
            self.received = if self.digits > 0 {
                Some(self.value)
            } else {
                None
            };
            self.state = ParserState::Parsed;
            return false;
        }

        self.state = ParserState::Parsing;
        match byte {
            b'-' if !self.started => {
                self.negative = true;
            }
            b'0'..=b'9' => self.push_digit(i32::from(byte - b'0')),
            b if b.is_ascii_control() => return true,
            b'-' => warn!("ignoring '-' after the start of an integer field"),
            _ => warn!("ignoring unexpected byte {} in integer field", byte),
        }
        self.started = true;
        true
    }

    fn reset(&mut self) {
        self.value = 0;
        self.negative = false;
        self.started = false;
        self.digits = 0;
        self.state = ParserState::Ready;
    }

    #[inline]
    fn state(&self) -> ParserState {
        self.state
    }

    #[inline]
    fn received(&self) -> &Option<i32> {
        &self.received
    }

    #[inline]
    fn start_delimiter(&self) -> u8 {
        self.start
    }

    #[inline]
    fn end_delimiter(&self) -> u8 {
        self.end
    }
}
