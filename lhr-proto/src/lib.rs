//! Wire protocol for the liquid-handling robot controller.
//!
//! This crate provides the allocation-free message layer shared by every
//! protocol handler on the device:
//!
//! - **Types**: [`Message`], [`Channel`] and the framing delimiters
//! - **Field parsing**: [`ValueParser`] with [`StringParser`] and [`IntegerParser`]
//! - **Message parsing**: [`MessageParser`], a character-driven tokenizer
//! - **Sending**: [`MessageSender`], which writes the same syntax back out
//! - **Transports**: the [`Transport`] contract with [`AsciiTransport`] and
//!   [`SysexTransport`] strategies over any `embedded-io` stream
//!
//! # Protocol Format
//!
//! ```text
//! <channel>(payload)
//! ```
//!
//! - `channel` - 1 to 8 alphanumeric characters. The first character selects
//!   a subsystem or axis, later characters descend into its parameters.
//! - `payload` - optional signed decimal integer. A message without payload
//!   is a query, a message with payload is a command.
//!
//! On the ASCII transport each message is terminated by `\n`. On the sysex
//! transport each message is wrapped as `F0 0F <message> F7`.
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt instead of the `log` facade

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod macros;

pub mod fmt;
pub mod parser;
pub mod sender;
pub mod transport;
pub mod types;
pub mod value_parser;

pub use parser::{MessageParser, MessageState};
pub use sender::MessageSender;
pub use transport::{AsciiTransport, SysexTransport, Transport, TransportError};
pub use types::{Channel, Message, MAX_CHANNEL_LENGTH};
pub use value_parser::{IntegerParser, ParserState, StringParser, ValueParser};

pub use embedded_io;
