//! Liquid-handling robot controller firmware for RP2040.
//!
//! This crate binds the platform-agnostic control logic in [`lhr_core`] to
//! the peripherals of an RP2040 controller board.
//!
//! # Overview
//!
//! The firmware runs on an RP2040 and:
//! 1. Waits for the host to answer the connection handshake over UART
//! 2. Runs a 1 ms control tick: parse at most one message, then update the
//!    core protocol, the board protocol and every axis in a fixed order
//! 3. Drives four linear actuators (`p`, `z`, `y`, `x`) from potentiometer
//!    feedback
//!
//! # Hardware Configuration
//!
//! | Function          | GPIO    | Description |
//! |-------------------|---------|-------------|
//! | UART1 TX          | 8       | Serial transmit to host |
//! | UART1 RX          | 9       | Serial receive from host |
//! | `p` bridge IN1/2  | 2, 3    | PWM slice 1 |
//! | `z` bridge IN1/2  | 4, 5    | PWM slice 2 |
//! | `y` bridge IN1/2  | 6, 7    | PWM slice 3 |
//! | `x` bridge IN1/2  | 10, 11  | PWM slice 5 |
//! | Digital inputs    | 12-22   | Read as `<id12>` to `<id22>` |
//! | ADC0-ADC3         | 26-29   | Axis feedback, read as `<ia0>` to `<ia3>` |
//! | LED               | 25      | On-board LED |
//!
//! The board must break out all four ADC inputs. A stock Raspberry Pi Pico
//! does not: its GPIO29 is tied to a VSYS/3 divider and is not on the header,
//! so the `x` potentiometer on ADC3 would read supply voltage. Use a carrier
//! built around a bare RP2040, or an RP2040 module that routes GPIO29 to a
//! pin without the divider.
//!
//! # Architecture
//!
//! Two UART pump tasks run on a higher-priority interrupt executor and move
//! bytes between the UART and a pair of [`Pipe`](embassy_sync::pipe::Pipe)
//! buffers. The control loop sees those buffers through [`PipeStream`], a
//! non-blocking `embedded-io` stream, so the blocking handshake and the
//! synchronous tick never stall serial traffic.
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)
//! - **`transport-ascii`** (default): Plain text messages, one per line
//! - **`transport-sysex`**: Messages wrapped in MIDI sysex frames

#![no_std]

#[cfg(all(feature = "transport-ascii", feature = "transport-sysex"))]
compile_error!("Cannot enable both `transport-ascii` and `transport-sysex` features - the host link carries one framing");

#[cfg(not(any(feature = "transport-ascii", feature = "transport-sysex")))]
compile_error!("Enable one of the `transport-ascii` or `transport-sysex` features");

#[cfg(all(feature = "dev-panic", feature = "prod-panic"))]
compile_error!("Cannot enable both `dev-panic` and `prod-panic` features");

pub mod analog;
pub mod axes;
pub mod board;
pub mod serial;

pub use analog::{AdcSensor, AnalogInputs, SharedAnalog};
pub use axes::AxisTuning;
pub use board::PicoBoard;
pub use serial::{PipeStream, RxPipe, TxPipe};

/// Transport selected at build time.
#[cfg(feature = "transport-ascii")]
pub type HostTransport = lhr_proto::AsciiTransport<PipeStream>;

/// Transport selected at build time.
#[cfg(feature = "transport-sysex")]
pub type HostTransport = lhr_proto::SysexTransport<PipeStream>;
