//! Platform-agnostic control logic for the liquid-handling robot.
//!
//! Everything here runs on a cooperative tick loop: the [`Controller`] parses
//! at most one message per tick and hands it to every [`Module`] in a fixed
//! order. Modules answer their own channels and never block.
//!
//! - **Core**: [`CoreProtocol`] answers reset, version and echo
//! - **Board**: [`BoardProtocol`] exposes pin reads and the LED
//! - **Axes**: [`LinearActuatorAxis`] drives one motor under duty or
//!   position-feedback control with automatic stop conditions
//! - **Notifiers**: [`Notifier`] streams a signal on a host-configured schedule
//!
//! Hardware sits behind the [`Motor`], [`PositionSensor`] and [`Board`]
//! traits, so the whole crate runs on the host under test. [`HBridgeMotor`]
//! implements [`Motor`] over any `embedded-hal` PWM pair.
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Log through defmt instead of the `log` facade

#![cfg_attr(not(feature = "std"), no_std)]

#[macro_use]
mod macros;

pub mod actuator;
pub mod axis;
pub mod board;
pub mod config;
pub mod core_protocol;
pub mod dispatch;
pub mod handshake;
pub mod hbridge;
pub mod messager;
pub mod notifier;
pub mod pid;
pub mod scheduler;
pub mod smoothing;
pub mod time;

pub use actuator::{
    clamp_duty, Actuator, InputLimits, LimitError, Motor, OutputLimits, PidController,
    PositionSensor, Smoother, MAX_DUTY,
};
pub use axis::{ControlMode, LinearActuatorAxis};
pub use board::{Board, BoardProtocol};
pub use config::AxisConfig;
pub use core_protocol::{CoreProtocol, Version};
pub use dispatch::{dispatch, parameter, Request, Route};
pub use handshake::{establish_connection, HandshakeConfig};
pub use hbridge::HBridgeMotor;
pub use messager::Messager;
pub use notifier::{Notifier, NotifierConfig, NotifierMode};
pub use pid::{Pid, PidActuator, PidConfig};
pub use scheduler::{Controller, Module};
pub use smoothing::{ResponsiveSmoother, SmootherConfig};
pub use time::{Instant, Settling};

pub use lhr_proto;
