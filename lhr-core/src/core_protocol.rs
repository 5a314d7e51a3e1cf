//! Core channels: reset, version and echo.

use lhr_proto::Transport;

use crate::dispatch::{dispatch, Request, Route};
use crate::messager::Messager;
use crate::scheduler::Module;
use crate::time::Instant;

const RESET: u8 = b'r';
const VERSION: u8 = b'v';
const ECHO: u8 = b'e';

/// Firmware version reported on `v0`, `v1` and `v2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl Version {
    /// Protocol revision implemented by this crate.
    pub const PROTOCOL: Self = Self {
        major: 1,
        minor: 1,
        patch: 0,
    };

    const fn component(&self, position: u8) -> Option<i32> {
        match position {
            b'0' => Some(self.major),
            b'1' => Some(self.minor),
            b'2' => Some(self.patch),
            _ => None,
        }
    }
}

/// Handler for the `r`, `v` and `e` channels.
///
/// A confirmed reset (`<r>(1)`) is only recorded here; the owner of the
/// hardware checks [`CoreProtocol::reset_requested`] after the tick, once the
/// reply has been sent.
pub struct CoreProtocol {
    version: Version,
    echo: i32,
    reset_requested: bool,
}

impl CoreProtocol {
    pub const fn new(version: Version) -> Self {
        Self {
            version,
            echo: 0,
            reset_requested: false,
        }
    }

    /// Whether the host has asked for a hard reset.
    pub fn reset_requested(&self) -> bool {
        self.reset_requested
    }

    /// Announce every version component.
    pub fn send_version<T: Transport>(&self, messager: &mut Messager<T>) {
        for position in [b'0', b'1', b'2'] {
            if let Some(value) = self.version.component(position) {
                let channel = [VERSION, position];
                // Both bytes are ASCII.
                if let Ok(channel) = core::str::from_utf8(&channel) {
                    messager.send_message(channel, value);
                }
            }
        }
    }

    fn on_reset<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if !request.is_leaf() {
            return;
        }
        if request.payload() == Some(1) {
            messager.send_response(1);
            warn!("hard reset requested by host");
            self.reset_requested = true;
        } else {
            messager.send_response(0);
        }
    }

    fn on_version<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        match request.key() {
            None => self.send_version(messager),
            Some(position) => {
                if !request.descend().is_leaf() {
                    return;
                }
                if let Some(value) = self.version.component(position) {
                    messager.send_response(value);
                }
            }
        }
    }

    fn on_echo<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if !request.is_leaf() {
            return;
        }
        if let Some(value) = request.payload() {
            self.echo = value;
        }
        messager.send_response(self.echo);
    }
}

impl Default for CoreProtocol {
    fn default() -> Self {
        Self::new(Version::PROTOCOL)
    }
}

impl<T: Transport> Module<T> for CoreProtocol {
    fn update(&mut self, messager: &mut Messager<T>, _now: Instant) {
        let Some(request) = messager.received().map(|m| Request::new(m.clone())) else {
            return;
        };
        let routes: [Route<Self, T>; 3] = [
            (RESET, Self::on_reset),
            (VERSION, Self::on_version),
            (ECHO, Self::on_echo),
        ];
        dispatch(&routes, self, messager, &request);
    }
}
