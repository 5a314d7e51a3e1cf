//! Controller: runs every protocol module once per tick.

use embedded_hal::delay::DelayNs;
use lhr_proto::Transport;

use crate::handshake::{establish_connection, HandshakeConfig};
use crate::messager::Messager;
use crate::time::Instant;

/// A protocol handler driven by the tick loop.
///
/// `update` must not block. The message received this tick, if any, is
/// available through [`Messager::received`].
pub trait Module<T> {
    fn update(&mut self, messager: &mut Messager<T>, now: Instant);
}

/// Owns the messager and lends it to each module in a fixed order.
///
/// Each tick parses at most one message and then updates every module, so
/// all modules observe the same message and run in a deterministic order.
pub struct Controller<T> {
    messager: Messager<T>,
}

impl<T: Transport> Controller<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            messager: Messager::new(transport),
        }
    }

    /// Block until the host completes the connection handshake.
    pub fn connect<D: DelayNs>(&mut self, delay: &mut D, config: &HandshakeConfig) {
        establish_connection(self.messager.transport_mut(), delay, config);
    }

    /// Run one tick: parse input, then update `modules` in order.
    pub fn tick(&mut self, now: Instant, modules: &mut [&mut dyn Module<T>]) {
        self.messager.update();
        if let Some(message) = self.messager.received() {
            trace!("dispatching '{}'", message.channel());
        }
        for module in modules.iter_mut() {
            module.update(&mut self.messager, now);
        }
    }

    pub fn messager(&self) -> &Messager<T> {
        &self.messager
    }

    pub fn messager_mut(&mut self) -> &mut Messager<T> {
        &mut self.messager
    }

    pub fn into_messager(self) -> Messager<T> {
        self.messager
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::messager::mock::MockTransport;
    use std::string::String;
    use std::vec::Vec;

    /// Records the messages it observes and replies to its own letter.
    struct Recorder {
        letter: u8,
        seen: Vec<String>,
    }

    impl Recorder {
        fn new(letter: u8) -> Self {
            Self {
                letter,
                seen: Vec::new(),
            }
        }
    }

    impl Module<MockTransport> for Recorder {
        fn update(&mut self, messager: &mut Messager<MockTransport>, _now: Instant) {
            let Some(message) = messager.received() else {
                return;
            };
            self.seen.push(String::from(message.channel()));
            if message.key(0) == Some(self.letter) {
                messager.send_response(i32::from(self.letter));
            }
        }
    }

    #[test]
    fn test_tick_runs_modules_in_order() {
        let mut controller = Controller::new(MockTransport::default());
        let mut a = Recorder::new(b'a');
        let mut b = Recorder::new(b'b');
        controller.messager_mut().transport_mut().push("<b>\n<a>\n");

        controller.tick(Instant::from_millis(0), &mut [&mut a, &mut b]);
        controller.tick(Instant::from_millis(1), &mut [&mut a, &mut b]);
        controller.tick(Instant::from_millis(2), &mut [&mut a, &mut b]);

        // Every module sees each message exactly once.
        assert_eq!(a.seen, ["b", "a"]);
        assert_eq!(b.seen, ["b", "a"]);
        assert_eq!(
            controller.messager_mut().transport_mut().take_lines(),
            ["<b>(98)", "<a>(97)"]
        );
    }
}
