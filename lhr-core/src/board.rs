//! Board channels: pin reads and the built-in LED.
//!
//! ```text
//! <iaN>            analog read of pin N
//! <idN>            digital read of pin N
//! <l>(0|1)         LED off/on, stops blinking
//! <lb>(0|1)        stop/start blinking
//! <lbh> <lbl>      high/low phase in milliseconds
//! <lbp>            periods left, -1 blinks forever, 0 stops
//! <lbn>(0|1)       announce every LED transition on <l>
//! ```

use lhr_proto::Transport;

use crate::dispatch::{dispatch, parameter, Request, Route};
use crate::messager::Messager;
use crate::scheduler::Module;
use crate::time::Instant;

const IO: u8 = b'i';
const ANALOG: u8 = b'a';
const DIGITAL: u8 = b'd';
const LED: u8 = b'l';
const BLINK: u8 = b'b';
const BLINK_HIGH: u8 = b'h';
const BLINK_LOW: u8 = b'l';
const BLINK_PERIODS: u8 = b'p';
const BLINK_NOTIFY: u8 = b'n';

/// Board I/O reachable from the host.
pub trait Board {
    /// Read analog `pin`, or `None` if the board does not expose it.
    fn analog_read(&mut self, pin: u8) -> Option<i32>;

    /// Read digital `pin`, or `None` if the board does not expose it.
    fn digital_read(&mut self, pin: u8) -> Option<bool>;

    fn set_led(&mut self, on: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Blink {
    enabled: bool,
    high_ms: u32,
    low_ms: u32,
    periods: i32,
    notify: bool,
    phase_since: Instant,
}

/// Handler for the `i` and `l` channels.
pub struct BoardProtocol<B> {
    board: B,
    led_on: bool,
    blink: Blink,
    now: Instant,
}

impl<B: Board> BoardProtocol<B> {
    pub fn new(mut board: B) -> Self {
        board.set_led(false);
        Self {
            board,
            led_on: false,
            blink: Blink {
                enabled: false,
                high_ms: 500,
                low_ms: 500,
                periods: -1,
                notify: false,
                phase_since: Instant::default(),
            },
            now: Instant::default(),
        }
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    #[inline]
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    #[inline]
    pub fn blinking(&self) -> bool {
        self.blink.enabled
    }

    fn set_led(&mut self, on: bool) {
        self.led_on = on;
        self.board.set_led(on);
    }

    fn start_blink(&mut self) {
        self.blink.enabled = true;
        self.blink.phase_since = self.now;
        self.set_led(true);
    }

    fn advance_blink<T: Transport>(&mut self, messager: &mut Messager<T>) {
        if !self.blink.enabled {
            return;
        }
        let phase_ms = if self.led_on {
            self.blink.high_ms
        } else {
            self.blink.low_ms
        };
        if self.now.since(self.blink.phase_since) < phase_ms {
            return;
        }
        self.blink.phase_since = self.now;

        // A period ends with its low phase.
        if !self.led_on && self.blink.periods > 0 {
            self.blink.periods -= 1;
            if self.blink.periods == 0 {
                self.blink.enabled = false;
                messager.send_message("lbp", 0);
                messager.send_message("lb", 0);
                return;
            }
        }

        self.set_led(!self.led_on);
        if self.blink.notify {
            messager.send_message("l", i32::from(self.led_on));
        }
    }

    fn on_io<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        let Some(kind) = request.key() else {
            return;
        };
        let Ok(pin) = request.descend().rest().parse::<u8>() else {
            return;
        };
        let value = match kind {
            ANALOG => self.board.analog_read(pin),
            DIGITAL => self.board.digital_read(pin).map(i32::from),
            _ => None,
        };
        if let Some(value) = value {
            messager.send_response(value);
        }
    }

    fn on_led<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if request.is_leaf() {
            match request.payload() {
                Some(state @ (0 | 1)) => {
                    self.blink.enabled = false;
                    self.set_led(state == 1);
                }
                Some(other) => debug!("rejected LED state {}", other),
                None => {}
            }
            messager.send_response(i32::from(self.led_on));
            return;
        }
        let routes: [Route<Self, T>; 1] = [(BLINK, Self::on_blink)];
        dispatch(&routes, self, messager, request);
    }

    fn on_blink<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if request.is_leaf() {
            match request.payload() {
                Some(1) if self.blink.periods == 0 => debug!("no blink periods left"),
                Some(1) if !self.blink.enabled => self.start_blink(),
                Some(0) => self.blink.enabled = false,
                Some(1) | None => {}
                Some(other) => debug!("rejected blink state {}", other),
            }
            messager.send_response(i32::from(self.blink.enabled));
            return;
        }
        let routes: [Route<Self, T>; 4] = [
            (BLINK_HIGH, |board, messager, request| {
                parameter(
                    board,
                    messager,
                    request,
                    |b| b.blink.high_ms as i32,
                    |b, v| set_phase(&mut b.blink.high_ms, v),
                );
            }),
            (BLINK_LOW, |board, messager, request| {
                parameter(
                    board,
                    messager,
                    request,
                    |b| b.blink.low_ms as i32,
                    |b, v| set_phase(&mut b.blink.low_ms, v),
                );
            }),
            (BLINK_PERIODS, |board, messager, request| {
                parameter(
                    board,
                    messager,
                    request,
                    |b| b.blink.periods,
                    |b, v| {
                        if v < -1 {
                            return false;
                        }
                        b.blink.periods = v;
                        if v == 0 && b.blink.enabled {
                            b.blink.enabled = false;
                            b.set_led(false);
                        }
                        true
                    },
                );
            }),
            (BLINK_NOTIFY, |board, messager, request| {
                parameter(
                    board,
                    messager,
                    request,
                    |b| i32::from(b.blink.notify),
                    |b, v| match v {
                        0 | 1 => {
                            b.blink.notify = v == 1;
                            true
                        }
                        _ => false,
                    },
                );
            }),
        ];
        dispatch(&routes, self, messager, request);
    }
}

fn set_phase(slot: &mut u32, value: i32) -> bool {
    match u32::try_from(value) {
        Ok(value) if value > 0 => {
            *slot = value;
            true
        }
        _ => false,
    }
}

impl<T: Transport, B: Board> Module<T> for BoardProtocol<B> {
    fn update(&mut self, messager: &mut Messager<T>, now: Instant) {
        self.now = now;
        if let Some(request) = messager.received().map(|m| Request::new(m.clone())) {
            let routes: [Route<Self, T>; 2] = [(IO, Self::on_io), (LED, Self::on_led)];
            dispatch(&routes, self, messager, &request);
        }
        self.advance_blink(messager);
    }
}
