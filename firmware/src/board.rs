//! Pin reads and the on-board LED.

use defmt::warn;
use embassy_rp::gpio::{Input, Output};
use embedded_hal::digital::{InputPin, OutputPin};
use lhr_core::Board;

use crate::analog::SharedAnalog;

/// First GPIO exposed for `<id>` reads.
pub const DIGITAL_FIRST_PIN: u8 = 12;
/// Number of consecutive GPIOs exposed for `<id>` reads.
pub const DIGITAL_PINS: usize = 11;

/// Board I/O over any `embedded-hal` input pins and LED output.
pub struct PicoBoard<I = Input<'static>, L = Output<'static>> {
    analog: &'static SharedAnalog,
    digital: [I; DIGITAL_PINS],
    led: L,
}

impl<I: InputPin, L: OutputPin> PicoBoard<I, L> {
    pub fn new(analog: &'static SharedAnalog, digital: [I; DIGITAL_PINS], led: L) -> Self {
        Self {
            analog,
            digital,
            led,
        }
    }
}

impl<I: InputPin, L: OutputPin> Board for PicoBoard<I, L> {
    fn analog_read(&mut self, pin: u8) -> Option<i32> {
        self.analog
            .lock(|inputs| inputs.borrow_mut().read(usize::from(pin)))
    }

    fn digital_read(&mut self, pin: u8) -> Option<bool> {
        let index = pin.checked_sub(DIGITAL_FIRST_PIN)?;
        let input = self.digital.get_mut(usize::from(index))?;
        match input.is_high() {
            Ok(high) => Some(high),
            Err(_) => {
                warn!("digital read of pin {} failed", pin);
                None
            }
        }
    }

    fn set_led(&mut self, on: bool) {
        let result = if on {
            self.led.set_high()
        } else {
            self.led.set_low()
        };
        if result.is_err() {
            warn!("failed to drive the LED");
        }
    }
}
