//! Shared ADC access for axis feedback and `<ia>` reads.

use core::cell::RefCell;

use defmt::warn;
use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use lhr_core::PositionSensor;

/// ADC channels wired to the header (ADC0-ADC3).
pub const ANALOG_CHANNELS: usize = 4;
/// Largest reading after scaling to 10 bits.
pub const ANALOG_MAX: i32 = 1023;

/// The ADC and its input channels.
pub struct AnalogInputs {
    adc: Adc<'static, Blocking>,
    channels: [Channel<'static>; ANALOG_CHANNELS],
}

impl AnalogInputs {
    pub fn new(adc: Adc<'static, Blocking>, channels: [Channel<'static>; ANALOG_CHANNELS]) -> Self {
        Self { adc, channels }
    }

    /// Sample channel `index`, scaled from 12 to 10 bits.
    pub fn read(&mut self, index: usize) -> Option<i32> {
        let channel = self.channels.get_mut(index)?;
        match self.adc.blocking_read(channel) {
            Ok(raw) => Some(i32::from(raw >> 2)),
            Err(e) => {
                warn!("ADC read on channel {} failed: {:?}", index, e);
                None
            }
        }
    }
}

/// ADC shared between the axis sensors and the board protocol.
pub type SharedAnalog = Mutex<CriticalSectionRawMutex, RefCell<AnalogInputs>>;

/// Potentiometer feedback on one ADC channel.
///
/// A failed conversion repeats the previous reading.
pub struct AdcSensor {
    inputs: &'static SharedAnalog,
    index: usize,
    inverted: bool,
    last: i32,
}

impl AdcSensor {
    pub fn new(inputs: &'static SharedAnalog, index: usize, inverted: bool) -> Self {
        Self {
            inputs,
            index,
            inverted,
            last: 0,
        }
    }
}

impl PositionSensor for AdcSensor {
    fn read(&mut self) -> i32 {
        let index = self.index;
        if let Some(raw) = self.inputs.lock(|inputs| inputs.borrow_mut().read(index)) {
            self.last = if self.inverted { ANALOG_MAX - raw } else { raw };
        }
        self.last
    }
}
