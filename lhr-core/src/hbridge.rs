//! Two-input H-bridge motor driver over PWM channels.
//!
//! Each bridge input takes its own PWM channel (DRV8833/DRV8873 style):
//!
//! | duty | IN1 | IN2 |
//! |------|-----|-----|
//! | > 0  | PWM | off |
//! | < 0  | off | PWM |
//! | 0    | on  | on  |
//!
//! Both inputs held high short the motor terminals, so zero duty brakes.

use embedded_hal::pwm::SetDutyCycle;

use crate::actuator::{clamp_duty, Motor, MAX_DUTY};

/// DC motor on two PWM-driven bridge inputs.
pub struct HBridgeMotor<A, B> {
    in1: A,
    in2: B,
    duty: i32,
    swapped: bool,
}

impl<A: SetDutyCycle, B: SetDutyCycle> HBridgeMotor<A, B> {
    /// Wrap the bridge inputs. The motor starts braked.
    pub fn new(in1: A, in2: B) -> Self {
        let mut motor = Self {
            in1,
            in2,
            duty: 0,
            swapped: false,
        };
        motor.apply();
        motor
    }

    pub fn release(self) -> (A, B) {
        (self.in1, self.in2)
    }

    fn apply(&mut self) {
        let duty = if self.swapped { -self.duty } else { self.duty };
        // |duty| <= MAX_DUTY, so the fraction always fits in u16.
        let magnitude = duty.unsigned_abs() as u16;
        let denominator = MAX_DUTY as u16;
        let result = match duty {
            0 => self
                .in1
                .set_duty_cycle_fully_on()
                .map_err(|_| ())
                .and(self.in2.set_duty_cycle_fully_on().map_err(|_| ())),
            d if d > 0 => self
                .in2
                .set_duty_cycle_fully_off()
                .map_err(|_| ())
                .and(
                    self.in1
                        .set_duty_cycle_fraction(magnitude, denominator)
                        .map_err(|_| ()),
                ),
            _ => self
                .in1
                .set_duty_cycle_fully_off()
                .map_err(|_| ())
                .and(
                    self.in2
                        .set_duty_cycle_fraction(magnitude, denominator)
                        .map_err(|_| ()),
                ),
        };
        if result.is_err() {
            error!("failed to update bridge duty {}", duty);
        }
    }
}

impl<A: SetDutyCycle, B: SetDutyCycle> Motor for HBridgeMotor<A, B> {
    fn run(&mut self, duty: i32) {
        self.duty = clamp_duty(duty);
        self.apply();
    }

    fn speed(&self) -> i32 {
        self.duty
    }

    fn swap_directions(&mut self) {
        self.swapped = !self.swapped;
        self.apply();
    }

    fn directions_swapped(&self) -> bool {
        self.swapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::pwm::ErrorType;

    /// PWM channel remembering its duty out of 255.
    #[derive(Default)]
    struct FakePwm {
        duty: u16,
    }

    impl ErrorType for FakePwm {
        type Error = Infallible;
    }

    impl SetDutyCycle for FakePwm {
        fn max_duty_cycle(&self) -> u16 {
            255
        }

        fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
            self.duty = duty;
            Ok(())
        }
    }

    fn pins(motor: &HBridgeMotor<FakePwm, FakePwm>) -> (u16, u16) {
        (motor.in1.duty, motor.in2.duty)
    }

    #[test]
    fn test_starts_braked() {
        let motor = HBridgeMotor::new(FakePwm::default(), FakePwm::default());
        assert_eq!(pins(&motor), (255, 255));
        assert_eq!(motor.speed(), 0);
    }

    #[test]
    fn test_direction_selects_input() {
        let mut motor = HBridgeMotor::new(FakePwm::default(), FakePwm::default());
        motor.run(120);
        assert_eq!(pins(&motor), (120, 0));
        motor.run(-80);
        assert_eq!(pins(&motor), (0, 80));
        motor.run(0);
        assert_eq!(pins(&motor), (255, 255));
    }

    #[test]
    fn test_duty_clamped() {
        let mut motor = HBridgeMotor::new(FakePwm::default(), FakePwm::default());
        motor.run(1000);
        assert_eq!(motor.speed(), 255);
        assert_eq!(pins(&motor), (255, 0));
    }

    #[test]
    fn test_swapped_polarity_reverses_inputs() {
        let mut motor = HBridgeMotor::new(FakePwm::default(), FakePwm::default());
        motor.run(60);
        motor.swap_directions();
        assert!(motor.directions_swapped());
        assert_eq!(motor.speed(), 60);
        assert_eq!(pins(&motor), (0, 60));
    }
}
