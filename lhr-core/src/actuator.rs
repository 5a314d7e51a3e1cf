//! Capabilities a linear actuator axis drives.
//!
//! The axis never touches hardware directly. It commands a [`Motor`], reads
//! position through an [`Actuator`], and closes the loop through a
//! [`PidController`]. Reference implementations live in [`crate::pid`] and
//! [`crate::smoothing`].

use core::fmt;

use crate::time::Instant;

/// Largest motor duty magnitude.
pub const MAX_DUTY: i32 = 255;

/// Clamp a requested duty into `-MAX_DUTY..=MAX_DUTY`.
#[inline]
pub fn clamp_duty(duty: i32) -> i32 {
    duty.clamp(-MAX_DUTY, MAX_DUTY)
}

/// Rejected limit write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitError {
    /// A lower bound would exceed its upper bound.
    Inverted,
    /// A brake threshold would fall outside the output range.
    BrakeOutsideOutput,
    /// The brake band would not contain zero.
    BrakeExcludesZero,
}

impl fmt::Display for LimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inverted => write!(f, "lower limit above upper limit"),
            Self::BrakeOutsideOutput => write!(f, "brake threshold outside output range"),
            Self::BrakeExcludesZero => write!(f, "brake band does not contain zero"),
        }
    }
}

/// Allowed range of controller input (position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InputLimits {
    pub min: i32,
    pub max: i32,
}

impl InputLimits {
    pub fn validate(&self) -> Result<(), LimitError> {
        if self.min > self.max {
            return Err(LimitError::Inverted);
        }
        Ok(())
    }
}

/// Controller output range and the brake band nested inside it.
///
/// Outputs strictly between `brake_lower` and `brake_upper` are too weak to
/// move the actuator, so the controller brakes instead.
/// Valid limits satisfy `min <= brake_lower <= 0 <= brake_upper <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputLimits {
    pub min: i32,
    pub brake_lower: i32,
    pub brake_upper: i32,
    pub max: i32,
}

impl OutputLimits {
    pub fn validate(&self) -> Result<(), LimitError> {
        if self.min > self.max {
            return Err(LimitError::Inverted);
        }
        if self.brake_lower > 0 || self.brake_upper < 0 {
            return Err(LimitError::BrakeExcludesZero);
        }
        if self.brake_lower < self.min || self.brake_upper > self.max {
            return Err(LimitError::BrakeOutsideOutput);
        }
        Ok(())
    }
}

/// A bidirectional DC motor driven by signed duty.
pub trait Motor {
    /// Drive at `duty` in `-255..=255`; zero brakes.
    fn run(&mut self, duty: i32);

    /// The duty last commanded, after any polarity swap is undone.
    fn speed(&self) -> i32;

    /// Invert the motor's sense of forwards.
    fn swap_directions(&mut self);

    fn directions_swapped(&self) -> bool;
}

/// Source of raw position readings.
pub trait PositionSensor {
    fn read(&mut self) -> i32;
}

/// A feedback controller producing motor duty from position error.
///
/// Gains are fixed point, scaled by 100.
pub trait PidController {
    fn kp(&self) -> i32;
    fn set_kp(&mut self, kp: i32);
    fn kd(&self) -> i32;
    fn set_kd(&mut self, kd: i32);
    fn ki(&self) -> i32;
    fn set_ki(&mut self, ki: i32);

    /// Milliseconds between controller evaluations.
    fn sample_interval(&self) -> u32;
    fn set_sample_interval(&mut self, interval_ms: u32) -> Result<(), LimitError>;

    fn setpoint(&self) -> i32;
    fn set_setpoint(&mut self, setpoint: i32, now: Instant);

    fn input_limits(&self) -> InputLimits;
    /// Replace the input limits, pulling the setpoint into the new range.
    fn set_input_limits(&mut self, limits: InputLimits, now: Instant) -> Result<(), LimitError>;

    fn output_limits(&self) -> OutputLimits;
    fn set_output_limits(&mut self, limits: OutputLimits) -> Result<(), LimitError>;

    /// Latest computed duty.
    fn output(&self) -> i32;

    /// Whether the setpoint has held for `duration_ms`.
    fn setpoint_settled(&self, now: Instant, duration_ms: u32) -> bool;

    /// Whether the output has held at `value` for `duration_ms`.
    fn output_settled_at(&self, value: i32, now: Instant, duration_ms: u32) -> bool;
}

/// Motor, position sensor and controller bundled as one controllable axis.
pub trait Actuator {
    type Motor: Motor;
    type Controller: PidController;

    /// Sample position and, unless frozen, run the controller and drive the
    /// motor with its output.
    fn update(&mut self, now: Instant);

    /// Stop the controller from driving the motor.
    fn freeze(&mut self);

    /// Hand the motor back to the controller.
    fn unfreeze(&mut self, now: Instant);

    fn frozen(&self) -> bool;

    /// Latest position sample.
    fn position(&self) -> i32;

    fn motor(&self) -> &Self::Motor;
    fn motor_mut(&mut self) -> &mut Self::Motor;
    fn controller(&self) -> &Self::Controller;
    fn controller_mut(&mut self) -> &mut Self::Controller;
}

/// Noise filter over a position signal with settle-time queries.
pub trait Smoother {
    fn update(&mut self, raw: i32, now: Instant);

    /// Current smoothed value.
    fn value(&self) -> i32;

    /// Whether the smoothed value has held for `duration_ms`.
    fn settled(&self, now: Instant, duration_ms: u32) -> bool;

    /// Snap multiplier in thousandths.
    fn snap_multiplier(&self) -> i32;
    fn set_snap_multiplier(&mut self, multiplier: i32) -> Result<(), LimitError>;

    /// Output range `(low, high)`.
    fn range(&self) -> (i32, i32);
    fn set_range(&mut self, low: i32, high: i32) -> Result<(), LimitError>;

    /// Change needed to wake from sleep; zero disables sleeping.
    fn activity_threshold(&self) -> i32;
    fn set_activity_threshold(&mut self, threshold: i32) -> Result<(), LimitError>;
}
