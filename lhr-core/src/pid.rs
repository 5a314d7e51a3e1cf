//! Integer PID controller and the actuator built around it.
//!
//! Works in `no_std` without floating point. Gains are fixed point scaled by
//! 100 and expressed per second of sample time.

use crate::actuator::{
    Actuator, InputLimits, LimitError, Motor, OutputLimits, PidController, PositionSensor,
};
use crate::time::{Instant, Settling};

const GAIN_SCALE: i64 = 100;

/// Tuning used to build a [`Pid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidConfig {
    pub kp: i32,
    pub kd: i32,
    pub ki: i32,
    pub sample_interval_ms: u32,
    pub input: InputLimits,
    pub output: OutputLimits,
}

/// PID controller with output clamping and a brake band.
///
/// The derivative acts on the measurement rather than the error so setpoint
/// steps do not kick the output.
pub struct Pid {
    kp: i32,
    kd: i32,
    ki: i32,
    sample_interval_ms: u32,
    input: InputLimits,
    output_limits: OutputLimits,

    setpoint: Settling<i32>,
    output: Settling<i32>,

    /// Integrator state, scaled by `GAIN_SCALE`.
    integral: i64,
    prev_input: Option<i32>,
    last_sample: Option<Instant>,
}

impl Pid {
    /// Create a controller. Limits that violate their ordering are replaced
    /// by a symmetric full-duty range without brake band.
    pub fn new(config: PidConfig) -> Self {
        let input = if config.input.validate().is_ok() {
            config.input
        } else {
            warn!("invalid controller input limits, using full range");
            InputLimits {
                min: i32::MIN,
                max: i32::MAX,
            }
        };
        let output_limits = if config.output.validate().is_ok() {
            config.output
        } else {
            warn!("invalid controller output limits, using full duty range");
            OutputLimits {
                min: -crate::actuator::MAX_DUTY,
                brake_lower: 0,
                brake_upper: 0,
                max: crate::actuator::MAX_DUTY,
            }
        };
        Self {
            kp: config.kp,
            kd: config.kd,
            ki: config.ki,
            sample_interval_ms: config.sample_interval_ms.max(1),
            input,
            output_limits,
            setpoint: Settling::new(input.min.max(0).min(input.max), Instant::default()),
            output: Settling::new(0, Instant::default()),
            integral: 0,
            prev_input: None,
            last_sample: None,
        }
    }

    /// Clear integrator and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0;
        self.prev_input = None;
        self.last_sample = None;
    }

    /// Run one controller step if a sample interval has passed. Returns the
    /// new output when one was computed.
    pub fn compute(&mut self, input: i32, now: Instant) -> Option<i32> {
        let dt_ms = match self.last_sample {
            Some(last) => {
                let dt = now.since(last);
                if dt < self.sample_interval_ms {
                    return None;
                }
                dt
            }
            None => self.sample_interval_ms,
        };
        self.last_sample = Some(now);

        let input = input.clamp(self.input.min, self.input.max);
        let error = i64::from(self.setpoint.get()) - i64::from(input);
        let dt = i64::from(dt_ms);

        // Every product saturates; gains are set over the wire.
        let p = i64::from(self.kp).saturating_mul(error);

        let limit_lo = i64::from(self.output_limits.min) * GAIN_SCALE;
        let limit_hi = i64::from(self.output_limits.max) * GAIN_SCALE;
        let step = i64::from(self.ki).saturating_mul(error).saturating_mul(dt) / 1000;
        self.integral = self.integral.saturating_add(step).clamp(limit_lo, limit_hi);

        let d = match self.prev_input {
            Some(prev) => {
                let delta = i64::from(input) - i64::from(prev);
                i64::from(self.kd).saturating_neg().saturating_mul(delta).saturating_mul(1000) / dt
            }
            None => 0,
        };
        self.prev_input = Some(input);

        let raw = (p.saturating_add(self.integral).saturating_add(d) / GAIN_SCALE)
            .clamp(i64::from(self.output_limits.min), i64::from(self.output_limits.max));
        // Clamped into an i32 range above.
        let mut out = raw as i32;
        if out > self.output_limits.brake_lower && out < self.output_limits.brake_upper {
            out = 0;
        }

        self.output.update(out, now);
        Some(out)
    }
}

impl PidController for Pid {
    fn kp(&self) -> i32 {
        self.kp
    }

    fn set_kp(&mut self, kp: i32) {
        self.kp = kp;
    }

    fn kd(&self) -> i32 {
        self.kd
    }

    fn set_kd(&mut self, kd: i32) {
        self.kd = kd;
    }

    fn ki(&self) -> i32 {
        self.ki
    }

    fn set_ki(&mut self, ki: i32) {
        self.ki = ki;
        self.integral = 0;
    }

    fn sample_interval(&self) -> u32 {
        self.sample_interval_ms
    }

    fn set_sample_interval(&mut self, interval_ms: u32) -> Result<(), LimitError> {
        if interval_ms == 0 {
            return Err(LimitError::Inverted);
        }
        self.sample_interval_ms = interval_ms;
        Ok(())
    }

    fn setpoint(&self) -> i32 {
        self.setpoint.get()
    }

    fn set_setpoint(&mut self, setpoint: i32, now: Instant) {
        let clamped = setpoint.clamp(self.input.min, self.input.max);
        if clamped != setpoint {
            debug!("setpoint {} clamped to {}", setpoint, clamped);
        }
        self.setpoint.update(clamped, now);
    }

    fn input_limits(&self) -> InputLimits {
        self.input
    }

    fn set_input_limits(&mut self, limits: InputLimits, now: Instant) -> Result<(), LimitError> {
        limits.validate()?;
        self.input = limits;
        let setpoint = self.setpoint.get();
        let clamped = setpoint.clamp(limits.min, limits.max);
        if clamped != setpoint {
            debug!("setpoint {} clamped to {}", setpoint, clamped);
            self.setpoint.update(clamped, now);
        }
        Ok(())
    }

    fn output_limits(&self) -> OutputLimits {
        self.output_limits
    }

    fn set_output_limits(&mut self, limits: OutputLimits) -> Result<(), LimitError> {
        limits.validate()?;
        self.output_limits = limits;
        Ok(())
    }

    fn output(&self) -> i32 {
        self.output.get()
    }

    fn setpoint_settled(&self, now: Instant, duration_ms: u32) -> bool {
        self.setpoint.settled(now, duration_ms)
    }

    fn output_settled_at(&self, value: i32, now: Instant, duration_ms: u32) -> bool {
        self.output.settled_at(value, now, duration_ms)
    }
}

/// A motor and position sensor closed into a loop by a [`Pid`].
pub struct PidActuator<M, S> {
    motor: M,
    sensor: S,
    pid: Pid,
    position: i32,
    frozen: bool,
}

impl<M: Motor, S: PositionSensor> PidActuator<M, S> {
    /// The actuator starts frozen; the motor is only driven by the
    /// controller once [`Actuator::unfreeze`] is called.
    pub fn new(motor: M, sensor: S, pid: Pid) -> Self {
        Self {
            motor,
            sensor,
            pid,
            position: 0,
            frozen: true,
        }
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}

impl<M: Motor, S: PositionSensor> Actuator for PidActuator<M, S> {
    type Motor = M;
    type Controller = Pid;

    fn update(&mut self, now: Instant) {
        self.position = self.sensor.read();
        if self.frozen {
            return;
        }
        if let Some(duty) = self.pid.compute(self.position, now) {
            self.motor.run(duty);
        }
    }

    fn freeze(&mut self) {
        self.frozen = true;
    }

    fn unfreeze(&mut self, _now: Instant) {
        if self.frozen {
            self.pid.reset();
            self.frozen = false;
        }
    }

    fn frozen(&self) -> bool {
        self.frozen
    }

    fn position(&self) -> i32 {
        self.position
    }

    fn motor(&self) -> &M {
        &self.motor
    }

    fn motor_mut(&mut self) -> &mut M {
        &mut self.motor
    }

    fn controller(&self) -> &Pid {
        &self.pid
    }

    fn controller_mut(&mut self) -> &mut Pid {
        &mut self.pid
    }
}
