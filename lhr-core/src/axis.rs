//! Linear actuator axis: the per-axis control state machine.
//!
//! An axis owns one [`Actuator`], a [`Smoother`] over its position and three
//! notifiers. It answers every message whose channel starts with its letter:
//!
//! ```text
//! <a>              control mode
//! <ap>             position            <apn...>  position notifier
//! <as>             smoothed position   <asn...>  smoothed position notifier
//!   <ass> <asl> <ash> <ast>            snap multiplier, range low/high, activity threshold
//! <am>(duty)       direct duty control <amn...>  duty notifier
//!   <ams> <amt> <amp>                  stall timeout, timer timeout, polarity
//! <af>(setpoint)   position feedback control
//!   <afc>                              convergence timeout
//!   <aflpl> <aflph>                    position limits low/high
//!   <aflmfh> <aflmfl>                  max output, upper brake threshold
//!   <aflmbh> <aflmbl>                  lower brake threshold, min output
//!   <afpp> <afpd> <afpi> <afps>        Kp, Kd, Ki (x100), sample interval
//! ```
//!
//! Parameter writes that would break an ordering invariant are rejected; the
//! unchanged value is still sent back.
//!
//! An axis can also home itself at connect time: [`LinearActuatorAxis::start_homing`]
//! drives it into its end stop until the stall check stops it, then idles it.

use lhr_proto::{Channel, Transport};

use crate::actuator::{clamp_duty, Actuator, Motor, PidController, Smoother};
use crate::config::AxisConfig;
use crate::dispatch::{dispatch, parameter, Request, Route};
use crate::messager::Messager;
use crate::notifier::Notifier;
use crate::scheduler::Module;
use crate::time::{Instant, Settling};

const POSITION: u8 = b'p';
const SMOOTHED_POSITION: u8 = b's';
const MOTOR: u8 = b'm';
const FEEDBACK: u8 = b'f';

mod smoothed {
    pub const SNAP_MULTIPLIER: u8 = b's';
    pub const RANGE_LOW: u8 = b'l';
    pub const RANGE_HIGH: u8 = b'h';
    pub const ACTIVITY_THRESHOLD: u8 = b't';
}

mod motor {
    pub const STALL_TIMEOUT: u8 = b's';
    pub const TIMER_TIMEOUT: u8 = b't';
    pub const POLARITY: u8 = b'p';
}

mod feedback {
    pub const CONVERGENCE_TIMEOUT: u8 = b'c';
    pub const LIMITS: u8 = b'l';
    pub const PID: u8 = b'p';

    pub const POSITION: u8 = b'p';
    pub const MOTOR: u8 = b'm';
    pub const FORWARDS: u8 = b'f';
    pub const BACKWARDS: u8 = b'b';
    pub const LOW: u8 = b'l';
    pub const HIGH: u8 = b'h';

    pub const KP: u8 = b'p';
    pub const KD: u8 = b'd';
    pub const KI: u8 = b'i';
    pub const SAMPLE_INTERVAL: u8 = b's';
}

/// Control mode of an axis.
///
/// The first three modes are entered by command. The `*Stopped` modes are
/// only entered when the axis stops itself and record why it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlMode {
    #[default]
    DirectMotorDutyIdle,
    DirectMotorDutyControl,
    PositionFeedbackControl,
    StallTimeoutStopped,
    ConvergenceTimeoutStopped,
    TimerTimeoutStopped,
}

impl ControlMode {
    /// Wire code of the mode.
    pub const fn code(self) -> i32 {
        match self {
            Self::DirectMotorDutyIdle => 0,
            Self::DirectMotorDutyControl => 1,
            Self::PositionFeedbackControl => 2,
            Self::StallTimeoutStopped => -1,
            Self::ConvergenceTimeoutStopped => -2,
            Self::TimerTimeoutStopped => -3,
        }
    }

    /// Whether the mode is entered by command rather than by stopping.
    pub const fn is_entry(self) -> bool {
        matches!(
            self,
            Self::DirectMotorDutyIdle | Self::DirectMotorDutyControl | Self::PositionFeedbackControl
        )
    }
}

/// One independently controlled linear actuator.
pub struct LinearActuatorAxis<A, S> {
    letter: char,
    actuator: A,
    smoother: S,
    mode: Settling<ControlMode>,
    now: Instant,
    homing: bool,

    convergence_timeout_ms: u32,
    stall_timeout_ms: u32,
    timer_timeout_ms: u32,

    position_notifier: Notifier<i32>,
    smoothed_position_notifier: Notifier<i32>,
    motor_notifier: Notifier<i32>,
}

impl<A: Actuator, S: Smoother> LinearActuatorAxis<A, S> {
    /// Build an axis around an actuator and smoother. The axis starts idle
    /// with its actuator frozen.
    pub fn new(config: &AxisConfig, mut actuator: A, smoother: S) -> Self {
        actuator.freeze();
        if config.swap_motor_polarity != actuator.motor().directions_swapped() {
            actuator.motor_mut().swap_directions();
        }
        Self {
            letter: config.channel,
            actuator,
            smoother,
            mode: Settling::new(ControlMode::DirectMotorDutyIdle, Instant::default()),
            now: Instant::default(),
            homing: false,
            convergence_timeout_ms: config.convergence_timeout_ms,
            stall_timeout_ms: config.stall_timeout_ms,
            timer_timeout_ms: config.timer_timeout_ms,
            position_notifier: Notifier::new(
                config.channel,
                POSITION as char,
                config.position_notifier,
            ),
            smoothed_position_notifier: Notifier::new(
                config.channel,
                SMOOTHED_POSITION as char,
                config.smoothed_position_notifier,
            ),
            motor_notifier: Notifier::new(config.channel, MOTOR as char, config.motor_notifier),
        }
    }

    /// Advance the actuator, handle a message addressed to this axis, run
    /// the notifiers and stop the axis if a stopping condition holds.
    pub fn update<T: Transport>(&mut self, messager: &mut Messager<T>, now: Instant) {
        self.now = now;
        self.actuator.update(now);
        self.smoother.update(self.actuator.position(), now);

        let request = messager
            .received()
            .filter(|m| m.key(0) == Some(self.letter as u8))
            .map(|m| Request::new(m.clone()));
        if let Some(request) = request {
            self.on_message(messager, &request.descend());
        }

        if self.homing {
            self.position_notifier.listen(messager, now);
            self.smoothed_position_notifier.listen(messager, now);
            self.motor_notifier.listen(messager, now);
        } else {
            let position = self.actuator.position();
            let smoothed = self.smoother.value();
            let duty = self.actuator.motor().speed();
            self.position_notifier.update(messager, now, position);
            self.smoothed_position_notifier.update(messager, now, smoothed);
            self.motor_notifier.update(messager, now, duty);
        }

        match self.mode.get() {
            ControlMode::DirectMotorDutyControl => {
                if self.stalled(now) {
                    self.end_control(messager, ControlMode::StallTimeoutStopped);
                } else if !self.homing && self.timed(now) {
                    self.end_control(messager, ControlMode::TimerTimeoutStopped);
                }
            }
            ControlMode::PositionFeedbackControl => {
                if self.converged(now) {
                    self.end_control(messager, ControlMode::ConvergenceTimeoutStopped);
                } else if self.stalled(now) {
                    self.end_control(messager, ControlMode::StallTimeoutStopped);
                }
            }
            _ => {}
        }

        if self.homing && self.mode.get() != ControlMode::DirectMotorDutyControl {
            self.homing = false;
            if self.mode.get() == ControlMode::StallTimeoutStopped {
                self.start_direct_motor_duty_control(messager, 0);
                info!("axis {} homed", self.letter);
            } else {
                warn!("axis {} homing interrupted", self.letter);
            }
        }
    }

    // Control

    /// Drive the motor at `duty` until the axis stalls against its end stop,
    /// then idle it.
    ///
    /// While homing the periodic notifiers are silent and the timer timeout
    /// is not enforced. A stall timeout of zero never finishes homing.
    pub fn start_homing<T: Transport>(
        &mut self,
        messager: &mut Messager<T>,
        duty: i32,
        now: Instant,
    ) {
        self.now = now;
        self.homing = true;
        info!("axis {} homing at duty {}", self.letter, duty);
        self.start_direct_motor_duty_control(messager, duty);
    }

    /// Whether the axis is still driving toward its end stop.
    #[inline]
    pub fn homing(&self) -> bool {
        self.homing
    }

    /// Drive the actuator to `setpoint` under feedback control.
    pub fn start_position_feedback_control<T: Transport>(
        &mut self,
        messager: &mut Messager<T>,
        setpoint: i32,
    ) {
        let now = self.now;
        self.actuator.controller_mut().set_setpoint(setpoint, now);
        self.mode.reset(ControlMode::PositionFeedbackControl, now);
        self.actuator.unfreeze(now);
        self.notify_setpoint(messager);
        self.notify_state(messager);
    }

    /// Drive the motor at a fixed duty, or idle it for a duty of zero.
    pub fn start_direct_motor_duty_control<T: Transport>(
        &mut self,
        messager: &mut Messager<T>,
        duty: i32,
    ) {
        let duty = clamp_duty(duty);
        let mode = if duty == 0 {
            ControlMode::DirectMotorDutyIdle
        } else {
            ControlMode::DirectMotorDutyControl
        };
        self.mode.reset(mode, self.now);
        self.actuator.freeze();
        self.actuator.motor_mut().run(duty);
        self.notify_motor(messager);
        self.notify_state(messager);
    }

    /// Stop the axis and record why.
    ///
    /// Only the stopped modes are accepted; passing an entry mode is a no-op
    /// because entering those requires a command.
    pub fn end_control<T: Transport>(&mut self, messager: &mut Messager<T>, next: ControlMode) {
        if next.is_entry() {
            return;
        }
        let previous = self.mode.get();
        self.actuator.freeze();
        self.actuator.motor_mut().run(0);
        self.notify_position(messager);
        match previous {
            ControlMode::DirectMotorDutyControl => self.notify_motor(messager),
            ControlMode::PositionFeedbackControl => self.notify_setpoint(messager),
            _ => {}
        }
        self.mode.reset(next, self.now);
        info!("axis {} stopped with mode {}", self.letter, next.code());
        self.notify_state(messager);
    }

    // Stopping conditions

    /// Whether feedback control has held its setpoint with zero output for
    /// the convergence timeout.
    pub fn converged(&self, now: Instant) -> bool {
        let timeout = self.convergence_timeout_ms;
        if timeout == 0 || self.mode.get() != ControlMode::PositionFeedbackControl {
            return false;
        }
        let pid = self.actuator.controller();
        self.mode.settled(now, timeout)
            && pid.setpoint_settled(now, timeout)
            && pid.output_settled_at(0, now, timeout)
    }

    /// Whether motion has been demanded without the smoothed position moving
    /// for the stall timeout.
    pub fn stalled(&self, now: Instant) -> bool {
        let timeout = self.stall_timeout_ms;
        if timeout == 0 || !self.mode.settled(now, timeout) || !self.smoother.settled(now, timeout)
        {
            return false;
        }
        match self.mode.get() {
            ControlMode::DirectMotorDutyControl => self.actuator.motor().speed() != 0,
            ControlMode::PositionFeedbackControl => {
                let pid = self.actuator.controller();
                pid.setpoint_settled(now, timeout) && !pid.output_settled_at(0, now, timeout)
            }
            _ => false,
        }
    }

    /// Whether the timer timeout has elapsed in the current mode.
    pub fn timed(&self, now: Instant) -> bool {
        self.timer_timeout_ms > 0 && self.mode.settled(now, self.timer_timeout_ms)
    }

    // Accessors

    #[inline]
    pub fn letter(&self) -> char {
        self.letter
    }

    #[inline]
    pub fn mode(&self) -> ControlMode {
        self.mode.get()
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn smoother(&self) -> &S {
        &self.smoother
    }

    pub fn convergence_timeout(&self) -> u32 {
        self.convergence_timeout_ms
    }

    pub fn stall_timeout(&self) -> u32 {
        self.stall_timeout_ms
    }

    pub fn timer_timeout(&self) -> u32 {
        self.timer_timeout_ms
    }

    // Announcements

    fn channel(&self, signal: Option<u8>) -> Channel {
        let mut channel = Channel::new();
        let _ = channel.push(self.letter);
        if let Some(signal) = signal {
            let _ = channel.push(signal as char);
        }
        channel
    }

    pub fn notify_state<T: Transport>(&self, messager: &mut Messager<T>) {
        messager.send_message(self.channel(None).as_str(), self.mode.get().code());
    }

    pub fn notify_position<T: Transport>(&self, messager: &mut Messager<T>) {
        messager.send_message(self.channel(Some(POSITION)).as_str(), self.actuator.position());
    }

    pub fn notify_smoothed_position<T: Transport>(&self, messager: &mut Messager<T>) {
        messager.send_message(
            self.channel(Some(SMOOTHED_POSITION)).as_str(),
            self.smoother.value(),
        );
    }

    pub fn notify_motor<T: Transport>(&self, messager: &mut Messager<T>) {
        messager.send_message(
            self.channel(Some(MOTOR)).as_str(),
            self.actuator.motor().speed(),
        );
    }

    pub fn notify_setpoint<T: Transport>(&self, messager: &mut Messager<T>) {
        messager.send_message(
            self.channel(Some(FEEDBACK)).as_str(),
            self.actuator.controller().setpoint(),
        );
    }

    // Message handling

    fn on_message<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if request.is_leaf() {
            self.notify_state(messager);
            return;
        }
        let routes: [Route<Self, T>; 4] = [
            (POSITION, Self::on_position),
            (SMOOTHED_POSITION, Self::on_smoothed_position),
            (MOTOR, Self::on_motor),
            (FEEDBACK, Self::on_feedback),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_position<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        // Deeper channels belong to the position notifier.
        if request.is_leaf() {
            self.notify_position(messager);
        }
    }

    fn on_smoothed_position<T: Transport>(
        &mut self,
        messager: &mut Messager<T>,
        request: &Request,
    ) {
        if request.is_leaf() {
            self.notify_smoothed_position(messager);
            return;
        }
        let routes: [Route<Self, T>; 4] = [
            (smoothed::SNAP_MULTIPLIER, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.smoother.snap_multiplier(),
                    |a, v| a.smoother.set_snap_multiplier(v).is_ok(),
                );
            }),
            (smoothed::RANGE_LOW, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.smoother.range().0,
                    |a, v| {
                        let (_, high) = a.smoother.range();
                        a.smoother.set_range(v, high).is_ok()
                    },
                );
            }),
            (smoothed::RANGE_HIGH, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.smoother.range().1,
                    |a, v| {
                        let (low, _) = a.smoother.range();
                        a.smoother.set_range(low, v).is_ok()
                    },
                );
            }),
            (smoothed::ACTIVITY_THRESHOLD, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.smoother.activity_threshold(),
                    |a, v| a.smoother.set_activity_threshold(v).is_ok(),
                );
            }),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_motor<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if request.is_leaf() {
            match request.payload() {
                Some(duty) => self.start_direct_motor_duty_control(messager, duty),
                None => self.notify_motor(messager),
            }
            return;
        }
        let routes: [Route<Self, T>; 3] = [
            (motor::STALL_TIMEOUT, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.stall_timeout_ms as i32,
                    |a, v| set_timeout(&mut a.stall_timeout_ms, v),
                );
            }),
            (motor::TIMER_TIMEOUT, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.timer_timeout_ms as i32,
                    |a, v| set_timeout(&mut a.timer_timeout_ms, v),
                );
            }),
            (motor::POLARITY, Self::on_motor_polarity),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_motor_polarity<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        parameter(
            self,
            messager,
            request,
            |a| {
                if a.actuator.motor().directions_swapped() {
                    -1
                } else {
                    1
                }
            },
            |a, v| {
                let motor = a.actuator.motor_mut();
                match v {
                    -1 if !motor.directions_swapped() => motor.swap_directions(),
                    1 if motor.directions_swapped() => motor.swap_directions(),
                    -1 | 1 => {}
                    _ => return false,
                }
                true
            },
        );
    }

    fn on_feedback<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        if request.is_leaf() {
            match request.payload() {
                Some(setpoint) => self.start_position_feedback_control(messager, setpoint),
                None => self.notify_setpoint(messager),
            }
            return;
        }
        let routes: [Route<Self, T>; 3] = [
            (feedback::CONVERGENCE_TIMEOUT, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.convergence_timeout_ms as i32,
                    |a, v| set_timeout(&mut a.convergence_timeout_ms, v),
                );
            }),
            (feedback::LIMITS, Self::on_feedback_limits),
            (feedback::PID, Self::on_feedback_pid),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_feedback_limits<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        let routes: [Route<Self, T>; 2] = [
            (feedback::POSITION, Self::on_position_limits),
            (feedback::MOTOR, Self::on_motor_limits),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_position_limits<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        let routes: [Route<Self, T>; 2] = [
            (feedback::LOW, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.actuator.controller().input_limits().min,
                    |a, v| {
                        let now = a.now;
                        let pid = a.actuator.controller_mut();
                        let mut limits = pid.input_limits();
                        limits.min = v;
                        pid.set_input_limits(limits, now).is_ok()
                    },
                );
            }),
            (feedback::HIGH, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.actuator.controller().input_limits().max,
                    |a, v| {
                        let now = a.now;
                        let pid = a.actuator.controller_mut();
                        let mut limits = pid.input_limits();
                        limits.max = v;
                        pid.set_input_limits(limits, now).is_ok()
                    },
                );
            }),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_motor_limits<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        let routes: [Route<Self, T>; 2] = [
            (feedback::FORWARDS, |axis, messager, request| {
                let routes: [Route<Self, T>; 2] = [
                    (feedback::HIGH, |axis, messager, request| {
                        output_limit(axis, messager, request, |l| &mut l.max);
                    }),
                    (feedback::LOW, |axis, messager, request| {
                        output_limit(axis, messager, request, |l| &mut l.brake_upper);
                    }),
                ];
                dispatch(&routes, axis, messager, request);
            }),
            (feedback::BACKWARDS, |axis, messager, request| {
                let routes: [Route<Self, T>; 2] = [
                    (feedback::HIGH, |axis, messager, request| {
                        output_limit(axis, messager, request, |l| &mut l.brake_lower);
                    }),
                    (feedback::LOW, |axis, messager, request| {
                        output_limit(axis, messager, request, |l| &mut l.min);
                    }),
                ];
                dispatch(&routes, axis, messager, request);
            }),
        ];
        dispatch(&routes, self, messager, request);
    }

    fn on_feedback_pid<T: Transport>(&mut self, messager: &mut Messager<T>, request: &Request) {
        let routes: [Route<Self, T>; 4] = [
            (feedback::KP, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.actuator.controller().kp(),
                    |a, v| {
                        a.actuator.controller_mut().set_kp(v);
                        true
                    },
                );
            }),
            (feedback::KD, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.actuator.controller().kd(),
                    |a, v| {
                        a.actuator.controller_mut().set_kd(v);
                        true
                    },
                );
            }),
            (feedback::KI, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.actuator.controller().ki(),
                    |a, v| {
                        a.actuator.controller_mut().set_ki(v);
                        true
                    },
                );
            }),
            (feedback::SAMPLE_INTERVAL, |axis, messager, request| {
                parameter(
                    axis,
                    messager,
                    request,
                    |a| a.actuator.controller().sample_interval() as i32,
                    |a, v| match u32::try_from(v) {
                        Ok(v) => a.actuator.controller_mut().set_sample_interval(v).is_ok(),
                        Err(_) => false,
                    },
                );
            }),
        ];
        dispatch(&routes, self, messager, request);
    }
}

/// Accept a non-negative timeout in milliseconds.
fn set_timeout(slot: &mut u32, value: i32) -> bool {
    match u32::try_from(value) {
        Ok(value) => {
            *slot = value;
            true
        }
        Err(_) => false,
    }
}

/// Get or set one field of the controller's output limits.
fn output_limit<A, S, T, F>(
    axis: &mut LinearActuatorAxis<A, S>,
    messager: &mut Messager<T>,
    request: &Request,
    field: F,
) where
    A: Actuator,
    S: Smoother,
    T: Transport,
    F: Fn(&mut crate::actuator::OutputLimits) -> &mut i32,
{
    parameter(
        axis,
        messager,
        request,
        |a| {
            let mut limits = a.actuator.controller().output_limits();
            *field(&mut limits)
        },
        |a, v| {
            let pid = a.actuator.controller_mut();
            let mut limits = pid.output_limits();
            *field(&mut limits) = v;
            pid.set_output_limits(limits).is_ok()
        },
    );
}

impl<T: Transport, A: Actuator, S: Smoother> Module<T> for LinearActuatorAxis<A, S> {
    fn update(&mut self, messager: &mut Messager<T>, now: Instant) {
        LinearActuatorAxis::update(self, messager, now);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::actuator::PositionSensor;
    use crate::messager::mock::MockTransport;
    use crate::pid::{Pid, PidActuator, PidConfig};
    use crate::smoothing::ResponsiveSmoother;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::string::String;
    use std::vec::Vec;

    /// Motor writing its physical duty into a shared cell.
    struct SimMotor {
        duty: Rc<Cell<i32>>,
        logical: i32,
        swapped: bool,
    }

    impl SimMotor {
        fn apply(&self) {
            self.duty.set(if self.swapped { -self.logical } else { self.logical });
        }
    }

    impl Motor for SimMotor {
        fn run(&mut self, duty: i32) {
            self.logical = duty;
            self.apply();
        }

        fn speed(&self) -> i32 {
            self.logical
        }

        fn swap_directions(&mut self) {
            self.swapped = !self.swapped;
            self.apply();
        }

        fn directions_swapped(&self) -> bool {
            self.swapped
        }
    }

    /// Plant moving `duty / divisor` per read; a divisor of zero never moves.
    struct SimSensor {
        duty: Rc<Cell<i32>>,
        position: Rc<Cell<i32>>,
        divisor: i32,
    }

    impl PositionSensor for SimSensor {
        fn read(&mut self) -> i32 {
            if self.divisor != 0 {
                self.position
                    .set(self.position.get() + self.duty.get() / self.divisor);
            }
            self.position.get()
        }
    }

    type SimAxis = LinearActuatorAxis<PidActuator<SimMotor, SimSensor>, ResponsiveSmoother>;

    struct Rig {
        axis: SimAxis,
        messager: Messager<MockTransport>,
        duty: Rc<Cell<i32>>,
        position: Rc<Cell<i32>>,
    }

    impl Rig {
        fn new(config: AxisConfig, start: i32, divisor: i32) -> Self {
            let duty = Rc::new(Cell::new(0));
            let position = Rc::new(Cell::new(start));
            let motor = SimMotor {
                duty: duty.clone(),
                logical: 0,
                swapped: false,
            };
            let sensor = SimSensor {
                duty: duty.clone(),
                position: position.clone(),
                divisor,
            };
            let actuator = PidActuator::new(motor, sensor, Pid::new(config.pid));
            let smoother = ResponsiveSmoother::new(config.smoother);
            Self {
                axis: LinearActuatorAxis::new(&config, actuator, smoother),
                messager: Messager::new(MockTransport::default()),
                duty,
                position,
            }
        }

        fn send(&mut self, line: &str, now: u32) -> Vec<String> {
            self.messager.transport_mut().push(line);
            self.tick(now)
        }

        fn tick(&mut self, now: u32) -> Vec<String> {
            self.messager.update();
            self.axis.update(&mut self.messager, Instant::from_millis(now));
            self.messager.transport_mut().take_lines()
        }
    }

    fn config() -> AxisConfig {
        AxisConfig {
            pid: PidConfig {
                kp: 1000,
                kd: 0,
                ki: 0,
                sample_interval_ms: 1,
                ..AxisConfig::DEFAULT.pid
            },
            ..AxisConfig::DEFAULT
        }
    }

    #[test]
    fn test_control_mode_codes() {
        assert_eq!(ControlMode::StallTimeoutStopped.code(), -1);
        assert_eq!(ControlMode::ConvergenceTimeoutStopped.code(), -2);
        assert_eq!(ControlMode::TimerTimeoutStopped.code(), -3);
        assert!(ControlMode::DirectMotorDutyIdle.is_entry());
        assert!(!ControlMode::TimerTimeoutStopped.is_entry());
    }

    #[test]
    fn test_bare_queries() {
        let mut rig = Rig::new(config(), 300, 0);
        rig.tick(0);
        assert_eq!(rig.send("<p>\n", 1), ["<p>(0)"]);
        assert_eq!(rig.send("<pp>\n", 2), ["<pp>(300)"]);
        assert_eq!(rig.send("<ps>\n", 3), ["<ps>(300)"]);
        assert_eq!(rig.send("<pm>\n", 4), ["<pm>(0)"]);
        assert_eq!(rig.send("<pf>\n", 5), ["<pf>(0)"]);
        assert_eq!(rig.send("<pms>\n", 6), ["<pms>(150)"]);
        assert_eq!(rig.send("<pfpp>\n", 7), ["<pfpp>(1000)"]);
        assert_eq!(rig.send("<pflph>\n", 8), ["<pflph>(1023)"]);
        assert!(rig.send("<z>\n", 9).is_empty());
        assert!(rig.send("<px>\n", 10).is_empty());
    }

    #[test]
    fn test_feedback_converges_and_stops() {
        let mut rig = Rig::new(
            AxisConfig {
                convergence_timeout_ms: 100,
                ..config()
            },
            0,
            20,
        );
        rig.tick(0);
        assert_eq!(rig.send("<pf>(500)", 1), ["<pf>(500)", "<p>(2)"]);
        assert_eq!(rig.axis.mode(), ControlMode::PositionFeedbackControl);

        let mut lines = Vec::new();
        for t in 2..=600 {
            lines.extend(rig.tick(t));
        }

        let position = rig.position.get();
        assert!((491..=500).contains(&position), "position {}", position);
        assert_eq!(rig.axis.mode(), ControlMode::ConvergenceTimeoutStopped);
        assert_eq!(
            lines,
            [
                std::format!("<pp>({})", position),
                String::from("<pf>(500)"),
                String::from("<p>(-2)"),
            ]
        );
        assert!(rig.axis.actuator().frozen());
        assert_eq!(rig.duty.get(), 0);
    }

    #[test]
    fn test_duty_control_stalls() {
        let mut rig = Rig::new(
            AxisConfig {
                stall_timeout_ms: 50,
                ..config()
            },
            300,
            0,
        );
        rig.tick(0);
        assert_eq!(rig.send("<pm>(200)", 1), ["<pm>(200)", "<p>(1)"]);
        assert_eq!(rig.duty.get(), 200);

        for t in 2..=50 {
            assert!(rig.tick(t).is_empty());
        }
        assert_eq!(rig.axis.mode(), ControlMode::DirectMotorDutyControl);

        assert_eq!(rig.tick(51), ["<pp>(300)", "<pm>(0)", "<p>(-1)"]);
        assert_eq!(rig.axis.mode(), ControlMode::StallTimeoutStopped);
        assert_eq!(rig.duty.get(), 0);
    }

    #[test]
    fn test_feedback_control_stalls_against_fixed_plant() {
        let mut rig = Rig::new(
            AxisConfig {
                stall_timeout_ms: 50,
                ..config()
            },
            300,
            0,
        );
        rig.tick(0);
        assert_eq!(rig.send("<pf>(500)", 1), ["<pf>(500)", "<p>(2)"]);

        for t in 2..=50 {
            assert!(rig.tick(t).is_empty());
            assert!(!rig.axis.stalled(Instant::from_millis(t)));
        }
        assert_eq!(rig.axis.mode(), ControlMode::PositionFeedbackControl);
        assert_eq!(rig.duty.get(), 255);

        assert_eq!(rig.tick(51), ["<pp>(300)", "<pf>(500)", "<p>(-1)"]);
        assert_eq!(rig.axis.mode(), ControlMode::StallTimeoutStopped);
        assert!(rig.axis.actuator().frozen());
        assert_eq!(rig.duty.get(), 0);
    }

    #[test]
    fn test_homing_stops_at_end_stop_and_idles() {
        let mut rig = Rig::new(
            AxisConfig {
                stall_timeout_ms: 50,
                timer_timeout_ms: 20,
                ..config()
            },
            300,
            0,
        );
        rig.tick(0);
        rig.axis
            .start_homing(&mut rig.messager, 255, Instant::from_millis(1));
        assert_eq!(
            rig.messager.transport_mut().take_lines(),
            ["<pm>(255)", "<p>(1)"]
        );
        assert!(rig.axis.homing());

        // Configuration is answered but nothing is published.
        assert_eq!(rig.send("<ppnc>(0)", 2), ["<ppnc>(0)"]);
        assert_eq!(rig.send("<ppn>(1)", 2), ["<ppn>(1)"]);

        // The timer timeout is not enforced either.
        for t in 3..=50 {
            assert!(rig.tick(t).is_empty(), "tick {}", t);
        }
        assert!(rig.axis.homing());
        assert_eq!(rig.duty.get(), 255);

        assert_eq!(
            rig.tick(51),
            ["<pp>(300)", "<pm>(0)", "<p>(-1)", "<pm>(0)", "<p>(0)"]
        );
        assert!(!rig.axis.homing());
        assert_eq!(rig.axis.mode(), ControlMode::DirectMotorDutyIdle);
        assert_eq!(rig.duty.get(), 0);

        assert_eq!(rig.tick(52), ["<pp>(300)"]);
    }

    #[test]
    fn test_homing_interrupted_by_command() {
        let mut rig = Rig::new(config(), 300, 0);
        rig.tick(0);
        rig.axis
            .start_homing(&mut rig.messager, -100, Instant::from_millis(1));
        rig.messager.transport_mut().take_lines();

        assert_eq!(rig.send("<pm>(0)", 2), ["<pm>(0)", "<p>(0)"]);
        assert!(!rig.axis.homing());
        assert_eq!(rig.axis.mode(), ControlMode::DirectMotorDutyIdle);
    }

    #[test]
    fn test_duty_control_timer_expires() {
        let mut rig = Rig::new(
            AxisConfig {
                stall_timeout_ms: 0,
                timer_timeout_ms: 100,
                ..config()
            },
            0,
            20,
        );
        assert_eq!(rig.send("<pm>(100)", 0), ["<pm>(100)", "<p>(1)"]);
        for t in 1..100 {
            assert!(rig.tick(t).is_empty());
        }
        let lines = rig.tick(100);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "<pm>(0)");
        assert_eq!(lines[2], "<p>(-3)");
        assert_eq!(rig.axis.mode(), ControlMode::TimerTimeoutStopped);
        assert!(rig.position.get() > 0);
    }

    #[test]
    fn test_zero_duty_idles() {
        let mut rig = Rig::new(config(), 0, 0);
        rig.send("<pm>(-999)", 0);
        assert_eq!(rig.duty.get(), -255);
        assert_eq!(rig.send("<pm>(0)", 1), ["<pm>(0)", "<p>(0)"]);
        assert_eq!(rig.axis.mode(), ControlMode::DirectMotorDutyIdle);
    }

    #[test]
    fn test_position_limits_stay_ordered() {
        let mut rig = Rig::new(config(), 0, 0);
        assert_eq!(rig.send("<pflpl>(2000)", 0), ["<pflpl>(0)"]);
        assert_eq!(rig.send("<pflph>(900)", 1), ["<pflph>(900)"]);
        assert_eq!(rig.send("<pflpl>(100)", 2), ["<pflpl>(100)"]);
        assert_eq!(rig.send("<pflph>(50)", 3), ["<pflph>(900)"]);
    }

    #[test]
    fn test_motor_limits_stay_nested() {
        let mut rig = Rig::new(config(), 0, 0);
        assert_eq!(rig.send("<pflmfl>(300)", 0), ["<pflmfl>(100)"]);
        assert_eq!(rig.send("<pflmfh>(50)", 1), ["<pflmfh>(255)"]);
        assert_eq!(rig.send("<pflmbh>(10)", 2), ["<pflmbh>(-100)"]);
        assert_eq!(rig.send("<pflmbl>(-200)", 3), ["<pflmbl>(-200)"]);
        assert_eq!(rig.send("<pflmfl>(40)", 4), ["<pflmfl>(40)"]);
        let limits = rig.axis.actuator().controller().output_limits();
        assert_eq!(limits.min, -200);
        assert_eq!(limits.brake_lower, -100);
        assert_eq!(limits.brake_upper, 40);
        assert_eq!(limits.max, 255);
    }

    #[test]
    fn test_motor_polarity() {
        let mut rig = Rig::new(config(), 0, 0);
        assert_eq!(rig.send("<pmp>\n", 0), ["<pmp>(1)"]);
        assert_eq!(rig.send("<pmp>(-1)", 1), ["<pmp>(-1)"]);
        assert_eq!(rig.send("<pmp>(3)", 2), ["<pmp>(-1)"]);

        rig.send("<pm>(80)", 3);
        assert_eq!(rig.axis.actuator().motor().speed(), 80);
        assert_eq!(rig.duty.get(), -80);
    }

    #[test]
    fn test_configured_polarity_applied() {
        let rig = Rig::new(
            AxisConfig {
                swap_motor_polarity: true,
                ..config()
            },
            0,
            0,
        );
        assert!(rig.axis.actuator().motor().directions_swapped());
    }

    #[test]
    fn test_end_control_ignores_entry_modes() {
        let mut rig = Rig::new(config(), 0, 0);
        rig.send("<pm>(50)", 0);
        rig.axis
            .end_control(&mut rig.messager, ControlMode::PositionFeedbackControl);
        assert!(rig.messager.transport_mut().take_lines().is_empty());
        assert_eq!(rig.axis.mode(), ControlMode::DirectMotorDutyControl);
        assert_eq!(rig.duty.get(), 50);
    }

    #[test]
    fn test_timeouts_reject_negative() {
        let mut rig = Rig::new(config(), 0, 0);
        assert_eq!(rig.send("<pmt>(-5)", 0), ["<pmt>(2000)"]);
        assert_eq!(rig.send("<pfc>(0)", 1), ["<pfc>(0)"]);
        assert_eq!(rig.axis.convergence_timeout(), 0);
    }

    #[test]
    fn test_position_notifier() {
        let mut rig = Rig::new(config(), 42, 0);
        rig.tick(0);
        assert_eq!(rig.send("<ppnc>(0)", 1), ["<ppnc>(0)"]);
        assert_eq!(rig.send("<ppn>(1)", 2), ["<ppn>(1)", "<pp>(42)"]);
        assert_eq!(rig.tick(3), ["<pp>(42)"]);
        // Unchanged values are held back once change-only is set again.
        assert_eq!(rig.send("<ppnc>(1)", 4), ["<ppnc>(1)"]);
        assert!(rig.tick(5).is_empty());
    }
}
