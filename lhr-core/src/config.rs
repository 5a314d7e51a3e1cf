//! Static tuning of an axis.
//!
//! Boards describe each axis with an [`AxisConfig`] table; everything in it
//! can later be changed over the wire.

use crate::actuator::{InputLimits, OutputLimits};
use crate::notifier::NotifierConfig;
use crate::pid::PidConfig;
use crate::smoothing::SmootherConfig;

/// Startup parameters of one linear actuator axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisConfig {
    /// Channel prefix of the axis.
    pub channel: char,
    /// Reverse the motor's sense of forwards.
    pub swap_motor_polarity: bool,
    /// Milliseconds the loop must hold at its setpoint before it is stopped.
    /// Zero disables convergence detection.
    pub convergence_timeout_ms: u32,
    /// Milliseconds of demanded motion without movement before the axis is
    /// stopped. Zero disables stall detection.
    pub stall_timeout_ms: u32,
    /// Hard ceiling on duty-controlled motion. Zero disables the timer.
    pub timer_timeout_ms: u32,
    pub pid: PidConfig,
    pub smoother: SmootherConfig,
    pub position_notifier: NotifierConfig,
    pub smoothed_position_notifier: NotifierConfig,
    pub motor_notifier: NotifierConfig,
}

impl AxisConfig {
    pub const DEFAULT: Self = Self {
        channel: 'p',
        swap_motor_polarity: false,
        convergence_timeout_ms: 150,
        stall_timeout_ms: 150,
        timer_timeout_ms: 2000,
        pid: PidConfig {
            kp: 1000,
            kd: 10,
            ki: 0,
            sample_interval_ms: 10,
            input: InputLimits { min: 0, max: 1023 },
            output: OutputLimits {
                min: -255,
                brake_lower: -100,
                brake_upper: 100,
                max: 255,
            },
        },
        smoother: SmootherConfig {
            snap_multiplier: 10,
            range_low: 0,
            range_high: 1023,
            activity_threshold: 4,
        },
        position_notifier: NotifierConfig::DEFAULT,
        smoothed_position_notifier: NotifierConfig::DEFAULT,
        motor_notifier: NotifierConfig::DEFAULT,
    };

    /// Default tuning under another channel prefix.
    pub const fn with_channel(channel: char) -> Self {
        let mut config = Self::DEFAULT;
        config.channel = channel;
        config
    }
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
