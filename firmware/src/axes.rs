//! Per-axis tuning tables for the standard robot.
//!
//! Positions are 10-bit potentiometer readings. Gains are scaled by 100.

use lhr_core::{
    AxisConfig, InputLimits, NotifierConfig, OutputLimits, PidConfig, SmootherConfig,
};

/// Static configuration of one axis plus how its hardware is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTuning {
    pub config: AxisConfig,
    /// ADC channel carrying the axis potentiometer.
    pub adc_channel: usize,
    /// Potentiometer reads high at the retracted end.
    pub invert_sensor: bool,
}

const SMOOTHER: SmootherConfig = SmootherConfig {
    snap_multiplier: 10,
    range_low: 0,
    range_high: 1023,
    activity_threshold: 4,
};

/// Pipettor plunger.
pub const PIPETTOR: AxisTuning = AxisTuning {
    config: AxisConfig {
        channel: 'p',
        swap_motor_polarity: true,
        convergence_timeout_ms: 150,
        stall_timeout_ms: 150,
        timer_timeout_ms: 2000,
        pid: PidConfig {
            kp: 3250,
            kd: 40,
            ki: 0,
            sample_interval_ms: 10,
            input: InputLimits { min: 35, max: 1005 },
            output: OutputLimits {
                min: -255,
                brake_lower: -150,
                brake_upper: 150,
                max: 255,
            },
        },
        smoother: SMOOTHER,
        position_notifier: NotifierConfig::DEFAULT,
        smoothed_position_notifier: NotifierConfig::DEFAULT,
        motor_notifier: NotifierConfig::DEFAULT,
    },
    adc_channel: 0,
    invert_sensor: true,
};

/// Vertical positioner carrying the pipettor.
pub const Z_AXIS: AxisTuning = AxisTuning {
    config: AxisConfig {
        channel: 'z',
        swap_motor_polarity: false,
        convergence_timeout_ms: 150,
        stall_timeout_ms: 150,
        timer_timeout_ms: 2000,
        pid: PidConfig {
            kp: 1000,
            kd: 8,
            ki: 0,
            sample_interval_ms: 10,
            input: InputLimits { min: 20, max: 970 },
            // Gravity assists downwards travel, so the ranges are asymmetric.
            output: OutputLimits {
                min: -120,
                brake_lower: -50,
                brake_upper: 110,
                max: 200,
            },
        },
        smoother: SMOOTHER,
        position_notifier: NotifierConfig::DEFAULT,
        smoothed_position_notifier: NotifierConfig::DEFAULT,
        motor_notifier: NotifierConfig::DEFAULT,
    },
    adc_channel: 1,
    invert_sensor: false,
};

/// Duty driving `z` up into its end stop when the host connects.
pub const Z_HOMING_DUTY: i32 = 255;

/// Horizontal positioner across the sample rack.
pub const Y_AXIS: AxisTuning = AxisTuning {
    config: AxisConfig {
        channel: 'y',
        swap_motor_polarity: true,
        convergence_timeout_ms: 150,
        stall_timeout_ms: 150,
        timer_timeout_ms: 5000,
        pid: PidConfig {
            kp: 4500,
            kd: 125,
            ki: 0,
            sample_interval_ms: 10,
            input: InputLimits { min: 0, max: 720 },
            output: OutputLimits {
                min: -120,
                brake_lower: -110,
                brake_upper: 110,
                max: 120,
            },
        },
        smoother: SmootherConfig {
            range_high: 800,
            activity_threshold: 2,
            ..SMOOTHER
        },
        position_notifier: NotifierConfig::DEFAULT,
        smoothed_position_notifier: NotifierConfig::DEFAULT,
        motor_notifier: NotifierConfig::DEFAULT,
    },
    adc_channel: 2,
    invert_sensor: false,
};

/// Horizontal positioner along the rack, same mechanics as `y`.
///
/// Reads ADC3 (GPIO29), which needs a board that breaks that pin out.
pub const X_AXIS: AxisTuning = AxisTuning {
    config: AxisConfig {
        channel: 'x',
        ..Y_AXIS.config
    },
    adc_channel: 3,
    invert_sensor: false,
};
