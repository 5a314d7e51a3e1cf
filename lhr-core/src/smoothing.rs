//! Responsive exponential smoothing of a noisy position signal.
//!
//! The smoothing factor follows a snap curve: small changes are averaged
//! heavily while large jumps pass through almost immediately. A running
//! average of the error puts the filter to sleep while the signal only
//! jitters, so the output stays still when the input is merely noisy.
//!
//! All arithmetic is fixed point in thousandths.

use crate::actuator::{LimitError, Smoother};
use crate::time::{Instant, Settling};

const SCALE: i64 = 1000;
/// Error average weight, 0.4.
const ERROR_EMA_WEIGHT: i64 = 400;

/// Tuning of a [`ResponsiveSmoother`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmootherConfig {
    /// Snap multiplier in thousandths; larger values track changes faster.
    pub snap_multiplier: i32,
    pub range_low: i32,
    pub range_high: i32,
    /// Averaged error below which the filter sleeps; zero never sleeps.
    pub activity_threshold: i32,
}

/// Snap-curve smoother with activity-based sleep.
pub struct ResponsiveSmoother {
    config: SmootherConfig,
    /// Smoothed value in thousandths.
    smooth: Option<i64>,
    /// Average absolute error in thousandths.
    error_ema: i64,
    output: Settling<i32>,
}

impl ResponsiveSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        let mut config = config;
        if config.range_low > config.range_high {
            warn!("smoother range inverted, swapping bounds");
            core::mem::swap(&mut config.range_low, &mut config.range_high);
        }
        config.snap_multiplier = config.snap_multiplier.max(0);
        config.activity_threshold = config.activity_threshold.max(0);
        Self {
            config,
            smooth: None,
            error_ema: 0,
            output: Settling::new(0, Instant::default()),
        }
    }

    /// Whether the filter is currently ignoring input as noise.
    pub fn sleeping(&self) -> bool {
        self.config.activity_threshold > 0
            && self.error_ema < i64::from(self.config.activity_threshold) * SCALE
    }

    /// Fraction of the error applied this step, in thousandths.
    fn snap_curve(&self, diff: i64) -> i64 {
        let x = diff * i64::from(self.config.snap_multiplier);
        let y = SCALE * SCALE / (x + SCALE);
        ((SCALE - y) * 2).min(SCALE)
    }
}

impl Smoother for ResponsiveSmoother {
    fn update(&mut self, raw: i32, now: Instant) {
        let raw = i64::from(raw.clamp(self.config.range_low, self.config.range_high)) * SCALE;
        let smooth = match self.smooth {
            Some(smooth) => smooth,
            None => {
                self.smooth = Some(raw);
                self.output.reset((raw / SCALE) as i32, now);
                return;
            }
        };

        let diff = (raw - smooth).abs();
        self.error_ema += (diff - self.error_ema) * ERROR_EMA_WEIGHT / SCALE;
        if self.sleeping() {
            return;
        }

        let snap = self.snap_curve(diff / SCALE);
        let smooth = smooth + (raw - smooth) * snap / SCALE;
        self.smooth = Some(smooth);

        let rounded = (smooth + SCALE / 2).div_euclid(SCALE);
        // Bounded by the i32 input range.
        self.output.update(rounded as i32, now);
    }

    fn value(&self) -> i32 {
        self.output.get()
    }

    fn settled(&self, now: Instant, duration_ms: u32) -> bool {
        self.output.settled(now, duration_ms)
    }

    fn snap_multiplier(&self) -> i32 {
        self.config.snap_multiplier
    }

    fn set_snap_multiplier(&mut self, multiplier: i32) -> Result<(), LimitError> {
        if multiplier < 0 {
            return Err(LimitError::Inverted);
        }
        self.config.snap_multiplier = multiplier;
        Ok(())
    }

    fn range(&self) -> (i32, i32) {
        (self.config.range_low, self.config.range_high)
    }

    fn set_range(&mut self, low: i32, high: i32) -> Result<(), LimitError> {
        if low > high {
            return Err(LimitError::Inverted);
        }
        self.config.range_low = low;
        self.config.range_high = high;
        Ok(())
    }

    fn activity_threshold(&self) -> i32 {
        self.config.activity_threshold
    }

    fn set_activity_threshold(&mut self, threshold: i32) -> Result<(), LimitError> {
        if threshold < 0 {
            return Err(LimitError::Inverted);
        }
        self.config.activity_threshold = threshold;
        Ok(())
    }
}
