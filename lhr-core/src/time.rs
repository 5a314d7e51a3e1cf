//! Millisecond timestamps and settle-time tracking.
//!
//! Nothing in this crate reads a clock. The scheduler passes the current
//! [`Instant`] into every update, which keeps timing deterministic under test.

/// Monotonic millisecond timestamp. Wraps after ~49 days; differences are
/// computed with wrapping arithmetic so comparisons stay valid across the wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u32);

impl Instant {
    #[must_use]
    pub const fn from_millis(ms: u32) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`.
    #[must_use]
    pub const fn since(self, earlier: Instant) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    #[must_use]
    pub const fn add_millis(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }
}

/// A value paired with the instant it last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settling<T> {
    value: T,
    since: Instant,
}

impl<T: Copy + PartialEq> Settling<T> {
    pub const fn new(value: T, now: Instant) -> Self {
        Self { value, since: now }
    }

    #[inline]
    pub fn get(&self) -> T {
        self.value
    }

    /// When the value last changed.
    #[inline]
    pub fn since(&self) -> Instant {
        self.since
    }

    /// Record a new sample. The timestamp moves only if the value changed.
    /// Returns whether it changed.
    pub fn update(&mut self, value: T, now: Instant) -> bool {
        if value == self.value {
            return false;
        }
        self.value = value;
        self.since = now;
        true
    }

    /// Record a value and restart its timestamp even if it is unchanged.
    pub fn reset(&mut self, value: T, now: Instant) {
        self.value = value;
        self.since = now;
    }

    /// Whether the value has held for at least `duration_ms`.
    #[inline]
    pub fn settled(&self, now: Instant, duration_ms: u32) -> bool {
        now.since(self.since) >= duration_ms
    }

    /// Whether the value equals `value` and has held for at least `duration_ms`.
    #[inline]
    pub fn settled_at(&self, value: T, now: Instant, duration_ms: u32) -> bool {
        self.value == value && self.settled(now, duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u32) -> Instant {
        Instant::from_millis(v)
    }

    #[test]
    fn test_since_wraps() {
        assert_eq!(ms(10).since(ms(4)), 6);
        assert_eq!(ms(5).since(ms(u32::MAX - 4)), 10);
        assert_eq!(ms(u32::MAX).add_millis(3), ms(2));
    }

    #[test]
    fn test_unchanged_update_keeps_timestamp() {
        let mut s = Settling::new(3, ms(0));
        assert!(!s.update(3, ms(50)));
        assert_eq!(s.since(), ms(0));
        assert!(s.settled(ms(50), 50));
        assert!(!s.settled(ms(49), 50));
    }

    #[test]
    fn test_change_restarts_window() {
        let mut s = Settling::new(3, ms(0));
        assert!(s.update(4, ms(40)));
        assert!(!s.settled(ms(80), 50));
        assert!(s.settled(ms(90), 50));
        assert!(s.settled_at(4, ms(90), 50));
        assert!(!s.settled_at(3, ms(90), 50));
    }

    #[test]
    fn test_reset_restarts_same_value() {
        let mut s = Settling::new(1, ms(0));
        s.reset(1, ms(100));
        assert_eq!(s.since(), ms(100));
        assert!(!s.settled(ms(150), 100));
    }

    #[test]
    fn test_zero_duration_always_settled() {
        let s = Settling::new(0u8, ms(7));
        assert!(s.settled(ms(7), 0));
    }
}
