//! Periodic publisher for one numeric signal.
//!
//! A notifier listens on `<axis><signal>n...` and republishes the signal on
//! `<axis><signal>`:
//!
//! | channel | payload | meaning |
//! |---------|---------|---------|
//! | `n`  | 0, 1, 2 | mode: silent, every N iterations, every N milliseconds |
//! | `ni` | > 0     | interval N |
//! | `nc` | 0, 1    | only publish values that changed |
//! | `nn` | >= -1   | notifications left before going silent, -1 unlimited |
//!
//! Every configuration message is answered with the current value. When the
//! count runs out the notifier reports `nn(0)`, falls silent and reports `n(0)`.

use lhr_proto::{Channel, Transport};

use crate::messager::Messager;
use crate::time::Instant;

/// Publishing cadence of a [`Notifier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifierMode {
    #[default]
    Silent,
    IterationIntervals,
    TimeIntervals,
}

impl NotifierMode {
    pub const fn code(self) -> i32 {
        match self {
            Self::Silent => 0,
            Self::IterationIntervals => 1,
            Self::TimeIntervals => 2,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Silent),
            1 => Some(Self::IterationIntervals),
            2 => Some(Self::TimeIntervals),
            _ => None,
        }
    }
}

const NOTIFY: u8 = b'n';
const INTERVAL: u8 = b'i';
const CHANGE_ONLY: u8 = b'c';
const NUMBER: u8 = b'n';

/// Startup configuration of a [`Notifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotifierConfig {
    pub mode: NotifierMode,
    pub interval: u32,
    pub change_only: bool,
    pub number: i32,
}

impl NotifierConfig {
    pub const DEFAULT: Self = Self {
        mode: NotifierMode::Silent,
        interval: 1,
        change_only: true,
        number: -1,
    };
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Publishes one signal of an axis on a configurable cadence.
pub struct Notifier<V> {
    channel: Channel,
    mode: NotifierMode,
    interval: u32,
    change_only: bool,
    number: i32,
    iteration: u32,
    last_fired: Instant,
    previous: Option<V>,
}

impl<V> Notifier<V>
where
    V: Copy + PartialEq + Into<i32>,
{
    /// Notifier publishing on `<axis><signal>`.
    pub fn new(axis: char, signal: char, config: NotifierConfig) -> Self {
        let mut channel = Channel::new();
        // Two characters always fit.
        let _ = channel.push(axis);
        let _ = channel.push(signal);
        Self {
            channel,
            mode: config.mode,
            interval: config.interval.max(1),
            change_only: config.change_only,
            number: config.number.max(-1),
            iteration: 0,
            last_fired: Instant::default(),
            previous: None,
        }
    }

    #[inline]
    pub fn mode(&self) -> NotifierMode {
        self.mode
    }

    #[inline]
    pub fn interval(&self) -> u32 {
        self.interval
    }

    #[inline]
    pub fn change_only(&self) -> bool {
        self.change_only
    }

    /// Notifications left, or -1 for unlimited.
    #[inline]
    pub fn number(&self) -> i32 {
        self.number
    }

    /// Channel on which the signal is published.
    #[inline]
    pub fn channel(&self) -> &str {
        self.channel.as_str()
    }

    /// Handle configuration messages, then publish `value` if due.
    pub fn update<T: Transport>(&mut self, messager: &mut Messager<T>, now: Instant, value: V) {
        self.on_message(messager, now);
        self.publish(messager, now, value);
    }

    /// Handle configuration messages without publishing.
    pub fn listen<T: Transport>(&mut self, messager: &mut Messager<T>, now: Instant) {
        self.on_message(messager, now);
    }

    fn publish<T: Transport>(&mut self, messager: &mut Messager<T>, now: Instant, value: V) {
        if !self.due(now) {
            return;
        }
        if self.change_only && self.previous == Some(value) {
            return;
        }
        if self.number == 0 {
            self.expire(messager);
            return;
        }

        messager.send_message(self.channel.as_str(), value.into());
        self.previous = Some(value);

        if self.number > 0 {
            self.number -= 1;
            if self.number == 0 {
                self.expire(messager);
            }
        }
    }

    /// Start publishing in `mode` from `now`.
    pub fn set_mode(&mut self, mode: NotifierMode, now: Instant) {
        self.mode = mode;
        self.iteration = 0;
        self.last_fired = now;
        self.previous = None;
    }

    fn due(&mut self, now: Instant) -> bool {
        match self.mode {
            NotifierMode::Silent => false,
            NotifierMode::IterationIntervals => {
                self.iteration += 1;
                if self.iteration >= self.interval {
                    self.iteration = 0;
                    true
                } else {
                    false
                }
            }
            NotifierMode::TimeIntervals => {
                if now.since(self.last_fired) >= self.interval {
                    self.last_fired = now;
                    true
                } else {
                    false
                }
            }
        }
    }

    fn expire<T: Transport>(&mut self, messager: &mut Messager<T>) {
        self.mode = NotifierMode::Silent;
        let number = self.sub_channel(&[NOTIFY, NUMBER]);
        messager.send_message(number.as_str(), 0);
        let notify = self.sub_channel(&[NOTIFY]);
        messager.send_message(notify.as_str(), NotifierMode::Silent.code());
    }

    fn sub_channel(&self, suffix: &[u8]) -> Channel {
        let mut channel = self.channel.clone();
        for &c in suffix {
            let _ = channel.push(c as char);
        }
        channel
    }

    fn on_message<T: Transport>(&mut self, messager: &mut Messager<T>, now: Instant) {
        let Some(message) = messager.received() else {
            return;
        };
        let Some(rest) = message.channel().strip_prefix(self.channel.as_str()) else {
            return;
        };
        let rest = rest.as_bytes();
        if rest.first() != Some(&NOTIFY) {
            return;
        }
        let payload = message.payload;

        let response = match &rest[1..] {
            [] => {
                if let Some(code) = payload {
                    match NotifierMode::from_code(code) {
                        Some(mode) => self.set_mode(mode, now),
                        None => debug!("rejected notifier mode {}", code),
                    }
                }
                self.mode.code()
            }
            [INTERVAL] => {
                if let Some(interval) = payload {
                    match u32::try_from(interval) {
                        Ok(interval) if interval > 0 => self.interval = interval,
                        _ => debug!("rejected notifier interval {}", interval),
                    }
                }
                self.interval as i32
            }
            [CHANGE_ONLY] => {
                match payload {
                    Some(0) => self.change_only = false,
                    Some(1) => self.change_only = true,
                    Some(other) => debug!("rejected notifier change-only flag {}", other),
                    None => {}
                }
                i32::from(self.change_only)
            }
            [NUMBER] => {
                if let Some(number) = payload {
                    if number >= -1 {
                        self.number = number;
                    } else {
                        debug!("rejected notifier count {}", number);
                    }
                }
                self.number
            }
            _ => return,
        };
        messager.send_response(response);
    }
}
