// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay options

use std::cmp;
use std::time::Duration;

use rand::Rng;

use super::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP, DEFAULT_BACKOFF_FACTOR, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_NOTIFICATION_CHANNEL_SIZE, DEFAULT_PUBLISH_TIMEOUT,
};

/// [`Relay`](super::Relay) options
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub(super) connect_timeout: Duration,
    pub(super) publish_timeout: Duration,
    pub(super) reconnect: bool,
    pub(super) backoff: BackoffOptions,
    pub(super) verify_subscriptions: bool,
    pub(super) notification_channel_size: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            reconnect: true,
            backoff: BackoffOptions::default(),
            verify_subscriptions: true,
            notification_channel_size: DEFAULT_NOTIFICATION_CHANNEL_SIZE,
        }
    }
}

impl RelayOptions {
    /// New default options
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection timeout (default: 5 sec)
    #[inline]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout for waiting for the `OK` of a published event (default: 10 sec)
    #[inline]
    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    /// Automatically reconnect after an unexpected disconnection (default: true)
    #[inline]
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Reconnection backoff
    #[inline]
    pub fn backoff(mut self, backoff: BackoffOptions) -> Self {
        self.backoff = backoff;
        self
    }

    /// Drop received events that don't match the filters of their subscription (default: true)
    #[inline]
    pub fn verify_subscriptions(mut self, enable: bool) -> Self {
        self.verify_subscriptions = enable;
        self
    }

    /// Notification channel size (default: 2048)
    #[inline]
    pub fn notification_channel_size(mut self, size: usize) -> Self {
        self.notification_channel_size = size;
        self
    }
}

/// Exponential reconnection backoff
///
/// The delay before attempt `n` (starting from 1) is `min(base * factor^(n-1), cap)`.
/// With jitter enabled, a random value in `[delay / 2, delay]` is used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffOptions {
    base: Duration,
    factor: u32,
    cap: Duration,
    jitter: bool,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            factor: DEFAULT_BACKOFF_FACTOR,
            cap: DEFAULT_BACKOFF_CAP,
            jitter: true,
        }
    }
}

impl BackoffOptions {
    /// New default backoff
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// First delay (default: 1 sec)
    #[inline]
    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Growth factor (default: 2)
    #[inline]
    pub fn factor(mut self, factor: u32) -> Self {
        self.factor = cmp::max(factor, 1);
        self
    }

    /// Maximum delay (default: 60 sec)
    #[inline]
    pub fn cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Randomize the delays (default: true)
    #[inline]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the `attempt`-th reconnection attempt, jitter excluded
    pub fn max_delay(&self, attempt: u32) -> Duration {
        let exp: u32 = attempt.saturating_sub(1);
        let multiplier: u32 = self.factor.checked_pow(exp).unwrap_or(u32::MAX);
        let delay: Duration = self.base.checked_mul(multiplier).unwrap_or(self.cap);
        cmp::min(delay, self.cap)
    }

    /// Delay before the `attempt`-th reconnection attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay: Duration = self.max_delay(attempt);

        if !self.jitter {
            return delay;
        }

        // The jitter avoids that many relays reconnect at the same time after a network failure.
        let max: u64 = delay.as_millis().try_into().unwrap_or(u64::MAX);
        let millis: u64 = rand::thread_rng().gen_range(max / 2..=max);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_exponential_growth() {
        let backoff = BackoffOptions::new().jitter(false);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(2), Duration::from_secs(2));
        assert_eq!(backoff.delay(3), Duration::from_secs(4));
        assert_eq!(backoff.delay(6), Duration::from_secs(32));
        assert_eq!(backoff.delay(7), Duration::from_secs(60));
        assert_eq!(backoff.delay(1000), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_custom() {
        let backoff = BackoffOptions::new()
            .base(Duration::from_millis(100))
            .factor(3)
            .cap(Duration::from_secs(1))
            .jitter(false);
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(300));
        assert_eq!(backoff.delay(3), Duration::from_millis(900));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let backoff = BackoffOptions::new();
        for attempt in 1..10 {
            let max = backoff.max_delay(attempt);
            for _ in 0..50 {
                let delay = backoff.delay(attempt);
                assert!(delay <= max);
                assert!(delay >= max / 2);
            }
        }
    }
}
