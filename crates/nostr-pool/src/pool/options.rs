// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Pool options

use std::time::Duration;

use super::constants::{DEFAULT_EOSE_TIMEOUT, DEFAULT_IDLE_GRACE_PERIOD};
use crate::relay::RelayOptions;

/// Relay Pool Options
#[derive(Debug, Clone)]
pub struct RelayPoolOptions {
    pub(super) relay: RelayOptions,
    pub(super) eose_timeout: Duration,
    pub(super) idle_grace_period: Duration,
}

impl Default for RelayPoolOptions {
    fn default() -> Self {
        Self {
            relay: RelayOptions::default(),
            eose_timeout: DEFAULT_EOSE_TIMEOUT,
            idle_grace_period: DEFAULT_IDLE_GRACE_PERIOD,
        }
    }
}

impl RelayPoolOptions {
    /// New default options
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options of the relays created by the pool
    #[inline]
    pub fn relay(mut self, opts: RelayOptions) -> Self {
        self.relay = opts;
        self
    }

    /// Max time to wait for the end of stored events of each relay (default: 5 sec)
    ///
    /// A single deadline per pool subscription, started once every relay has been asked
    /// (so after the slowest connection attempt). When elapsed, the relays that haven't
    /// reported the end of stored events are considered done for the merged EOSE.
    #[inline]
    pub fn eose_timeout(mut self, timeout: Duration) -> Self {
        self.eose_timeout = timeout;
        self
    }

    /// Delay before closing a connection no longer referenced (default: 30 sec)
    #[inline]
    pub fn idle_grace_period(mut self, period: Duration) -> Self {
        self.idle_grace_period = period;
        self
    }
}
