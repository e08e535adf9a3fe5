// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay status

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug)]
pub(super) struct AtomicRelayStatus {
    value: AtomicU8,
}

impl Default for AtomicRelayStatus {
    fn default() -> Self {
        Self::new(RelayStatus::Disconnected)
    }
}

impl AtomicRelayStatus {
    #[inline]
    pub(super) fn new(status: RelayStatus) -> Self {
        Self {
            value: AtomicU8::new(status as u8),
        }
    }

    #[inline]
    pub fn set(&self, status: RelayStatus) {
        self.value.store(status as u8, Ordering::SeqCst);
    }

    pub(super) fn load(&self) -> RelayStatus {
        let val: u8 = self.value.load(Ordering::SeqCst);
        match val {
            1 => RelayStatus::Connecting,
            2 => RelayStatus::Connected,
            3 => RelayStatus::Reconnecting,
            4 => RelayStatus::Closing,
            _ => RelayStatus::Disconnected,
        }
    }
}

/// Relay connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelayStatus {
    /// No connection and no connection task running.
    Disconnected = 0,
    /// Trying to connect.
    Connecting = 1,
    /// Connected.
    Connected = 2,
    /// The connection dropped, waiting for the backoff before trying again.
    Reconnecting = 3,
    /// Shutting down.
    Closing = 4,
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

impl RelayStatus {
    /// Check if is [`RelayStatus::Connected`]
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if is [`RelayStatus::Disconnected`]
    #[inline]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    #[inline]
    pub(crate) fn is_closing(&self) -> bool {
        matches!(self, Self::Closing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_status_roundtrip() {
        let status = AtomicRelayStatus::default();
        assert_eq!(status.load(), RelayStatus::Disconnected);

        for s in [
            RelayStatus::Connecting,
            RelayStatus::Connected,
            RelayStatus::Reconnecting,
            RelayStatus::Closing,
            RelayStatus::Disconnected,
        ] {
            status.set(s);
            assert_eq!(status.load(), s);
        }
    }
}
