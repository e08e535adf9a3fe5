// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use super::status::RelayStatus;

/// Relay Notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayNotification {
    /// Received a `NOTICE`
    Notice {
        /// Human-readable message
        message: String,
    },
    /// Received an `AUTH` challenge
    ///
    /// The relay doesn't answer by itself: sign a kind `22242` event and pass it to
    /// [`Relay::authenticate`](super::Relay::authenticate).
    ///
    /// <https://github.com/nostr-protocol/nips/blob/master/42.md>
    AuthRequired {
        /// Challenge
        challenge: String,
    },
    /// Relay status changed
    RelayStatus {
        /// Relay Status
        status: RelayStatus,
    },
    /// Shutdown
    Shutdown,
}
