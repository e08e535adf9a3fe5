// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay Pool constants

use std::time::Duration;

/// Default timeout for the end of stored events of each relay
pub const DEFAULT_EOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default delay before closing a connection no longer used
pub const DEFAULT_IDLE_GRACE_PERIOD: Duration = Duration::from_secs(30);
