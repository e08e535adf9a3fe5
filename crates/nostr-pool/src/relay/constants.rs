// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Relay constants

use core::time::Duration;

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default timeout for waiting for the `OK` message
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);
pub(super) const DEFAULT_BACKOFF_FACTOR: u32 = 2;
// Keep it small, avoid huge waits before reconnection if internet was gone for much time and then come back.
pub(super) const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(60);

pub(super) const DEFAULT_NOTIFICATION_CHANNEL_SIZE: usize = 2048;
pub(super) const OUTBOUND_CHANNEL_SIZE: usize = 1024;

pub(super) const WEBSOCKET_TX_TIMEOUT: Duration = Duration::from_secs(10);
pub(super) const WAIT_FOR_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Reason given when the caller closes a subscription
pub const CLOSED_BY_CLIENT: &str = "closed-by-client";
/// Reason given when the connection is lost or closed
pub const CONNECTION_CLOSED: &str = "connection-closed";
/// Reason given when no answer arrived in time
pub const TIMEOUT: &str = "timeout";
