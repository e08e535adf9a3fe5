// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Nostr relay connections and relay pool
//!
//! [`Relay`] is a single connection state machine (connect, subscribe, publish, reconnect),
//! [`RelayPool`] shares connections between callers and fans subscriptions out to many relays.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod pool;
pub mod prelude;
pub mod relay;
mod shared;
pub mod transport;

pub use self::pool::options::RelayPoolOptions;
pub use self::pool::{PoolSubscription, RelayPool, RelayPoolBuilder};
pub use self::relay::options::{BackoffOptions, RelayOptions};
pub use self::relay::stats::RelayConnectionStats;
pub use self::relay::{
    PublishOutcome, Relay, RelayBuilder, RelayNotification, RelayStatus, SubscriptionActivity,
    SubscriptionHandler,
};
