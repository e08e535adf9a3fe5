// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::fmt;

use nostr_proto::types::url;

use crate::relay;

/// Relay Pool error
#[derive(Debug)]
pub enum Error {
    /// Relay error
    Relay(relay::Error),
    /// Url error
    Url(url::Error),
    /// No relays specified
    NoRelaysSpecified,
    /// Relay Pool is shutdown
    Shutdown,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay(e) => e.fmt(f),
            Self::Url(e) => e.fmt(f),
            Self::NoRelaysSpecified => f.write_str("no relays specified"),
            Self::Shutdown => f.write_str("relay pool is shutdown"),
        }
    }
}

impl From<relay::Error> for Error {
    fn from(e: relay::Error) -> Self {
        Self::Relay(e)
    }
}

impl From<url::Error> for Error {
    fn from(e: url::Error) -> Self {
        Self::Url(e)
    }
}
